//! # Brain Assistant Core
//!
//! Shared, I/O-free logic for Brain Assistant: the note data model, the
//! cleaning transform and fingerprint, change reconciliation, the vector
//! index abstraction, and the embedding gateway trait.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem access. The
//! `brain-assistant` application crate supplies the scanner, the remote
//! gateway, and the SQLite-backed index.

pub mod embedding;
pub mod error;
pub mod gateway;
pub mod models;
pub mod reconcile;
pub mod store;
pub mod text;
