//! # Brain Assistant
//!
//! Ask questions about a local notes vault.
//!
//! Brain Assistant keeps a vector index of a Markdown vault in step with the
//! files on disk, re-embedding only what changed, and answers questions by
//! retrieving the closest notes and handing them to a remote question
//! answering model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Vault   │──▶│  Scanner   │──▶│  Reconciler  │──▶│  SQLite  │
//! │  (*.md)  │   │ clean+hash │   │  add/upd/del │   │  vectors │
//! └────┬─────┘   └────────────┘   └──────┬───────┘   └────┬─────┘
//!      │ notify                          │ embed           │ top-3
//!      ▼                                 ▼                 ▼
//! ┌──────────┐                    ┌────────────┐     ┌──────────┐
//! │  Worker  │                    │ Aleph Alpha│◀────│   Ask    │
//! └──────────┘                    └────────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! brain init                          # create the index
//! brain index                         # embed new and changed notes
//! brain ask "when is the dentist?"
//! brain watch                         # keep the index fresh
//! brain serve                         # HTTP API with a background watcher
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`scanner`] | Vault walk, cleaning, fingerprints |
//! | [`gateway`] | Aleph Alpha HTTP client |
//! | [`sqlite_index`] | SQLite-backed vector index |
//! | [`indexer`] | One incremental indexing pass |
//! | [`watch`] | Coalescing background re-index worker |
//! | [`ask`] | Retrieval and answer pipeline |
//! | [`budget`] | Local credit ledger |
//! | [`server`] | HTTP API |
//! | [`status`] | Index overview |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod ask;
pub mod budget;
pub mod config;
pub mod db;
pub mod gateway;
pub mod indexer;
pub mod migrate;
pub mod scanner;
pub mod server;
pub mod sqlite_index;
pub mod status;
pub mod watch;
