//! Vault scanner.
//!
//! Walks the vault root, keeps files matching `include_globs`, prunes the
//! directories named in `exclude_dirs`, and turns each file into a
//! [`DocumentRecord`] with cleaned content and a raw-byte fingerprint.
//!
//! A file that cannot be read is reported and skipped. A root that cannot
//! be read yields no documents and sets [`ScanReport::root_error`]; callers
//! must not mistake that for an empty vault, nor a skipped file for a
//! deleted one.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use brain_assistant_core::error::FilesystemError;
use brain_assistant_core::models::DocumentRecord;
use brain_assistant_core::text::{clean_text, content_hash};

use crate::config::VaultConfig;

/// Result of one scan pass.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Eligible documents, sorted by path.
    pub documents: Vec<DocumentRecord>,
    /// Files (or subdirectories) that were skipped because they could not be read.
    pub errors: Vec<FilesystemError>,
    /// Set when the root itself could not be read.
    pub root_error: Option<FilesystemError>,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.root_error.is_none() && self.errors.is_empty()
    }

    /// Root-relative paths of the files and directories that could not be
    /// read. The root itself shows up as `""`.
    pub fn failed_paths(&self, root: &Path) -> Vec<String> {
        self.errors.iter().map(|e| relative_path(root, &e.path)).collect()
    }
}

/// Text of one cited note, loaded for answer generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub path: String,
    pub text: String,
}

/// Scan the vault. Only an invalid glob pattern is returned as `Err`.
pub fn scan_vault(vault: &VaultConfig) -> Result<ScanReport> {
    let include_set = build_globset(&vault.include_globs)?;
    let root = &vault.root;
    let mut report = ScanReport::default();

    if let Err(e) = std::fs::read_dir(root) {
        tracing::error!(root = %root.display(), error = %e, "vault root is not readable");
        report.root_error = Some(FilesystemError::new(root.clone(), e));
        return Ok(report);
    }

    let walker = WalkDir::new(root)
        .follow_links(vault.follow_symlinks)
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry, &vault.exclude_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                report.errors.push(FilesystemError::new(path, walk_error_to_io(e)));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative_path(root, entry.path());
        if !include_set.is_match(&rel) {
            continue;
        }

        match read_document(entry.path(), rel) {
            Ok(doc) => report.documents.push(doc),
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e.source, "skipping unreadable note");
                report.errors.push(e);
            }
        }
    }

    report.documents.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        documents = report.documents.len(),
        skipped = report.errors.len(),
        "vault scan finished"
    );
    Ok(report)
}

/// Load and clean the notes at `paths` (relative to `root`), in order.
///
/// Notes that vanished or became unreadable since indexing are skipped.
pub async fn load_sources(root: &Path, paths: &[String]) -> Vec<LoadedSource> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let full = root.join(path);
        match tokio::fs::read_to_string(&full).await {
            Ok(raw) => sources.push(LoadedSource {
                path: path.clone(),
                text: clean_text(&raw),
            }),
            Err(e) => {
                tracing::warn!(path = %full.display(), error = %e, "cited note could not be loaded");
            }
        }
    }
    sources
}

fn read_document(path: &Path, rel: String) -> Result<DocumentRecord, FilesystemError> {
    let bytes = std::fs::read(path).map_err(|e| FilesystemError::new(path, e))?;
    let hash = content_hash(&bytes);
    let raw = String::from_utf8(bytes).map_err(|e| {
        FilesystemError::new(path, io::Error::new(io::ErrorKind::InvalidData, e))
    })?;
    Ok(DocumentRecord::new(rel, clean_text(&raw), hash))
}

fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && exclude_dirs
            .iter()
            .any(|name| entry.file_name().to_string_lossy() == name.as_str())
}

/// Root-relative path with `/` separators on every platform.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error_to_io(e: walkdir::Error) -> io::Error {
    let message = e.to_string();
    e.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Whether a changed path is inside an excluded directory of `root`.
pub fn in_excluded_dir(root: &Path, path: &Path, exclude_dirs: &[String]) -> bool {
    let relative: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    relative.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        exclude_dirs.iter().any(|d| d.as_str() == name)
    })
}
