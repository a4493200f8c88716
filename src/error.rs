//! Error types for the synchronisation pipeline.
//!
//! Two propagation classes exist and must not be conflated:
//! - [`ConfigError`] is fatal: without a valid mapping file there is nothing
//!   to do, so it escalates to the CLI boundary and a non-zero exit.
//! - The remaining [`SyncError`] variants are recoverable: the orchestrator
//!   catches them per mapping, folds them into the [`SyncReport`] and moves
//!   on to the next entry.
//!
//! [`SyncReport`]: crate::synchronise::SyncReport

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration-load failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config YAML in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Repository names key the clone directories and the URL map, so a
    /// duplicate makes the mapping ambiguous.
    #[error("duplicate repository name in config: {name}")]
    DuplicateRepository { name: String },
}

/// Errors raised while processing a single mapping. All variants except
/// `Config` are recoverable and end up as report entries, not process
/// failures.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured source file does not exist under the repository clone.
    /// Expected during partial checkouts, so: skip with a warning.
    #[error("source file missing in {repo}: {path}")]
    MissingSource { repo: String, path: PathBuf },

    #[error("failed to read source file {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Only configuration failures abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Config(_))
    }
}
