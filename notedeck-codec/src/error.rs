use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors reported by a storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("'{path}' does not exist")]
    NotFound { path: String },

    #[error("'{path}' already exists")]
    AlreadyExists { path: String },

    #[error("refusing to touch '{}': outside the data directory", path.display())]
    OutsideDataDir { path: PathBuf },

    #[error("'{}' is not a stored asset", path.display())]
    NotAnAsset { path: PathBuf },

    #[error("invalid asset url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors surfaced by a [`NoteSession`](crate::session::NoteSession).
///
/// None of these discard the in-memory document.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no note is open")]
    NoOpenNote,

    #[error("failed to load '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to save '{path}': {source}")]
    Save {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to store asset '{name}': {source}")]
    Upload {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to delete '{path}': {source}")]
    Delete {
        path: String,
        #[source]
        source: StoreError,
    },
}

/// A diagnostic message produced while decoding or validating a document.
///
/// Diagnostics are non-fatal: the codec always produces a best-effort
/// document even when diagnostics are emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Index of the top-level block the diagnostic refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}
