//! Error types for record stores

use std::path::PathBuf;

/// What kind of record a lookup was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Job configuration
    JobConfig,
    /// Execution history
    History,
    /// Cluster snapshot
    Cluster,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::JobConfig => f.write_str("job config"),
            RecordKind::History => f.write_str("history"),
            RecordKind::Cluster => f.write_str("cluster state"),
        }
    }
}

/// Record store failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No record with that name
    #[error("{kind} not found: '{name}'")]
    NotFound { kind: RecordKind, name: String },

    /// Backing source could not be read or parsed
    #[error("{kind} source unavailable ({path}): {reason}")]
    Unavailable {
        kind: RecordKind,
        path: PathBuf,
        reason: String,
    },

    /// Malformed external input (e.g. kubectl output)
    #[error("invalid input at line {line}: {reason}")]
    InvalidInput { line: usize, reason: String },
}

impl StoreError {
    /// Create not-found error
    #[inline]
    pub fn not_found(kind: RecordKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create unavailable error for a path
    #[inline]
    pub fn unavailable(kind: RecordKind, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Unavailable {
            kind,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error means the record does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
