//! Structured failure reasons surfaced to callers.
//!
//! Input problems (a missing or unreadable snapshot) are kept apart from the
//! comparison itself, which never fails: two snapshots without a common
//! flight simply produce an empty report.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot date key '{0}', expected YYYYMMDD")]
    InvalidDateKey(String),

    #[error("snapshot not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("snapshot {} has no observations", .0.display())]
    Empty(PathBuf),

    #[error("malformed row {row} in {}: {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
