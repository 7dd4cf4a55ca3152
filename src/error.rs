//! Error types for Phase Profiler

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding, aggregating or batching traces
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Unclassifiable phase bits {bits:?} at line {line}")]
    UnclassifiablePhase { line: usize, bits: String },

    #[error("Trace path does not exist: {}", .0.display())]
    TraceNotFound(PathBuf),

    #[error("Trace path does not point to a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Failed to read trace {}: {source}", path.display())]
    TraceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan directory {}: {source}", path.display())]
    DirectoryScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output file already exists: {} (pass overwrite to replace it)", .0.display())]
    OutputConflict(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read summary {}: {source}", path.display())]
    SummaryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid summary row at line {line}: {reason}")]
    SummaryParse { line: usize, reason: String },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProfileError {
    /// True for errors that abort a single trace but leave the batch running
    pub fn is_trace_error(&self) -> bool {
        matches!(
            self,
            ProfileError::TraceNotFound(_)
                | ProfileError::NotAFile(_)
                | ProfileError::TraceIo { .. }
                | ProfileError::DirectoryScan { .. }
        )
    }

    /// True for per-line / per-sample conditions that never abort a trace
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProfileError::MalformedRecord { .. } | ProfileError::UnclassifiablePhase { .. }
        )
    }
}
