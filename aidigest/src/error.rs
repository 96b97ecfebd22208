//! Error taxonomy (spec §7). Item- and stage-level failures are logged and
//! swallowed inside each stage; only the fatal kinds below escape
//! `run_pipeline` and map to a non-zero process exit code, mirroring how the
//! teacher's `AppError` centralizes error-to-outcome mapping (there, to an
//! HTTP status; here, to an exit code).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("sources file unreadable: {0}")]
    SourcesUnreadable(#[source] std::io::Error),

    #[error("embedding dimension mismatch: historical index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("stage `{stage}` exceeded its timeout")]
    StageTimeout { stage: &'static str },

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

impl AppError {
    /// Exit code per spec §6: 0 success, non-zero on unrecoverable
    /// configuration error or stage timeout.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Configuration(_) | AppError::SourcesUnreadable(_) => 2,
            AppError::DimensionMismatch { .. } => 3,
            AppError::StageTimeout { .. } => 4,
            AppError::Other(_) => 1,
        }
    }
}
