//! Error taxonomy for the mutation pipeline. Every failure is scoped to a
//! single operation; nothing here is fatal to the process.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// No authenticated session.
    #[error("Unauthorized")]
    Unauthorized,

    /// Session present, permission denied.
    #[error("Forbidden")]
    Forbidden,

    /// Referenced file does not exist.
    #[error("File not found")]
    NotFound,

    /// Schema violation; the message lists all field violations.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Per-user file limit reached on create.
    #[error("File limit reached. You can only create up to {limit} files.")]
    QuotaExceeded { limit: usize },

    /// Fixed-window limit exceeded for the caller.
    #[error("Too many requests. Retry in {reset_in}s.")]
    RateLimited {
        limit: u32,
        remaining: u32,
        reset_in: u64,
    },

    /// Generic persistence failure; retryable by the autosave loop.
    #[error("Save failed: {0}")]
    SaveFailed(String),
}
