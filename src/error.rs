//! Error Types
//!
//! Typed failures shared across the router, job store, transport, and
//! gateway. Routing operations fail soft (return `None`/empty) for malformed
//! input; only the variants below are surfaced to callers.

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Typed errors for relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No contact could be determined for a job. Terminal for that call.
    #[error("no contact available for job {job_id}")]
    NotProvisionable { job_id: String },

    /// The messaging transport collaborator is not connected. Recoverable;
    /// the caller may retry later.
    #[error("messaging transport is not connected")]
    NotConnected,

    /// A delivery attempt failed inside the transport collaborator.
    #[error("delivery failed: {message}")]
    Transport { message: String },

    /// A job id was not found in the job store.
    #[error("unknown job: {job_id}")]
    UnknownJob { job_id: String },

    /// A job status change violates the lifecycle.
    #[error("invalid job status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// I/O failure (seed file, config file).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    pub fn not_provisionable(job_id: impl Into<String>) -> Self {
        Self::NotProvisionable {
            job_id: job_id.into(),
        }
    }

    pub fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: message.to_string(),
        }
    }

    pub fn unknown_job(job_id: impl Into<String>) -> Self {
        Self::UnknownJob {
            job_id: job_id.into(),
        }
    }

    pub fn config(message: impl std::fmt::Display) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }
}
