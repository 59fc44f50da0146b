//! Error types for the Praxis platform.
//!
//! This is the fixed vocabulary surfaced to callers. Every layer maps
//! its native failures into one of these variants before crossing a
//! crate boundary; nothing is silently swallowed except the expected
//! "not found" outcome of existence probes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PraxisError {
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Failed precondition: {message}")]
    FailedPrecondition { message: String },

    #[error("Deadline exceeded: {message}")]
    DeadlineExceeded { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PraxisError {
    /// True for the "no such record" outcome. The email existence
    /// probe before issuing an invitation treats this as its only
    /// success path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PraxisError::NotFound { .. })
    }
}

pub type PraxisResult<T> = Result<T, PraxisError>;
