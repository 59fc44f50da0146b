//! Database-specific error types and conversions.

use praxis_core::error::PraxisError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Cryptography error: {0}")]
    Crypto(String),
}

impl From<DbError> for PraxisError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PraxisError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => PraxisError::AlreadyExists { entity },
            DbError::Crypto(msg) => PraxisError::Internal(msg),
            other => PraxisError::Database(other.to_string()),
        }
    }
}
