//! Praxis Core — domain models, error taxonomy, and the storage and
//! identity-directory ports shared across all crates.

pub mod directory;
pub mod error;
pub mod models;
pub mod repository;

pub use error::{PraxisError, PraxisResult};
