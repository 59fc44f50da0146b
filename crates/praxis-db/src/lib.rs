//! Praxis Database — SurrealDB connection management, schema, and
//! implementations of the `praxis-core` storage and directory ports.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Repository implementations for profiles, invitations,
//!   relationships, appointments, and the platform audit log
//! - The SurrealDB-backed identity directory ([`SurrealDirectory`])
//! - Error types ([`DbError`])

mod connection;
mod error;
mod schema;

pub mod directory;
pub mod repository;

pub use connection::{DbConfig, DbManager};
pub use directory::{DirectoryConfig, SurrealDirectory, verify_password};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
