//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Invitation tokens are the record
//! keys of their tables, so a create on a taken token fails instead of
//! overwriting.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Principals (identity directory — credentials and claims)
-- =======================================================================
DEFINE TABLE principal SCHEMAFULL;
DEFINE FIELD email ON TABLE principal TYPE string;
DEFINE FIELD display_name ON TABLE principal TYPE string;
DEFINE FIELD password_hash ON TABLE principal TYPE string;
DEFINE FIELD email_verified ON TABLE principal TYPE bool DEFAULT false;
DEFINE FIELD claims ON TABLE principal TYPE option<object> FLEXIBLE;
DEFINE FIELD tokens_valid_after ON TABLE principal \
    TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE principal TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_principal_email ON TABLE principal \
    COLUMNS email UNIQUE;

-- =======================================================================
-- User profiles (1:1 with principals)
-- =======================================================================
DEFINE TABLE user_profile SCHEMAFULL;
DEFINE FIELD email ON TABLE user_profile TYPE string;
DEFINE FIELD display_name ON TABLE user_profile TYPE string;
DEFINE FIELD role ON TABLE user_profile TYPE string \
    ASSERT $value IN ['Admin', 'Therapist', 'Patient'];
DEFINE FIELD is_deleted ON TABLE user_profile TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user_profile TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_profile_email ON TABLE user_profile \
    COLUMNS email UNIQUE;

-- =======================================================================
-- Therapist profiles (tenant roots)
-- =======================================================================
DEFINE TABLE therapist_profile SCHEMAFULL;
DEFINE FIELD cedula ON TABLE therapist_profile TYPE string;
DEFINE FIELD specialization ON TABLE therapist_profile TYPE array;
DEFINE FIELD specialization.* ON TABLE therapist_profile TYPE string;
DEFINE FIELD license_number ON TABLE therapist_profile \
    TYPE option<string>;
DEFINE FIELD tenant_id ON TABLE therapist_profile TYPE string;
DEFINE FIELD is_verified ON TABLE therapist_profile TYPE bool \
    DEFAULT false;
DEFINE FIELD bank_info ON TABLE therapist_profile \
    TYPE option<object> FLEXIBLE;
DEFINE FIELD created_at ON TABLE therapist_profile TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE therapist_profile TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_therapist_tenant ON TABLE therapist_profile \
    COLUMNS tenant_id UNIQUE;

-- =======================================================================
-- Patient profiles
-- =======================================================================
DEFINE TABLE patient_profile SCHEMAFULL;
DEFINE FIELD date_of_birth ON TABLE patient_profile \
    TYPE option<string>;
DEFINE FIELD phone ON TABLE patient_profile TYPE option<string>;
DEFINE FIELD emergency_contact ON TABLE patient_profile \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE patient_profile TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE patient_profile TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Admin invitations (token-keyed)
-- =======================================================================
DEFINE TABLE admin_invitation SCHEMAFULL;
DEFINE FIELD role ON TABLE admin_invitation TYPE string \
    ASSERT $value IN ['Therapist', 'Patient'];
DEFINE FIELD invited_by ON TABLE admin_invitation TYPE string;
DEFINE FIELD target_email ON TABLE admin_invitation TYPE string;
DEFINE FIELD target_name ON TABLE admin_invitation \
    TYPE option<string>;
DEFINE FIELD tenant_id ON TABLE admin_invitation TYPE option<string>;
DEFINE FIELD therapist_data ON TABLE admin_invitation \
    TYPE option<object> FLEXIBLE;
DEFINE FIELD status ON TABLE admin_invitation TYPE string \
    ASSERT $value IN ['Pending', 'Used', 'Expired', 'Cancelled'];
DEFINE FIELD expires_at ON TABLE admin_invitation TYPE datetime;
DEFINE FIELD created_at ON TABLE admin_invitation TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD used_at ON TABLE admin_invitation TYPE option<datetime>;
DEFINE FIELD redeemed_uid ON TABLE admin_invitation \
    TYPE option<string>;
DEFINE INDEX idx_admin_invitation_issuer ON TABLE admin_invitation \
    COLUMNS invited_by;

-- =======================================================================
-- Therapist invitations (token-keyed, always patient role)
-- =======================================================================
DEFINE TABLE therapist_invitation SCHEMAFULL;
DEFINE FIELD therapist_id ON TABLE therapist_invitation TYPE string;
DEFINE FIELD therapist_email ON TABLE therapist_invitation TYPE string;
DEFINE FIELD therapist_name ON TABLE therapist_invitation TYPE string;
DEFINE FIELD patient_email ON TABLE therapist_invitation TYPE string;
DEFINE FIELD patient_name ON TABLE therapist_invitation \
    TYPE option<string>;
DEFINE FIELD tenant_id ON TABLE therapist_invitation TYPE string;
DEFINE FIELD status ON TABLE therapist_invitation TYPE string \
    ASSERT $value IN ['Pending', 'Used', 'Expired', 'Cancelled'];
DEFINE FIELD expires_at ON TABLE therapist_invitation TYPE datetime;
DEFINE FIELD created_at ON TABLE therapist_invitation TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD used_at ON TABLE therapist_invitation \
    TYPE option<datetime>;
DEFINE FIELD redeemed_uid ON TABLE therapist_invitation \
    TYPE option<string>;
DEFINE INDEX idx_therapist_invitation_issuer \
    ON TABLE therapist_invitation COLUMNS therapist_id;

-- =======================================================================
-- Relationships (composite-keyed, embedded audit trail)
-- =======================================================================
DEFINE TABLE relationship SCHEMAFULL;
DEFINE FIELD therapist_id ON TABLE relationship TYPE string;
DEFINE FIELD patient_id ON TABLE relationship TYPE string;
DEFINE FIELD tenant_id ON TABLE relationship TYPE string;
DEFINE FIELD status ON TABLE relationship TYPE string \
    ASSERT $value IN ['Active', 'Inactive'];
DEFINE FIELD relationship_start ON TABLE relationship TYPE datetime;
DEFINE FIELD relationship_end ON TABLE relationship \
    TYPE option<datetime>;
DEFINE FIELD audit_log ON TABLE relationship TYPE array;
DEFINE FIELD audit_log.* ON TABLE relationship TYPE object FLEXIBLE;
DEFINE INDEX idx_relationship_patient ON TABLE relationship \
    COLUMNS patient_id;
DEFINE INDEX idx_relationship_tenant ON TABLE relationship \
    COLUMNS tenant_id;

-- =======================================================================
-- Appointments (reassignment surface for transfers)
-- =======================================================================
DEFINE TABLE appointment SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE appointment TYPE string;
DEFINE FIELD therapist_id ON TABLE appointment TYPE string;
DEFINE FIELD patient_id ON TABLE appointment TYPE string;
DEFINE FIELD status ON TABLE appointment TYPE string \
    ASSERT $value IN ['Scheduled', 'Completed', 'Cancelled'];
DEFINE FIELD scheduled_at ON TABLE appointment TYPE datetime;
DEFINE FIELD created_at ON TABLE appointment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_appointment_pair ON TABLE appointment \
    COLUMNS patient_id, therapist_id;

-- =======================================================================
-- Platform audit log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['User', 'System'];
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD subject_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_time ON TABLE audit_log COLUMNS timestamp;
DEFINE INDEX idx_audit_actor ON TABLE audit_log COLUMNS actor_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
