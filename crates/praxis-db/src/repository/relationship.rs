//! SurrealDB implementation of [`RelationshipRepository`].
//!
//! The embedded audit trail is appended with SurrealDB's `+=` array
//! operator, so a status transition and its audit entry land in one
//! atomic single-document write.

use chrono::{DateTime, Utc};
use praxis_core::error::PraxisResult;
use praxis_core::models::relationship::{
    Relationship, RelationshipAuditEntry, RelationshipStatus,
};
use praxis_core::repository::RelationshipRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

fn parse_status(s: &str) -> Result<RelationshipStatus, DbError> {
    match s {
        "Active" => Ok(RelationshipStatus::Active),
        "Inactive" => Ok(RelationshipStatus::Inactive),
        other => Err(DbError::Migration(format!(
            "unknown relationship status: {other}"
        ))),
    }
}

fn status_to_string(status: RelationshipStatus) -> &'static str {
    match status {
        RelationshipStatus::Active => "Active",
        RelationshipStatus::Inactive => "Inactive",
    }
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Migration(format!("invalid {field} UUID: {e}")))
}

fn audit_entry_to_value(entry: &RelationshipAuditEntry) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(entry)
        .map_err(|e| DbError::Migration(format!("audit entry serialization: {e}")))
}

#[derive(Debug, SurrealValue)]
struct RelationshipRow {
    therapist_id: String,
    patient_id: String,
    tenant_id: String,
    status: String,
    relationship_start: DateTime<Utc>,
    relationship_end: Option<DateTime<Utc>>,
    audit_log: Vec<serde_json::Value>,
}

impl RelationshipRow {
    fn into_relationship(self, id: String) -> Result<Relationship, DbError> {
        let audit_log = self
            .audit_log
            .into_iter()
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| DbError::Migration(format!("invalid audit entry: {e}")))
            })
            .collect::<Result<Vec<RelationshipAuditEntry>, DbError>>()?;
        Ok(Relationship {
            id,
            therapist_id: parse_uuid("therapist_id", &self.therapist_id)?,
            patient_id: parse_uuid("patient_id", &self.patient_id)?,
            tenant_id: self.tenant_id,
            status: parse_status(&self.status)?,
            relationship_start: self.relationship_start,
            relationship_end: self.relationship_end,
            audit_log,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct RelationshipRowWithId {
    record_id: String,
    therapist_id: String,
    patient_id: String,
    tenant_id: String,
    status: String,
    relationship_start: DateTime<Utc>,
    relationship_end: Option<DateTime<Utc>>,
    audit_log: Vec<serde_json::Value>,
}

impl RelationshipRowWithId {
    fn try_into_relationship(self) -> Result<Relationship, DbError> {
        let id = self.record_id.clone();
        RelationshipRow {
            therapist_id: self.therapist_id,
            patient_id: self.patient_id,
            tenant_id: self.tenant_id,
            status: self.status,
            relationship_start: self.relationship_start,
            relationship_end: self.relationship_end,
            audit_log: self.audit_log,
        }
        .into_relationship(id)
    }
}

/// SurrealDB implementation of the relationship repository.
#[derive(Clone)]
pub struct SurrealRelationshipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRelationshipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RelationshipRepository for SurrealRelationshipRepository<C> {
    async fn create(&self, relationship: &Relationship) -> PraxisResult<Relationship> {
        let audit_log = relationship
            .audit_log
            .iter()
            .map(audit_entry_to_value)
            .collect::<Result<Vec<_>, DbError>>()?;

        let result = self
            .db
            .query(
                "CREATE type::record('relationship', $id) SET \
                 therapist_id = $therapist_id, \
                 patient_id = $patient_id, \
                 tenant_id = $tenant_id, \
                 status = $status, \
                 relationship_start = $relationship_start, \
                 relationship_end = NONE, \
                 audit_log = $audit_log",
            )
            .bind(("id", relationship.id.clone()))
            .bind(("therapist_id", relationship.therapist_id.to_string()))
            .bind(("patient_id", relationship.patient_id.to_string()))
            .bind(("tenant_id", relationship.tenant_id.clone()))
            .bind(("status", status_to_string(relationship.status).to_string()))
            .bind(("relationship_start", relationship.relationship_start))
            .bind(("audit_log", audit_log))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                DbError::AlreadyExists {
                    entity: format!("relationship {}", relationship.id),
                }
            } else {
                DbError::Migration(message)
            }
        })?;

        let rows: Vec<RelationshipRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "relationship".into(),
            id: relationship.id.clone(),
        })?;

        Ok(row.into_relationship(relationship.id.clone())?)
    }

    async fn get(&self, id: &str) -> PraxisResult<Relationship> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('relationship', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RelationshipRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "relationship".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_relationship(id.to_string())?)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> PraxisResult<Vec<Relationship>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM relationship \
                 WHERE patient_id = $patient_id \
                 ORDER BY relationship_start ASC",
            )
            .bind(("patient_id", patient_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RelationshipRowWithId> = result.take(0).map_err(DbError::from)?;
        let relationships = rows
            .into_iter()
            .map(|row| row.try_into_relationship())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(relationships)
    }

    async fn set_status(
        &self,
        id: &str,
        status: RelationshipStatus,
        relationship_end: Option<DateTime<Utc>>,
        entry: RelationshipAuditEntry,
    ) -> PraxisResult<Relationship> {
        let entry_value = audit_entry_to_value(&entry)?;

        let mut result = self
            .db
            .query(
                "UPDATE type::record('relationship', $id) SET \
                 status = $status, \
                 relationship_end = $relationship_end, \
                 audit_log += $entry",
            )
            .bind(("id", id.to_string()))
            .bind(("status", status_to_string(status).to_string()))
            .bind(("relationship_end", relationship_end))
            .bind(("entry", entry_value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RelationshipRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "relationship".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_relationship(id.to_string())?)
    }
}
