//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! Append-only: the table's permissions forbid update and delete.

use chrono::{DateTime, Utc};
use praxis_core::error::PraxisResult;
use praxis_core::models::audit::{
    ActorType, AuditLogEntry, AuditOutcome, CreateAuditLogEntry,
};
use praxis_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

fn parse_actor_type(s: &str) -> Result<ActorType, DbError> {
    match s {
        "User" => Ok(ActorType::User),
        "System" => Ok(ActorType::System),
        other => Err(DbError::Migration(format!("unknown actor type: {other}"))),
    }
}

fn actor_type_to_string(t: &ActorType) -> &'static str {
    match t {
        ActorType::User => "User",
        ActorType::System => "System",
    }
}

fn parse_outcome(s: &str) -> Result<AuditOutcome, DbError> {
    match s {
        "Success" => Ok(AuditOutcome::Success),
        "Failure" => Ok(AuditOutcome::Failure),
        "Denied" => Ok(AuditOutcome::Denied),
        other => Err(DbError::Migration(format!("unknown outcome: {other}"))),
    }
}

fn outcome_to_string(o: &AuditOutcome) -> &'static str {
    match o {
        AuditOutcome::Success => "Success",
        AuditOutcome::Failure => "Failure",
        AuditOutcome::Denied => "Denied",
    }
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Migration(format!("invalid {field} UUID: {e}")))
}

#[derive(Debug, SurrealValue)]
struct AuditLogRow {
    actor_id: String,
    actor_type: String,
    action: String,
    subject_id: Option<String>,
    outcome: String,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl AuditLogRow {
    fn into_entry(self, id: Uuid) -> Result<AuditLogEntry, DbError> {
        let subject_id = self
            .subject_id
            .map(|raw| parse_uuid("subject_id", &raw))
            .transpose()?;
        Ok(AuditLogEntry {
            id,
            actor_id: parse_uuid("actor_id", &self.actor_id)?,
            actor_type: parse_actor_type(&self.actor_type)?,
            action: self.action,
            subject_id,
            outcome: parse_outcome(&self.outcome)?,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct AuditLogRowWithId {
    record_id: String,
    actor_id: String,
    actor_type: String,
    action: String,
    subject_id: Option<String>,
    outcome: String,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl AuditLogRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let subject_id = self
            .subject_id
            .map(|raw| parse_uuid("subject_id", &raw))
            .transpose()?;
        Ok(AuditLogEntry {
            id: parse_uuid("audit_log", &self.record_id)?,
            actor_id: parse_uuid("actor_id", &self.actor_id)?,
            actor_type: parse_actor_type(&self.actor_type)?,
            action: self.action,
            subject_id,
            outcome: parse_outcome(&self.outcome)?,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the platform audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn filter_clause(filter: &AuditLogFilter) -> String {
    let mut conditions = Vec::new();
    if filter.actor_id.is_some() {
        conditions.push("actor_id = $actor_id");
    }
    if filter.action.is_some() {
        conditions.push("action = $action");
    }
    if filter.from.is_some() {
        conditions.push("timestamp >= $from");
    }
    if filter.to.is_some() {
        conditions.push("timestamp <= $to");
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> PraxisResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 actor_id = $actor_id, \
                 actor_type = $actor_type, \
                 action = $action, \
                 subject_id = $subject_id, \
                 outcome = $outcome, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind(("actor_type", actor_type_to_string(&input.actor_type).to_string()))
            .bind(("action", input.action))
            .bind(("subject_id", input.subject_id.map(|s| s.to_string())))
            .bind(("outcome", outcome_to_string(&input.outcome).to_string()))
            .bind(("metadata", input.metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<AuditLogRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> PraxisResult<PaginatedResult<AuditLogEntry>> {
        let clause = filter_clause(&filter);

        let count_query = format!("SELECT count() AS total FROM audit_log{clause} GROUP ALL");
        let mut count_builder = self.db.query(&count_query);
        if let Some(actor_id) = filter.actor_id {
            count_builder = count_builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(ref action) = filter.action {
            count_builder = count_builder.bind(("action", action.clone()));
        }
        if let Some(from) = filter.from {
            count_builder = count_builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            count_builder = count_builder.bind(("to", to));
        }
        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_log{clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset"
        );
        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<AuditLogRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
