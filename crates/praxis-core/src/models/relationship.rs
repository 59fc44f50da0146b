//! Therapist–patient relationship domain model.
//!
//! A relationship asserts an active or historical care assignment. For
//! a given patient at most one relationship with a given therapist may
//! be `Active` at a time; several *different* therapists may be active
//! for one patient simultaneously, since patients can see more than one
//! therapist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelationshipStatus {
    Active,
    Inactive,
}

/// One entry in a relationship's embedded audit trail. The trail is
/// append-only and is the source of truth for who changed what, when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipAuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: Uuid,
    pub action: String,
    pub changes: Option<serde_json::Value>,
}

impl RelationshipAuditEntry {
    pub fn new(user_id: Uuid, action: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id,
            action: action.into(),
            changes: None,
        }
    }

    pub fn with_changes(mut self, changes: serde_json::Value) -> Self {
        self.changes = Some(changes);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Composite key, `"<therapist_id>_<patient_id>"`.
    pub id: String,
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub tenant_id: String,
    pub status: RelationshipStatus,
    pub relationship_start: DateTime<Utc>,
    pub relationship_end: Option<DateTime<Utc>>,
    pub audit_log: Vec<RelationshipAuditEntry>,
}

impl Relationship {
    /// The composite document key for a therapist–patient pair.
    pub fn composite_id(therapist_id: Uuid, patient_id: Uuid) -> String {
        format!("{therapist_id}_{patient_id}")
    }

    /// A fresh `Active` relationship seeded with its creation audit
    /// entry.
    pub fn new_active(therapist_id: Uuid, patient_id: Uuid, tenant_id: String, created_by: Uuid) -> Self {
        Self {
            id: Self::composite_id(therapist_id, patient_id),
            therapist_id,
            patient_id,
            tenant_id,
            status: RelationshipStatus::Active,
            relationship_start: Utc::now(),
            relationship_end: None,
            audit_log: vec![RelationshipAuditEntry::new(created_by, "CREATE")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_id_joins_therapist_and_patient() {
        let t = Uuid::new_v4();
        let p = Uuid::new_v4();
        assert_eq!(Relationship::composite_id(t, p), format!("{t}_{p}"));
    }

    #[test]
    fn new_active_seeds_create_audit_entry() {
        let t = Uuid::new_v4();
        let rel = Relationship::new_active(t, Uuid::new_v4(), "tenant_x".into(), t);
        assert_eq!(rel.status, RelationshipStatus::Active);
        assert_eq!(rel.audit_log.len(), 1);
        assert_eq!(rel.audit_log[0].action, "CREATE");
        assert!(rel.relationship_end.is_none());
    }
}
