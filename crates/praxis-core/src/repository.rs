//! Repository trait definitions for document-store access.
//!
//! All repository operations are async. The store guarantees atomicity
//! per single document only — multi-document sequences are series of
//! independently visible writes, and the provisioning layer orders them
//! so partial completion stays recoverable.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PraxisResult;
use crate::models::{
    appointment::{Appointment, CreateAppointment},
    audit::{AuditLogEntry, CreateAuditLogEntry},
    invitation::{Invitation, InvitationKind},
    patient::{PatientProfile, UpdatePatientProfile},
    relationship::{Relationship, RelationshipAuditEntry, RelationshipStatus},
    therapist::{CreateTherapistProfile, TherapistProfile, UpdateTherapistProfile},
    user::{CreateUserProfile, UpdateUserProfile, UserProfile},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Profiles (1:1 with principals)
// ---------------------------------------------------------------------------

pub trait UserProfileRepository: Send + Sync {
    fn create(
        &self,
        input: CreateUserProfile,
    ) -> impl Future<Output = PraxisResult<UserProfile>> + Send;
    fn get_by_uid(&self, uid: Uuid) -> impl Future<Output = PraxisResult<UserProfile>> + Send;
    fn update(
        &self,
        uid: Uuid,
        input: UpdateUserProfile,
    ) -> impl Future<Output = PraxisResult<UserProfile>> + Send;
    /// Soft-delete: sets `is_deleted`. The document itself is never
    /// removed.
    fn soft_delete(&self, uid: Uuid) -> impl Future<Output = PraxisResult<()>> + Send;
}

pub trait TherapistProfileRepository: Send + Sync {
    fn create(
        &self,
        input: CreateTherapistProfile,
    ) -> impl Future<Output = PraxisResult<TherapistProfile>> + Send;
    fn get_by_uid(&self, uid: Uuid)
    -> impl Future<Output = PraxisResult<TherapistProfile>> + Send;
    fn update(
        &self,
        uid: Uuid,
        input: UpdateTherapistProfile,
    ) -> impl Future<Output = PraxisResult<TherapistProfile>> + Send;
    fn set_verified(
        &self,
        uid: Uuid,
        is_verified: bool,
    ) -> impl Future<Output = PraxisResult<()>> + Send;
}

pub trait PatientProfileRepository: Send + Sync {
    fn create(
        &self,
        input: PatientProfile,
    ) -> impl Future<Output = PraxisResult<PatientProfile>> + Send;
    fn get_by_uid(&self, uid: Uuid) -> impl Future<Output = PraxisResult<PatientProfile>> + Send;
    fn update(
        &self,
        uid: Uuid,
        input: UpdatePatientProfile,
    ) -> impl Future<Output = PraxisResult<PatientProfile>> + Send;
}

// ---------------------------------------------------------------------------
// Invitations (token-keyed, two backing tables)
// ---------------------------------------------------------------------------

pub trait InvitationRepository: Send + Sync {
    /// Persist a new invitation under its token key. Fails
    /// `AlreadyExists` if the token is taken (create-if-absent write —
    /// a random-token collision simply fails here).
    fn create(&self, invitation: &Invitation) -> impl Future<Output = PraxisResult<()>> + Send;

    /// Token lookup across both variants: the admin table is tried
    /// first, then the therapist table.
    fn find_by_token(&self, token: &str) -> impl Future<Output = PraxisResult<Invitation>> + Send;

    /// Lazy expiry write, performed on the first read past
    /// `expires_at`.
    fn mark_expired(
        &self,
        token: &str,
        kind: InvitationKind,
    ) -> impl Future<Output = PraxisResult<()>> + Send;

    fn mark_cancelled(
        &self,
        token: &str,
        kind: InvitationKind,
    ) -> impl Future<Output = PraxisResult<()>> + Send;

    /// Terminal redemption write: status `Used`, plus the redemption
    /// timestamp and resulting principal id.
    fn mark_used(
        &self,
        token: &str,
        kind: InvitationKind,
        redeemed_uid: Uuid,
        used_at: DateTime<Utc>,
    ) -> impl Future<Output = PraxisResult<()>> + Send;

    /// Invitations issued by a given principal, newest first.
    fn list_by_issuer(
        &self,
        issuer: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = PraxisResult<PaginatedResult<Invitation>>> + Send;
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

pub trait RelationshipRepository: Send + Sync {
    /// Create-if-absent at the relationship's composite id. Fails
    /// `AlreadyExists` when the document is already present, whatever
    /// its status.
    fn create(
        &self,
        relationship: &Relationship,
    ) -> impl Future<Output = PraxisResult<Relationship>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = PraxisResult<Relationship>> + Send;

    fn list_for_patient(
        &self,
        patient_id: Uuid,
    ) -> impl Future<Output = PraxisResult<Vec<Relationship>>> + Send;

    /// Single-document status transition: sets the status (and end
    /// timestamp, when closing) and appends the audit entry in one
    /// atomic write.
    fn set_status(
        &self,
        id: &str,
        status: RelationshipStatus,
        relationship_end: Option<DateTime<Utc>>,
        entry: RelationshipAuditEntry,
    ) -> impl Future<Output = PraxisResult<Relationship>> + Send;
}

// ---------------------------------------------------------------------------
// Appointments (interface boundary — reassignment surface only)
// ---------------------------------------------------------------------------

pub trait AppointmentRepository: Send + Sync {
    fn create(
        &self,
        input: CreateAppointment,
    ) -> impl Future<Output = PraxisResult<Appointment>> + Send;

    fn list_for_pair(
        &self,
        patient_id: Uuid,
        therapist_id: Uuid,
    ) -> impl Future<Output = PraxisResult<Vec<Appointment>>> + Send;

    /// Move every still-`Scheduled` appointment of the pair to the new
    /// therapist and tenant. Returns the number reassigned.
    fn reassign_scheduled(
        &self,
        patient_id: Uuid,
        old_therapist_id: Uuid,
        new_therapist_id: Uuid,
        new_tenant_id: &str,
    ) -> impl Future<Output = PraxisResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Platform audit log (append-only)
// ---------------------------------------------------------------------------

/// Query filters for platform audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations
    /// exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = PraxisResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = PraxisResult<PaginatedResult<AuditLogEntry>>> + Send;
}
