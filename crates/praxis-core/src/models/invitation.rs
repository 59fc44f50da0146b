//! Invitation domain model.
//!
//! An invitation is a time-boxed, single-use token authorizing account
//! creation for a specific role and (for patients) a specific tenant.
//! Two variants exist, by issuer: admin-issued invitations may target
//! either role; therapist-issued invitations are always for patients of
//! that therapist. The variants are backed by physically separate
//! tables, so token lookup tries both; a token resolves to at most one
//! invitation.
//!
//! Lifecycle: created `Pending`; moves to `Expired` lazily (discovered
//! and written on the first read past `expires_at`), to `Cancelled` by
//! explicit issuer action, or to `Used` by successful redemption. All
//! three are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvitationStatus {
    Pending,
    Used,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

/// Role an invitation provisions. Admin accounts are never created by
/// invitation, so this is narrower than [`super::claims::Role`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvitedRole {
    Therapist,
    Patient,
}

/// Optional pre-filled professional data carried by admin invitations
/// targeting the therapist role.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TherapistPrefill {
    pub cedula: Option<String>,
    pub specialization: Vec<String>,
    pub license_number: Option<String>,
}

/// Invitation issued by an administrator, for either role.
///
/// `tenant_id` is required iff `role` is `Patient` (it names the
/// therapist whose tenant the patient joins); `therapist_data` is
/// meaningful iff `role` is `Therapist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminInvitation {
    pub token: String,
    pub role: InvitedRole,
    pub invited_by: Uuid,
    pub target_email: String,
    pub target_name: Option<String>,
    pub tenant_id: Option<String>,
    pub therapist_data: Option<TherapistPrefill>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub redeemed_uid: Option<Uuid>,
}

/// Invitation issued by a verified therapist, always for a patient of
/// that therapist's own tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistInvitation {
    pub token: String,
    pub therapist_id: Uuid,
    pub therapist_email: String,
    pub therapist_name: String,
    pub patient_email: String,
    pub patient_name: Option<String>,
    pub tenant_id: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub redeemed_uid: Option<Uuid>,
}

/// Which backing table an invitation lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvitationKind {
    Admin,
    Therapist,
}

/// The unioned invitation type. Lookup by token tries the admin table
/// first, then the therapist table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Invitation {
    Admin(AdminInvitation),
    Therapist(TherapistInvitation),
}

impl Invitation {
    pub fn kind(&self) -> InvitationKind {
        match self {
            Invitation::Admin(_) => InvitationKind::Admin,
            Invitation::Therapist(_) => InvitationKind::Therapist,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Invitation::Admin(inv) => &inv.token,
            Invitation::Therapist(inv) => &inv.token,
        }
    }

    pub fn status(&self) -> InvitationStatus {
        match self {
            Invitation::Admin(inv) => inv.status,
            Invitation::Therapist(inv) => inv.status,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            Invitation::Admin(inv) => inv.expires_at,
            Invitation::Therapist(inv) => inv.expires_at,
        }
    }

    /// The role this invitation provisions.
    pub fn invited_role(&self) -> InvitedRole {
        match self {
            Invitation::Admin(inv) => inv.role,
            Invitation::Therapist(_) => InvitedRole::Patient,
        }
    }

    /// Email address the invitation was issued for.
    pub fn target_email(&self) -> &str {
        match self {
            Invitation::Admin(inv) => &inv.target_email,
            Invitation::Therapist(inv) => &inv.patient_email,
        }
    }

    /// Principal that issued the invitation.
    pub fn issuer(&self) -> Uuid {
        match self {
            Invitation::Admin(inv) => inv.invited_by,
            Invitation::Therapist(inv) => inv.therapist_id,
        }
    }
}
