//! Authorization claims attached to identity-directory principals.
//!
//! The claim set is embedded in every access token and is what every
//! other subsystem (appointments, tests, notes) consults for access
//! control. Exactly one claim set exists per non-admin principal, kept
//! consistent with the profile documents by the claims writer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Admin,
    Therapist,
    Patient,
}

/// Authorization attributes carried in a principal's access token.
///
/// `tenant_id` and `is_verified` are only meaningful for therapists;
/// `therapist_ids` only for patients. The optional fields stay `None`
/// for roles they do not apply to so the serialized claim map carries
/// no dead keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimSet {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_ids: Option<Vec<Uuid>>,
}

impl ClaimSet {
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            tenant_id: None,
            is_verified: None,
            therapist_ids: None,
        }
    }

    pub fn therapist(tenant_id: String, is_verified: bool) -> Self {
        Self {
            role: Role::Therapist,
            tenant_id: Some(tenant_id),
            is_verified: Some(is_verified),
            therapist_ids: None,
        }
    }

    pub fn patient(therapist_ids: Vec<Uuid>) -> Self {
        Self {
            role: Role::Patient,
            tenant_id: None,
            is_verified: None,
            therapist_ids: Some(therapist_ids),
        }
    }

    /// Whether this claim set authorizes admin-only operations.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this claim set belongs to a verified therapist.
    pub fn is_verified_therapist(&self) -> bool {
        self.role == Role::Therapist && self.is_verified == Some(true)
    }
}

/// Derive the tenant-partition key for a therapist principal.
///
/// Deterministic and immutable for the lifetime of the account; all of
/// a therapist's data is partitioned under this key.
pub fn tenant_id_for(uid: Uuid) -> String {
    format!("tenant_{uid}")
}

/// Recover the therapist uid from a tenant-partition key.
pub fn therapist_uid_from_tenant(tenant_id: &str) -> Option<Uuid> {
    tenant_id
        .strip_prefix("tenant_")
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_round_trips() {
        let uid = Uuid::new_v4();
        let tenant = tenant_id_for(uid);
        assert_eq!(therapist_uid_from_tenant(&tenant), Some(uid));
    }

    #[test]
    fn malformed_tenant_id_is_rejected() {
        assert_eq!(therapist_uid_from_tenant("tenant_not-a-uuid"), None);
        assert_eq!(therapist_uid_from_tenant("t1"), None);
    }

    #[test]
    fn role_specific_fields_are_omitted_from_json() {
        let json = serde_json::to_string(&ClaimSet::admin()).unwrap();
        assert!(!json.contains("tenant_id"));
        assert!(!json.contains("therapist_ids"));
    }
}
