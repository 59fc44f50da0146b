//! Therapist profile domain model.
//!
//! Each therapist is its own tenant: `tenant_id` is derived from the
//! principal id at creation time and is immutable afterwards. It is the
//! partition key for all of the therapist's patients, appointments and
//! clinical records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapistProfile {
    pub uid: Uuid,
    /// Professional license id (cédula profesional).
    pub cedula: String,
    pub specialization: Vec<String>,
    pub license_number: Option<String>,
    /// Tenant-partition key, `"tenant_" + uid`. Immutable.
    pub tenant_id: String,
    pub is_verified: bool,
    pub bank_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTherapistProfile {
    pub uid: Uuid,
    pub cedula: String,
    pub specialization: Vec<String>,
    pub license_number: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTherapistProfile {
    pub specialization: Option<Vec<String>>,
    pub license_number: Option<Option<String>>,
    pub bank_info: Option<Option<serde_json::Value>>,
}
