//! Patient profile domain model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patient-specific profile fields. Created empty at provisioning time
/// and filled in by the patient afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub uid: Uuid,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub emergency_contact: Option<String>,
}

impl PatientProfile {
    /// The empty profile written during provisioning.
    pub fn empty(uid: Uuid) -> Self {
        Self {
            uid,
            date_of_birth: None,
            phone: None,
            emergency_contact: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePatientProfile {
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub phone: Option<Option<String>>,
    pub emergency_contact: Option<Option<String>>,
}
