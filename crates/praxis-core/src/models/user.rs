//! Base user profile domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::claims::Role;

/// Profile document shared by every account, 1:1 with its
/// identity-directory principal by id. Created once and never deleted;
/// removal is the `is_deleted` soft flag only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Fields required to create a new user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserProfile {
    pub uid: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

/// Fields that can be updated on an existing user profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUserProfile {
    pub email: Option<String>,
    pub display_name: Option<String>,
}
