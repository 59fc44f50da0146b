//! Caller context attached to every request.

use praxis_core::error::PraxisResult;
use praxis_core::models::claims::ClaimSet;
use uuid::Uuid;

use crate::error::ProvisioningError;

/// The authenticated identity a request arrives with: principal id
/// plus the claim set its access token carried. The transport layer
/// (out of scope here) is responsible for having verified the token.
#[derive(Debug, Clone)]
pub struct Caller {
    pub uid: Uuid,
    pub claims: ClaimSet,
}

impl Caller {
    pub fn new(uid: Uuid, claims: ClaimSet) -> Self {
        Self { uid, claims }
    }

    /// Fails `PermissionDenied` unless the caller is an admin.
    pub fn require_admin(&self) -> PraxisResult<()> {
        if self.claims.is_admin() {
            Ok(())
        } else {
            Err(ProvisioningError::NotAuthorized("admin role required".into()).into())
        }
    }

    /// Fails `PermissionDenied` unless the caller is a verified
    /// therapist.
    pub fn require_verified_therapist(&self) -> PraxisResult<()> {
        if self.claims.is_verified_therapist() {
            Ok(())
        } else {
            Err(
                ProvisioningError::NotAuthorized("verified therapist role required".into())
                    .into(),
            )
        }
    }
}
