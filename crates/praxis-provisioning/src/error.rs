//! Provisioning error types.

use praxis_core::error::PraxisError;
use praxis_core::models::invitation::InvitationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("caller is not authorized: {0}")]
    NotAuthorized(String),

    #[error("invitation is not pending (status: {0:?})")]
    InvitationNotPending(InvitationStatus),

    #[error("invitation has expired")]
    InvitationExpired,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed tenant key: {0}")]
    MalformedTenant(String),
}

impl From<ProvisioningError> for PraxisError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::NotAuthorized(reason) => PraxisError::PermissionDenied { reason },
            ProvisioningError::InvitationNotPending(status) => PraxisError::FailedPrecondition {
                message: format!("invitation status is {status:?}"),
            },
            ProvisioningError::InvitationExpired => PraxisError::DeadlineExceeded {
                message: "invitation has expired".into(),
            },
            ProvisioningError::InvalidInput(message) => PraxisError::InvalidArgument { message },
            ProvisioningError::MalformedTenant(tenant) => PraxisError::Internal(format!(
                "tenant key does not name a therapist: {tenant}"
            )),
        }
    }
}
