//! Praxis Provisioning — invitation-based onboarding, claim
//! propagation, and the therapist–patient relationship lifecycle.
//!
//! Everything here is generic over the `praxis-core` storage and
//! directory ports so the provisioning layer has no dependency on the
//! database crate.

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod invitations;
pub mod relationships;
pub mod service;

pub use claims::ClaimsWriter;
pub use config::ProvisioningConfig;
pub use context::Caller;
pub use error::ProvisioningError;
pub use invitations::{InvitationLedger, InvitationView, IssueAdminInvitation};
pub use relationships::RelationshipManager;
pub use service::{
    AdminUpdateUser, CreateTherapistUser, IssuedInvitation, ProvisioningService,
    RedeemTherapistInvitation,
};
