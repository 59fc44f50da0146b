//! SurrealDB repository implementations.

mod appointment;
mod audit;
mod invitation;
mod patient_profile;
mod relationship;
mod therapist_profile;
mod user_profile;

pub use appointment::SurrealAppointmentRepository;
pub use audit::SurrealAuditLogRepository;
pub use invitation::SurrealInvitationRepository;
pub use patient_profile::SurrealPatientProfileRepository;
pub use relationship::SurrealRelationshipRepository;
pub use therapist_profile::SurrealTherapistProfileRepository;
pub use user_profile::SurrealUserProfileRepository;
