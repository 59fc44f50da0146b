//! Provisioning orchestrator — the callable entry points that compose
//! the ledger, claims writer and relationship manager into
//! atomic-looking account-creation flows.
//!
//! The directory and the document store are not jointly transactional,
//! so every flow orders its writes: principal creation first (the
//! least-reversible step), invitation consumption strictly last. A
//! failure in between leaves a principal without profile documents;
//! [`ProvisioningService::sweep_orphaned_principals`] reconciles those
//! instead of any in-band rollback.

use chrono::{Duration, Utc};
use praxis_core::directory::{CreatePrincipal, IdentityDirectory, UpdatePrincipal};
use praxis_core::error::{PraxisError, PraxisResult};
use praxis_core::models::audit::{ActorType, AuditOutcome, CreateAuditLogEntry};
use praxis_core::models::claims::{ClaimSet, Role, tenant_id_for, therapist_uid_from_tenant};
use praxis_core::models::invitation::{Invitation, InvitedRole};
use praxis_core::models::patient::PatientProfile;
use praxis_core::models::therapist::{CreateTherapistProfile, UpdateTherapistProfile};
use praxis_core::models::user::{CreateUserProfile, UpdateUserProfile};
use praxis_core::repository::{
    AppointmentRepository, AuditLogRepository, InvitationRepository, PatientProfileRepository,
    RelationshipRepository, TherapistProfileRepository, UserProfileRepository,
};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::claims::ClaimsWriter;
use crate::config::ProvisioningConfig;
use crate::context::Caller;
use crate::error::ProvisioningError;
use crate::invitations::{InvitationLedger, InvitationView, IssueAdminInvitation, validate_email};
use crate::relationships::RelationshipManager;

/// Input for direct (admin) therapist account creation.
#[derive(Debug, Clone)]
pub struct CreateTherapistUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub cedula: String,
    pub specialization: Vec<String>,
    pub license_number: Option<String>,
}

/// Result of a successful invitation issuance.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub token: String,
    pub invitation_url: String,
    pub expires_in_secs: u64,
}

/// Account fields submitted when redeeming a therapist invitation.
#[derive(Debug, Clone)]
pub struct RedeemTherapistInvitation {
    pub display_name: String,
    pub password: String,
    pub cedula: String,
    pub specialization: Vec<String>,
    pub license_number: Option<String>,
}

/// Admin-side profile edit.
#[derive(Debug, Clone, Default)]
pub struct AdminUpdateUser {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub specialization: Option<Vec<String>>,
}

pub struct ProvisioningService<D, U, T, P, I, R, A, L> {
    directory: D,
    users: U,
    therapists: T,
    patients: P,
    audit: L,
    ledger: InvitationLedger<I, D>,
    claims: ClaimsWriter<D, U, T>,
    relationships: RelationshipManager<R, A, D, U, T>,
    config: ProvisioningConfig,
}

impl<D, U, T, P, I, R, A, L> ProvisioningService<D, U, T, P, I, R, A, L>
where
    D: IdentityDirectory + Clone,
    U: UserProfileRepository + Clone,
    T: TherapistProfileRepository + Clone,
    P: PatientProfileRepository,
    I: InvitationRepository,
    R: RelationshipRepository,
    A: AppointmentRepository,
    L: AuditLogRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: D,
        users: U,
        therapists: T,
        patients: P,
        invitations: I,
        relationships: R,
        appointments: A,
        audit: L,
        config: ProvisioningConfig,
    ) -> Self {
        let claims = ClaimsWriter::new(directory.clone(), users.clone(), therapists.clone());
        let ledger = InvitationLedger::new(invitations, directory.clone(), config.clone());
        let relationships = RelationshipManager::new(relationships, appointments, claims.clone());
        Self {
            directory,
            users,
            therapists,
            patients,
            audit,
            ledger,
            claims,
            relationships,
            config,
        }
    }

    pub fn ledger(&self) -> &InvitationLedger<I, D> {
        &self.ledger
    }

    pub fn relationships(&self) -> &RelationshipManager<R, A, D, U, T> {
        &self.relationships
    }

    fn validate_new_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> PraxisResult<()> {
        validate_email(email)?;
        if password.len() < self.config.min_password_length {
            return Err(ProvisioningError::InvalidInput(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            ))
            .into());
        }
        if display_name.trim().is_empty() {
            return Err(ProvisioningError::InvalidInput("display name is required".into()).into());
        }
        Ok(())
    }

    /// Map a failure after principal creation: the principal stays
    /// behind as an orphan for the reconciliation sweep.
    fn partial_provisioning(uid: Uuid, err: PraxisError) -> PraxisError {
        error!(uid = %uid, error = %err, "Account left partially provisioned");
        PraxisError::Internal(format!("account {uid} left partially provisioned: {err}"))
    }

    async fn create_principal_checked(
        &self,
        email: String,
        password: String,
        display_name: String,
    ) -> PraxisResult<Uuid> {
        match self
            .directory
            .create_principal(CreatePrincipal {
                email,
                password,
                display_name,
                email_verified: false,
            })
            .await
        {
            Ok(principal) => Ok(principal.id),
            Err(err @ PraxisError::AlreadyExists { .. }) => Err(err),
            Err(err) => Err(PraxisError::Internal(format!(
                "principal creation failed: {err}"
            ))),
        }
    }

    /// Shared tail of both therapist-creation paths: profile
    /// documents, explicit claims, audit entry.
    async fn finish_therapist(
        &self,
        uid: Uuid,
        actor: Uuid,
        email: &str,
        display_name: &str,
        cedula: String,
        specialization: Vec<String>,
        license_number: Option<String>,
    ) -> PraxisResult<()> {
        self.users
            .create(CreateUserProfile {
                uid,
                email: email.to_string(),
                display_name: display_name.to_string(),
                role: Role::Therapist,
            })
            .await?;

        // Administrator- and invitation-originated therapists are
        // pre-verified; self-registration is the only unverified path
        // and it does not come through here.
        self.therapists
            .create(CreateTherapistProfile {
                uid,
                cedula,
                specialization,
                license_number,
                is_verified: true,
            })
            .await?;

        // Explicit claim write rather than waiting for the
        // asynchronous propagator, which would race the caller's first
        // token read and default the verification flag to false.
        self.claims
            .set_role_claims(uid, ClaimSet::therapist(tenant_id_for(uid), true))
            .await?;

        self.audit
            .append(CreateAuditLogEntry {
                actor_id: actor,
                actor_type: ActorType::User,
                action: "therapist.create".into(),
                subject_id: Some(uid),
                outcome: AuditOutcome::Success,
                metadata: json!({ "email": email }),
            })
            .await?;

        Ok(())
    }

    /// Admin-only direct therapist account creation.
    pub async fn create_therapist_user(
        &self,
        caller: &Caller,
        input: CreateTherapistUser,
    ) -> PraxisResult<Uuid> {
        caller.require_admin()?;
        self.validate_new_account(&input.email, &input.password, &input.display_name)?;
        if input.cedula.trim().is_empty() {
            return Err(ProvisioningError::InvalidInput("cedula is required".into()).into());
        }

        let uid = self
            .create_principal_checked(
                input.email.clone(),
                input.password,
                input.display_name.clone(),
            )
            .await?;

        self.finish_therapist(
            uid,
            caller.uid,
            &input.email,
            &input.display_name,
            input.cedula,
            input.specialization,
            input.license_number,
        )
        .await
        .map_err(|err| Self::partial_provisioning(uid, err))?;

        Ok(uid)
    }

    /// Admin-only invitation issuance, for either role.
    pub async fn create_user_invitation(
        &self,
        caller: &Caller,
        input: IssueAdminInvitation,
    ) -> PraxisResult<IssuedInvitation> {
        let invitation = self.ledger.issue_admin(caller, input).await?;
        Ok(self.issued(invitation.token))
    }

    /// Verified-therapist-only patient invitation issuance.
    pub async fn create_patient_invitation(
        &self,
        caller: &Caller,
        patient_email: String,
        patient_name: Option<String>,
    ) -> PraxisResult<IssuedInvitation> {
        let invitation = self
            .ledger
            .issue_for_patient(caller, patient_email, patient_name)
            .await?;
        Ok(self.issued(invitation.token))
    }

    fn issued(&self, token: String) -> IssuedInvitation {
        IssuedInvitation {
            invitation_url: self.ledger.invitation_url(&token),
            expires_in_secs: self.ledger.lifetime_secs(),
            token,
        }
    }

    /// Public pre-redemption preview.
    pub async fn validate_invitation(&self, token: &str) -> PraxisResult<InvitationView> {
        self.ledger.view(token).await
    }

    /// Issuer-or-admin invitation cancellation.
    pub async fn cancel_invitation(&self, caller: &Caller, token: &str) -> PraxisResult<()> {
        self.ledger.cancel(caller, token).await
    }

    /// Redeem a therapist invitation into a full therapist account.
    ///
    /// Submitted fields win over the invitation's pre-fill; pre-fill
    /// values only back-fill what the form left empty.
    pub async fn create_therapist_from_invitation(
        &self,
        token: &str,
        input: RedeemTherapistInvitation,
    ) -> PraxisResult<Uuid> {
        let invitation = self.ledger.validate(token).await?;

        let Invitation::Admin(admin_inv) = &invitation else {
            return Err(PraxisError::FailedPrecondition {
                message: "invitation does not target the therapist role".into(),
            });
        };
        if admin_inv.role != InvitedRole::Therapist {
            return Err(PraxisError::FailedPrecondition {
                message: "invitation does not target the therapist role".into(),
            });
        }

        self.validate_new_account(&admin_inv.target_email, &input.password, &input.display_name)?;

        let prefill = admin_inv.therapist_data.clone().unwrap_or_default();
        let cedula = if input.cedula.trim().is_empty() {
            prefill.cedula.clone().unwrap_or_default()
        } else {
            input.cedula
        };
        if cedula.trim().is_empty() {
            return Err(ProvisioningError::InvalidInput("cedula is required".into()).into());
        }
        let specialization = if input.specialization.is_empty() {
            prefill.specialization
        } else {
            input.specialization
        };
        let license_number = input.license_number.or(prefill.license_number);

        let uid = self
            .create_principal_checked(
                admin_inv.target_email.clone(),
                input.password,
                input.display_name.clone(),
            )
            .await?;

        self.finish_therapist(
            uid,
            admin_inv.invited_by,
            &admin_inv.target_email,
            &input.display_name,
            cedula,
            specialization,
            license_number,
        )
        .await
        .map_err(|err| Self::partial_provisioning(uid, err))?;

        // Consume the token only once everything else stands, so an
        // upstream failure leaves it Pending and redeemable.
        self.ledger.consume(&invitation, uid).await?;

        Ok(uid)
    }

    async fn finish_patient(
        &self,
        uid: Uuid,
        therapist_id: Uuid,
        tenant_id: String,
        email: &str,
        display_name: &str,
        actor: Uuid,
    ) -> PraxisResult<()> {
        self.users
            .create(CreateUserProfile {
                uid,
                email: email.to_string(),
                display_name: display_name.to_string(),
                role: Role::Patient,
            })
            .await?;

        self.patients.create(PatientProfile::empty(uid)).await?;

        self.relationships
            .create_relationship(therapist_id, uid, tenant_id, actor)
            .await?;

        self.claims
            .set_role_claims(uid, ClaimSet::patient(vec![therapist_id]))
            .await?;

        self.audit
            .append(CreateAuditLogEntry {
                actor_id: uid,
                actor_type: ActorType::User,
                action: "patient.create".into(),
                subject_id: Some(uid),
                outcome: AuditOutcome::Success,
                metadata: json!({ "email": email, "therapist_id": therapist_id }),
            })
            .await?;

        Ok(())
    }

    /// Redeem a patient invitation (either variant) into a patient
    /// account attached to its therapist.
    pub async fn create_patient_from_invitation(
        &self,
        token: &str,
        display_name: String,
        password: String,
    ) -> PraxisResult<Uuid> {
        let invitation = self.ledger.validate(token).await?;

        let (therapist_id, tenant_id, email, actor) = match &invitation {
            Invitation::Admin(inv) => {
                if inv.role != InvitedRole::Patient {
                    return Err(PraxisError::FailedPrecondition {
                        message: "invitation does not target the patient role".into(),
                    });
                }
                let tenant_id = inv.tenant_id.clone().ok_or_else(|| {
                    ProvisioningError::MalformedTenant("<missing>".into())
                })?;
                let therapist_id = therapist_uid_from_tenant(&tenant_id)
                    .ok_or_else(|| ProvisioningError::MalformedTenant(tenant_id.clone()))?;
                (
                    therapist_id,
                    tenant_id,
                    inv.target_email.clone(),
                    inv.invited_by,
                )
            }
            Invitation::Therapist(inv) => (
                inv.therapist_id,
                inv.tenant_id.clone(),
                inv.patient_email.clone(),
                inv.therapist_id,
            ),
        };

        self.validate_new_account(&email, &password, &display_name)?;

        let uid = self
            .create_principal_checked(email.clone(), password, display_name.clone())
            .await?;

        self.finish_patient(uid, therapist_id, tenant_id, &email, &display_name, actor)
            .await
            .map_err(|err| Self::partial_provisioning(uid, err))?;

        // Terminal ledger write, strictly last.
        self.ledger.consume(&invitation, uid).await?;

        Ok(uid)
    }

    /// Admin-only direct claim mutation.
    pub async fn set_custom_claims(
        &self,
        caller: &Caller,
        uid: Uuid,
        claims: ClaimSet,
    ) -> PraxisResult<()> {
        self.claims.set_custom_claims(caller, uid, claims).await?;

        self.audit
            .append(CreateAuditLogEntry {
                actor_id: caller.uid,
                actor_type: ActorType::User,
                action: "claims.set".into(),
                subject_id: Some(uid),
                outcome: AuditOutcome::Success,
                metadata: json!({}),
            })
            .await?;

        Ok(())
    }

    /// Asynchronous directory trigger: derive claims from the profile
    /// written during provisioning. No-ops when the profile has not
    /// landed yet.
    pub async fn on_principal_created(&self, uid: Uuid) -> PraxisResult<()> {
        self.claims.on_principal_created(uid).await
    }

    /// Admin-only profile edit, kept in step across the profile
    /// document and the directory record.
    pub async fn admin_update_user(
        &self,
        caller: &Caller,
        uid: Uuid,
        input: AdminUpdateUser,
    ) -> PraxisResult<()> {
        caller.require_admin()?;
        if let Some(ref email) = input.email {
            validate_email(email)?;
        }

        self.users
            .update(
                uid,
                UpdateUserProfile {
                    email: input.email.clone(),
                    display_name: input.display_name.clone(),
                },
            )
            .await?;

        self.directory
            .update_principal(
                uid,
                UpdatePrincipal {
                    email: input.email,
                    display_name: input.display_name,
                },
            )
            .await?;

        if let Some(specialization) = input.specialization {
            self.therapists
                .update(
                    uid,
                    UpdateTherapistProfile {
                        specialization: Some(specialization),
                        ..Default::default()
                    },
                )
                .await?;
        }

        self.audit
            .append(CreateAuditLogEntry {
                actor_id: caller.uid,
                actor_type: ActorType::User,
                action: "user.update".into(),
                subject_id: Some(uid),
                outcome: AuditOutcome::Success,
                metadata: json!({}),
            })
            .await?;

        Ok(())
    }

    /// Move a patient to a new therapist. Allowed to the current
    /// therapist of record or an admin.
    pub async fn transfer_patient(
        &self,
        caller: &Caller,
        patient_id: Uuid,
        old_therapist_id: Uuid,
        new_therapist_id: Uuid,
    ) -> PraxisResult<()> {
        self.relationships
            .transfer(caller, patient_id, old_therapist_id, new_therapist_id)
            .await?;

        self.audit
            .append(CreateAuditLogEntry {
                actor_id: caller.uid,
                actor_type: ActorType::User,
                action: "patient.transfer".into(),
                subject_id: Some(patient_id),
                outcome: AuditOutcome::Success,
                metadata: json!({
                    "old_therapist_id": old_therapist_id,
                    "new_therapist_id": new_therapist_id,
                }),
            })
            .await?;

        Ok(())
    }

    /// Reconciliation sweep for principals left behind by a failure
    /// between principal creation and profile writes: any principal
    /// older than the grace period with no user profile is deleted.
    /// Returns the number removed.
    pub async fn sweep_orphaned_principals(&self, caller: &Caller) -> PraxisResult<u64> {
        caller.require_admin()?;

        let cutoff = Utc::now() - Duration::seconds(self.config.orphan_grace_secs as i64);
        let stale = self.directory.list_created_before(cutoff).await?;

        let mut removed = 0;
        for principal in stale {
            match self.users.get_by_uid(principal.id).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    warn!(
                        uid = %principal.id,
                        email = %principal.email,
                        "Deleting orphaned principal"
                    );
                    self.directory.delete_principal(principal.id).await?;
                    self.audit
                        .append(CreateAuditLogEntry {
                            actor_id: caller.uid,
                            actor_type: ActorType::System,
                            action: "principal.orphan_sweep".into(),
                            subject_id: Some(principal.id),
                            outcome: AuditOutcome::Success,
                            metadata: json!({ "email": principal.email }),
                        })
                        .await?;
                    removed += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(removed)
    }
}
