//! Invitation ledger — issuance, validation, and consumption of the
//! time-boxed single-use tokens that authorize account creation.
//!
//! Tokens are UUIDv4 strings used directly as the record key of their
//! backing table; a random collision simply fails the create-if-absent
//! write. Expiry is lazy: it is discovered and written on the first
//! read past `expires_at`.

use chrono::{DateTime, Duration, Utc};
use praxis_core::directory::IdentityDirectory;
use praxis_core::error::{PraxisError, PraxisResult};
use praxis_core::models::claims::therapist_uid_from_tenant;
use praxis_core::models::invitation::{
    AdminInvitation, Invitation, InvitationStatus, InvitedRole, TherapistInvitation,
    TherapistPrefill,
};
use praxis_core::repository::{InvitationRepository, PaginatedResult, Pagination};
use tracing::info;
use uuid::Uuid;

use crate::config::ProvisioningConfig;
use crate::context::Caller;
use crate::error::ProvisioningError;

/// Input for an admin-issued invitation.
#[derive(Debug, Clone)]
pub struct IssueAdminInvitation {
    pub role: InvitedRole,
    pub target_email: String,
    pub target_name: Option<String>,
    /// Required iff `role` is `Patient`: the tenant the patient joins.
    pub tenant_id: Option<String>,
    /// Optional pre-fill, only meaningful when `role` is `Therapist`.
    pub therapist_data: Option<TherapistPrefill>,
}

/// Normalized pre-redemption view of a pending invitation.
#[derive(Debug, Clone)]
pub struct InvitationView {
    pub role: InvitedRole,
    pub inviter_name: String,
    pub target_email: String,
    pub target_name: Option<String>,
    pub tenant_id: Option<String>,
    pub therapist_id: Option<Uuid>,
    pub prefill: Option<TherapistPrefill>,
    pub expires_at: DateTime<Utc>,
}

pub(crate) fn validate_email(email: &str) -> PraxisResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ProvisioningError::InvalidInput(format!("malformed email: {email:?}")).into());
    }
    Ok(())
}

/// The invitation ledger.
///
/// Generic over the repository and directory ports so it carries no
/// database dependency.
#[derive(Clone)]
pub struct InvitationLedger<I, D> {
    invitations: I,
    directory: D,
    config: ProvisioningConfig,
}

impl<I: InvitationRepository, D: IdentityDirectory> InvitationLedger<I, D> {
    pub fn new(invitations: I, directory: D, config: ProvisioningConfig) -> Self {
        Self {
            invitations,
            directory,
            config,
        }
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.config.invitation_lifetime_secs
    }

    /// Link a recipient can follow to redeem the token.
    pub fn invitation_url(&self, token: &str) -> String {
        format!("{}?invite={token}", self.config.invitation_base_url)
    }

    /// Existence probe against the directory. "Not found" is the only
    /// success path; a registered principal fails `AlreadyExists`, and
    /// any other outcome is propagated as-is.
    async fn probe_email_is_free(&self, email: &str) -> PraxisResult<()> {
        match self.directory.lookup_by_email(email).await {
            Err(err) if err.is_not_found() => Ok(()),
            Ok(_) => Err(PraxisError::AlreadyExists {
                entity: format!("principal email={email}"),
            }),
            Err(err) => Err(err),
        }
    }

    fn expiry_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (
            now,
            now + Duration::seconds(self.config.invitation_lifetime_secs as i64),
        )
    }

    /// Issue an admin invitation for either role.
    pub async fn issue_admin(
        &self,
        caller: &Caller,
        input: IssueAdminInvitation,
    ) -> PraxisResult<AdminInvitation> {
        caller.require_admin()?;
        validate_email(&input.target_email)?;

        match input.role {
            InvitedRole::Patient => {
                let tenant = input.tenant_id.as_deref().ok_or_else(|| {
                    ProvisioningError::InvalidInput(
                        "tenant_id is required for patient invitations".into(),
                    )
                })?;
                if therapist_uid_from_tenant(tenant).is_none() {
                    return Err(ProvisioningError::InvalidInput(format!(
                        "tenant_id does not name a therapist tenant: {tenant}"
                    ))
                    .into());
                }
            }
            InvitedRole::Therapist => {
                if input.tenant_id.is_some() {
                    return Err(ProvisioningError::InvalidInput(
                        "tenant_id is only valid for patient invitations".into(),
                    )
                    .into());
                }
            }
        }

        self.probe_email_is_free(&input.target_email).await?;

        let (now, expires_at) = self.expiry_window();
        let invitation = AdminInvitation {
            token: Uuid::new_v4().to_string(),
            role: input.role,
            invited_by: caller.uid,
            target_email: input.target_email,
            target_name: input.target_name,
            tenant_id: input.tenant_id,
            therapist_data: input.therapist_data,
            status: InvitationStatus::Pending,
            expires_at,
            created_at: now,
            used_at: None,
            redeemed_uid: None,
        };

        self.invitations
            .create(&Invitation::Admin(invitation.clone()))
            .await?;

        info!(
            token = %invitation.token,
            role = ?invitation.role,
            target_email = %invitation.target_email,
            "Issued admin invitation"
        );

        Ok(invitation)
    }

    /// Issue a patient invitation on behalf of the calling therapist.
    /// Only verified therapists may invite, and only into their own
    /// tenant.
    pub async fn issue_for_patient(
        &self,
        caller: &Caller,
        patient_email: String,
        patient_name: Option<String>,
    ) -> PraxisResult<TherapistInvitation> {
        caller.require_verified_therapist()?;
        validate_email(&patient_email)?;

        let tenant_id = caller.claims.tenant_id.clone().ok_or_else(|| {
            ProvisioningError::InvalidInput("caller claims carry no tenant".into())
        })?;

        self.probe_email_is_free(&patient_email).await?;

        let issuer = self.directory.lookup_by_id(caller.uid).await?;

        let (now, expires_at) = self.expiry_window();
        let invitation = TherapistInvitation {
            token: Uuid::new_v4().to_string(),
            therapist_id: caller.uid,
            therapist_email: issuer.email,
            therapist_name: issuer.display_name,
            patient_email,
            patient_name,
            tenant_id,
            status: InvitationStatus::Pending,
            expires_at,
            created_at: now,
            used_at: None,
            redeemed_uid: None,
        };

        self.invitations
            .create(&Invitation::Therapist(invitation.clone()))
            .await?;

        info!(
            token = %invitation.token,
            therapist_id = %invitation.therapist_id,
            patient_email = %invitation.patient_email,
            "Issued patient invitation"
        );

        Ok(invitation)
    }

    /// Resolve a token and check it is still redeemable.
    ///
    /// Read-only except for the lazy expiry write. This is re-invoked
    /// at the start of redemption, not just trusted from a prior
    /// client-side preview, to close the time-of-check/time-of-use
    /// gap.
    pub async fn validate(&self, token: &str) -> PraxisResult<Invitation> {
        let invitation = self.invitations.find_by_token(token).await?;

        if invitation.status() != InvitationStatus::Pending {
            return Err(ProvisioningError::InvitationNotPending(invitation.status()).into());
        }

        if Utc::now() > invitation.expires_at() {
            self.invitations
                .mark_expired(token, invitation.kind())
                .await?;
            info!(token = %token, "Invitation expired lazily on read");
            return Err(ProvisioningError::InvitationExpired.into());
        }

        Ok(invitation)
    }

    /// Pre-redemption preview: the validated invitation, normalized
    /// across both variants.
    pub async fn view(&self, token: &str) -> PraxisResult<InvitationView> {
        let invitation = self.validate(token).await?;

        Ok(match invitation {
            Invitation::Admin(inv) => {
                let inviter = self.directory.lookup_by_id(inv.invited_by).await?;
                let therapist_id = inv.tenant_id.as_deref().and_then(therapist_uid_from_tenant);
                InvitationView {
                    role: inv.role,
                    inviter_name: inviter.display_name,
                    target_email: inv.target_email,
                    target_name: inv.target_name,
                    tenant_id: inv.tenant_id,
                    therapist_id,
                    prefill: inv.therapist_data,
                    expires_at: inv.expires_at,
                }
            }
            Invitation::Therapist(inv) => InvitationView {
                role: InvitedRole::Patient,
                inviter_name: inv.therapist_name,
                target_email: inv.patient_email,
                target_name: inv.patient_name,
                tenant_id: Some(inv.tenant_id),
                therapist_id: Some(inv.therapist_id),
                prefill: None,
                expires_at: inv.expires_at,
            },
        })
    }

    /// Cancel a pending invitation. Allowed to its issuer or an admin.
    pub async fn cancel(&self, caller: &Caller, token: &str) -> PraxisResult<()> {
        let invitation = self.invitations.find_by_token(token).await?;

        if !caller.claims.is_admin() && invitation.issuer() != caller.uid {
            return Err(
                ProvisioningError::NotAuthorized("only the issuer or an admin may cancel".into())
                    .into(),
            );
        }
        if invitation.status() != InvitationStatus::Pending {
            return Err(ProvisioningError::InvitationNotPending(invitation.status()).into());
        }

        self.invitations
            .mark_cancelled(token, invitation.kind())
            .await?;

        info!(token = %token, "Invitation cancelled");
        Ok(())
    }

    /// Terminal redemption write. Kept as the last step of every
    /// redemption flow so a failure anywhere upstream leaves the token
    /// Pending and redeemable.
    pub async fn consume(&self, invitation: &Invitation, redeemed_uid: Uuid) -> PraxisResult<()> {
        self.invitations
            .mark_used(invitation.token(), invitation.kind(), redeemed_uid, Utc::now())
            .await?;

        info!(
            token = %invitation.token(),
            redeemed_uid = %redeemed_uid,
            "Invitation redeemed"
        );
        Ok(())
    }

    /// The caller's own invitations, newest first.
    pub async fn list_own(
        &self,
        caller: &Caller,
        pagination: Pagination,
    ) -> PraxisResult<PaginatedResult<Invitation>> {
        self.invitations.list_by_issuer(caller.uid, pagination).await
    }
}
