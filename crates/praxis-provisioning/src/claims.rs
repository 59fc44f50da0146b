//! Claims writer — the single funnel for every authorization-claim
//! mutation.
//!
//! Claims are global mutable state keyed by principal id and are
//! touched from several independent call paths (the creation
//! propagator, admin claim edits, relationship changes). All of them
//! go through this writer, which always performs read-merge-write
//! against the directory, so partial-field writers cannot diverge.
//!
//! There is no optimistic locking: concurrent relationship changes for
//! the same patient are last-writer-wins, accepted because such edits
//! are operationally rare (one admin or therapist action at a time).

use praxis_core::directory::IdentityDirectory;
use praxis_core::error::PraxisResult;
use praxis_core::models::claims::{ClaimSet, Role, tenant_id_for};
use praxis_core::repository::{TherapistProfileRepository, UserProfileRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::Caller;

#[derive(Clone)]
pub struct ClaimsWriter<D, U, T> {
    directory: D,
    users: U,
    therapists: T,
}

impl<D, U, T> ClaimsWriter<D, U, T>
where
    D: IdentityDirectory,
    U: UserProfileRepository,
    T: TherapistProfileRepository,
{
    pub fn new(directory: D, users: U, therapists: T) -> Self {
        Self {
            directory,
            users,
            therapists,
        }
    }

    /// Terminal write: replace the claim set and invalidate
    /// outstanding tokens.
    async fn write(&self, uid: Uuid, claims: ClaimSet) -> PraxisResult<()> {
        self.directory.set_claims(uid, claims).await?;
        self.directory.force_claims_refresh(uid).await
    }

    /// Asynchronous trigger fired after a principal is created.
    ///
    /// Profile creation is expected to precede or race with this
    /// trigger: a missing profile is a no-op, not an error. Claims the
    /// provisioning path already set explicitly (a pre-verified
    /// therapist, a patient's seeded therapist list) are preserved by
    /// the merge.
    pub async fn on_principal_created(&self, uid: Uuid) -> PraxisResult<()> {
        let profile = match self.users.get_by_uid(uid).await {
            Ok(profile) => profile,
            Err(err) if err.is_not_found() => {
                debug!(uid = %uid, "No profile yet; claims propagation skipped");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let existing = self.directory.lookup_by_id(uid).await?.claims;
        let claims = match profile.role {
            Role::Admin => ClaimSet::admin(),
            Role::Patient => {
                let therapist_ids = existing
                    .and_then(|c| c.therapist_ids)
                    .unwrap_or_default();
                ClaimSet::patient(therapist_ids)
            }
            Role::Therapist => {
                let is_verified = existing.and_then(|c| c.is_verified).unwrap_or(false);
                ClaimSet::therapist(tenant_id_for(uid), is_verified)
            }
        };

        info!(uid = %uid, role = ?profile.role, "Propagated claims from profile");
        self.write(uid, claims).await
    }

    /// Explicit claim write used by the provisioning flows, bypassing
    /// derivation (the therapist path sets `is_verified` up front to
    /// avoid racing the asynchronous propagator).
    pub async fn set_role_claims(&self, uid: Uuid, claims: ClaimSet) -> PraxisResult<()> {
        self.write(uid, claims).await
    }

    /// Admin-only direct claim mutation, used for verification
    /// toggles. The therapist profile's `is_verified` flag is synced
    /// in both directions so claims and profile cannot drift.
    pub async fn set_custom_claims(
        &self,
        caller: &Caller,
        uid: Uuid,
        claims: ClaimSet,
    ) -> PraxisResult<()> {
        caller.require_admin()?;

        if claims.role == Role::Therapist {
            if let Some(is_verified) = claims.is_verified {
                self.therapists.set_verified(uid, is_verified).await?;
            }
        }

        info!(uid = %uid, role = ?claims.role, "Admin claim write");
        self.write(uid, claims).await
    }

    /// Append a therapist to a patient's claim list if absent.
    /// Membership is enforced by an explicit check, not a set type.
    pub async fn add_therapist(&self, patient_id: Uuid, therapist_id: Uuid) -> PraxisResult<()> {
        self.update_patient_therapists(patient_id, |ids| {
            if !ids.contains(&therapist_id) {
                ids.push(therapist_id);
            }
        })
        .await
    }

    /// Remove one therapist from a patient's claim list and append
    /// another, in a single claim write. Used by transfers.
    pub async fn swap_therapist(
        &self,
        patient_id: Uuid,
        old_therapist_id: Uuid,
        new_therapist_id: Uuid,
    ) -> PraxisResult<()> {
        self.update_patient_therapists(patient_id, |ids| {
            ids.retain(|id| *id != old_therapist_id);
            if !ids.contains(&new_therapist_id) {
                ids.push(new_therapist_id);
            }
        })
        .await
    }

    /// Remove a therapist from a patient's claim list.
    pub async fn remove_therapist(&self, patient_id: Uuid, therapist_id: Uuid) -> PraxisResult<()> {
        self.update_patient_therapists(patient_id, |ids| {
            ids.retain(|id| *id != therapist_id);
        })
        .await
    }

    async fn update_patient_therapists(
        &self,
        patient_id: Uuid,
        mutate: impl FnOnce(&mut Vec<Uuid>),
    ) -> PraxisResult<()> {
        let principal = self.directory.lookup_by_id(patient_id).await?;
        let mut claims = principal.claims.unwrap_or_else(|| ClaimSet::patient(vec![]));
        let mut ids = claims.therapist_ids.take().unwrap_or_default();
        mutate(&mut ids);
        claims.therapist_ids = Some(ids);
        self.write(patient_id, claims).await
    }
}
