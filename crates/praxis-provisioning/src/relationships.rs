//! Relationship manager — the therapist–patient assignment lifecycle,
//! including the multi-step cross-tenant transfer protocol.

use chrono::Utc;
use praxis_core::directory::IdentityDirectory;
use praxis_core::error::PraxisResult;
use praxis_core::models::claims::tenant_id_for;
use praxis_core::models::relationship::{
    Relationship, RelationshipAuditEntry, RelationshipStatus,
};
use praxis_core::repository::{
    AppointmentRepository, RelationshipRepository, TherapistProfileRepository,
    UserProfileRepository,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::claims::ClaimsWriter;
use crate::context::Caller;
use crate::error::ProvisioningError;

#[derive(Clone)]
pub struct RelationshipManager<R, A, D, U, T> {
    relationships: R,
    appointments: A,
    claims: ClaimsWriter<D, U, T>,
}

impl<R, A, D, U, T> RelationshipManager<R, A, D, U, T>
where
    R: RelationshipRepository,
    A: AppointmentRepository,
    D: IdentityDirectory,
    U: UserProfileRepository,
    T: TherapistProfileRepository,
{
    pub fn new(relationships: R, appointments: A, claims: ClaimsWriter<D, U, T>) -> Self {
        Self {
            relationships,
            appointments,
            claims,
        }
    }

    /// Create-if-absent at the pair's composite id, status `Active`.
    ///
    /// Re-invocation on an existing `Active` pair is a no-op returning
    /// the current state. An `Inactive` record is reactivated — this
    /// path is not guarded against resurrection, so callers check the
    /// status first when reactivation is not intended.
    pub async fn create_relationship(
        &self,
        therapist_id: Uuid,
        patient_id: Uuid,
        tenant_id: String,
        created_by: Uuid,
    ) -> PraxisResult<Relationship> {
        let id = Relationship::composite_id(therapist_id, patient_id);

        match self.relationships.get(&id).await {
            Ok(existing) if existing.status == RelationshipStatus::Active => Ok(existing),
            Ok(_inactive) => {
                self.relationships
                    .set_status(
                        &id,
                        RelationshipStatus::Active,
                        None,
                        RelationshipAuditEntry::new(created_by, "REACTIVATE"),
                    )
                    .await
            }
            Err(err) if err.is_not_found() => {
                let relationship =
                    Relationship::new_active(therapist_id, patient_id, tenant_id, created_by);
                let created = self.relationships.create(&relationship).await?;
                info!(
                    relationship_id = %created.id,
                    tenant_id = %created.tenant_id,
                    "Created relationship"
                );
                Ok(created)
            }
            Err(err) => Err(err),
        }
    }

    /// Append a therapist to a patient's claim list.
    pub async fn add_therapist_to_patient_claims(
        &self,
        patient_id: Uuid,
        therapist_id: Uuid,
    ) -> PraxisResult<()> {
        self.claims.add_therapist(patient_id, therapist_id).await
    }

    /// Close a care assignment: relationship goes `Inactive` with an
    /// end timestamp, and the therapist leaves the patient's claim
    /// list. Allowed to the therapist of record or an admin.
    pub async fn end_relationship(
        &self,
        caller: &Caller,
        therapist_id: Uuid,
        patient_id: Uuid,
    ) -> PraxisResult<()> {
        if !caller.claims.is_admin() && caller.uid != therapist_id {
            return Err(ProvisioningError::NotAuthorized(
                "only the therapist of record or an admin may end a relationship".into(),
            )
            .into());
        }

        let id = Relationship::composite_id(therapist_id, patient_id);
        self.relationships
            .set_status(
                &id,
                RelationshipStatus::Inactive,
                Some(Utc::now()),
                RelationshipAuditEntry::new(caller.uid, "END"),
            )
            .await?;

        self.claims.remove_therapist(patient_id, therapist_id).await?;

        info!(relationship_id = %id, "Ended relationship");
        Ok(())
    }

    /// Move a patient from one therapist's tenant to another's.
    ///
    /// Four steps, each independently durable; the sequence is not
    /// atomic. A crash mid-way leaves the patient attached to both
    /// therapists in relationship records, but step 1's `Inactive`
    /// marker makes the inconsistency detectable and steps 2–4 are
    /// safe to re-run.
    pub async fn transfer(
        &self,
        caller: &Caller,
        patient_id: Uuid,
        old_therapist_id: Uuid,
        new_therapist_id: Uuid,
    ) -> PraxisResult<()> {
        if !caller.claims.is_admin() && caller.uid != old_therapist_id {
            return Err(ProvisioningError::NotAuthorized(
                "only the current therapist or an admin may transfer a patient".into(),
            )
            .into());
        }
        if old_therapist_id == new_therapist_id {
            return Err(ProvisioningError::InvalidInput(
                "old and new therapist are the same".into(),
            )
            .into());
        }

        let old_id = Relationship::composite_id(old_therapist_id, patient_id);
        let new_id = Relationship::composite_id(new_therapist_id, patient_id);
        let new_tenant = tenant_id_for(new_therapist_id);

        // (1) Close the old assignment. Fails NotFound before anything
        // is written if no such relationship exists.
        self.relationships
            .set_status(
                &old_id,
                RelationshipStatus::Inactive,
                Some(Utc::now()),
                RelationshipAuditEntry::new(caller.uid, "TRANSFER_OUT")
                    .with_changes(json!({ "transferred_to": new_therapist_id })),
            )
            .await?;

        // (2) Open the new assignment under the new therapist's
        // tenant. Tolerates a pre-existing record so a crashed
        // transfer can be re-driven.
        match self.relationships.get(&new_id).await {
            Ok(existing) if existing.status == RelationshipStatus::Active => {}
            Ok(_inactive) => {
                self.relationships
                    .set_status(
                        &new_id,
                        RelationshipStatus::Active,
                        None,
                        RelationshipAuditEntry::new(caller.uid, "TRANSFER_IN")
                            .with_changes(json!({ "transferred_from": old_therapist_id })),
                    )
                    .await?;
            }
            Err(err) if err.is_not_found() => {
                let mut relationship = Relationship::new_active(
                    new_therapist_id,
                    patient_id,
                    new_tenant.clone(),
                    caller.uid,
                );
                relationship.audit_log[0].changes =
                    Some(json!({ "transferred_from": old_therapist_id }));
                self.relationships.create(&relationship).await?;
            }
            Err(err) => return Err(err),
        }

        // (3) Reattribute still-scheduled appointments.
        let moved = self
            .appointments
            .reassign_scheduled(patient_id, old_therapist_id, new_therapist_id, &new_tenant)
            .await?;

        // (4) Recompute the patient's therapist claim list.
        self.claims
            .swap_therapist(patient_id, old_therapist_id, new_therapist_id)
            .await?;

        info!(
            patient_id = %patient_id,
            old_therapist_id = %old_therapist_id,
            new_therapist_id = %new_therapist_id,
            appointments_moved = moved,
            "Transferred patient"
        );
        Ok(())
    }

    /// All relationships for a patient, oldest first.
    pub async fn relationships_for_patient(
        &self,
        patient_id: Uuid,
    ) -> PraxisResult<Vec<Relationship>> {
        self.relationships.list_for_patient(patient_id).await
    }
}
