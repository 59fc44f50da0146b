//! Integration tests for the cross-tenant patient transfer protocol.

use chrono::{Duration, Utc};
use praxis_core::directory::{CreatePrincipal, IdentityDirectory};
use praxis_core::error::PraxisError;
use praxis_core::models::appointment::{AppointmentStatus, CreateAppointment};
use praxis_core::models::claims::{ClaimSet, tenant_id_for};
use praxis_core::models::relationship::{Relationship, RelationshipStatus};
use praxis_core::repository::{AppointmentRepository, RelationshipRepository};
use praxis_db::repository::{
    SurrealAppointmentRepository, SurrealAuditLogRepository, SurrealInvitationRepository,
    SurrealPatientProfileRepository, SurrealRelationshipRepository,
    SurrealTherapistProfileRepository, SurrealUserProfileRepository,
};
use praxis_db::{DirectoryConfig, SurrealDirectory};
use praxis_provisioning::{Caller, CreateTherapistUser, ProvisioningConfig, ProvisioningService};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

type Db = surrealdb::engine::local::Db;
type Service = ProvisioningService<
    SurrealDirectory<Db>,
    SurrealUserProfileRepository<Db>,
    SurrealTherapistProfileRepository<Db>,
    SurrealPatientProfileRepository<Db>,
    SurrealInvitationRepository<Db>,
    SurrealRelationshipRepository<Db>,
    SurrealAppointmentRepository<Db>,
    SurrealAuditLogRepository<Db>,
>;

async fn setup() -> (Service, SurrealDirectory<Db>, Surreal<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    praxis_db::run_migrations(&db).await.unwrap();

    let directory = SurrealDirectory::new(
        db.clone(),
        DirectoryConfig {
            jwt_secret: "praxis-test-secret".into(),
            ..Default::default()
        },
    );
    let service = ProvisioningService::new(
        directory.clone(),
        SurrealUserProfileRepository::new(db.clone()),
        SurrealTherapistProfileRepository::new(db.clone()),
        SurrealPatientProfileRepository::new(db.clone()),
        SurrealInvitationRepository::new(db.clone()),
        SurrealRelationshipRepository::new(db.clone()),
        SurrealAppointmentRepository::new(db.clone()),
        SurrealAuditLogRepository::new(db.clone()),
        ProvisioningConfig::default(),
    );
    (service, directory, db)
}

async fn admin_caller(directory: &SurrealDirectory<Db>) -> Caller {
    let principal = directory
        .create_principal(CreatePrincipal {
            email: format!("admin-{}@praxis.test", Uuid::new_v4()),
            password: "admin-password".into(),
            display_name: "Root Admin".into(),
            email_verified: true,
        })
        .await
        .unwrap();
    directory
        .set_claims(principal.id, ClaimSet::admin())
        .await
        .unwrap();
    Caller::new(principal.id, ClaimSet::admin())
}

/// Provision two therapists and a patient attached to the first, plus
/// one scheduled and one completed appointment with the first.
async fn transfer_fixture(
    service: &Service,
    directory: &SurrealDirectory<Db>,
    db: &Surreal<Db>,
) -> (Caller, Uuid, Uuid, Uuid) {
    let admin = admin_caller(directory).await;

    let make_therapist = |email: &str| CreateTherapistUser {
        email: email.into(),
        password: "therapist-password".into(),
        display_name: "Dr.".into(),
        cedula: "12345678".into(),
        specialization: vec![],
        license_number: None,
    };
    let old_therapist = service
        .create_therapist_user(&admin, make_therapist("a@x.com"))
        .await
        .unwrap();
    let new_therapist = service
        .create_therapist_user(&admin, make_therapist("b@x.com"))
        .await
        .unwrap();

    let caller = Caller::new(
        old_therapist,
        ClaimSet::therapist(tenant_id_for(old_therapist), true),
    );
    let issued = service
        .create_patient_invitation(&caller, "p@x.com".into(), None)
        .await
        .unwrap();
    let patient = service
        .create_patient_from_invitation(&issued.token, "P".into(), "patient-password".into())
        .await
        .unwrap();

    let appointments = SurrealAppointmentRepository::new(db.clone());
    appointments
        .create(CreateAppointment {
            tenant_id: tenant_id_for(old_therapist),
            therapist_id: old_therapist,
            patient_id: patient,
            scheduled_at: Utc::now() + Duration::days(3),
        })
        .await
        .unwrap();
    let completed = appointments
        .create(CreateAppointment {
            tenant_id: tenant_id_for(old_therapist),
            therapist_id: old_therapist,
            patient_id: patient,
            scheduled_at: Utc::now() - Duration::days(3),
        })
        .await
        .unwrap();
    db.query("UPDATE type::record('appointment', $id) SET status = 'Completed'")
        .bind(("id", completed.id.to_string()))
        .await
        .unwrap()
        .check()
        .unwrap();

    (admin, old_therapist, new_therapist, patient)
}

#[tokio::test]
async fn transfer_moves_relationship_claims_and_appointments() {
    let (service, directory, db) = setup().await;
    let (_admin, old_therapist, new_therapist, patient) =
        transfer_fixture(&service, &directory, &db).await;

    let caller = Caller::new(
        old_therapist,
        ClaimSet::therapist(tenant_id_for(old_therapist), true),
    );
    service
        .transfer_patient(&caller, patient, old_therapist, new_therapist)
        .await
        .unwrap();

    let relationships = SurrealRelationshipRepository::new(db.clone());

    // Old relationship closed with an end timestamp and audit trail.
    let old_rel = relationships
        .get(&Relationship::composite_id(old_therapist, patient))
        .await
        .unwrap();
    assert_eq!(old_rel.status, RelationshipStatus::Inactive);
    assert!(old_rel.relationship_end.is_some());
    assert!(old_rel.audit_log.iter().any(|e| e.action == "TRANSFER_OUT"));

    // Exactly one Active relationship remains, under the new tenant.
    let new_rel = relationships
        .get(&Relationship::composite_id(new_therapist, patient))
        .await
        .unwrap();
    assert_eq!(new_rel.status, RelationshipStatus::Active);
    assert_eq!(new_rel.tenant_id, tenant_id_for(new_therapist));
    let all = relationships.list_for_patient(patient).await.unwrap();
    let active: Vec<_> = all
        .iter()
        .filter(|r| r.status == RelationshipStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].therapist_id, new_therapist);

    // Claims contain the new therapist but not the old.
    let claims = directory
        .lookup_by_id(patient)
        .await
        .unwrap()
        .claims
        .expect("claims must be set");
    assert_eq!(claims.therapist_ids, Some(vec![new_therapist]));

    // The scheduled appointment moved; the completed one stayed.
    let appointments = SurrealAppointmentRepository::new(db);
    let with_new = appointments
        .list_for_pair(patient, new_therapist)
        .await
        .unwrap();
    assert_eq!(with_new.len(), 1);
    assert_eq!(with_new[0].status, AppointmentStatus::Scheduled);
    assert_eq!(with_new[0].tenant_id, tenant_id_for(new_therapist));
    let with_old = appointments
        .list_for_pair(patient, old_therapist)
        .await
        .unwrap();
    assert_eq!(with_old.len(), 1);
    assert_eq!(with_old[0].status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn admin_may_transfer_on_behalf_of_therapists() {
    let (service, directory, db) = setup().await;
    let (admin, old_therapist, new_therapist, patient) =
        transfer_fixture(&service, &directory, &db).await;

    service
        .transfer_patient(&admin, patient, old_therapist, new_therapist)
        .await
        .unwrap();

    let claims = directory.lookup_by_id(patient).await.unwrap().claims.unwrap();
    assert_eq!(claims.therapist_ids, Some(vec![new_therapist]));
}

#[tokio::test]
async fn unrelated_caller_cannot_transfer() {
    let (service, directory, db) = setup().await;
    let (_admin, old_therapist, new_therapist, patient) =
        transfer_fixture(&service, &directory, &db).await;

    // The receiving therapist is not the therapist of record.
    let caller = Caller::new(
        new_therapist,
        ClaimSet::therapist(tenant_id_for(new_therapist), true),
    );
    let err = service
        .transfer_patient(&caller, patient, old_therapist, new_therapist)
        .await
        .unwrap_err();
    assert!(matches!(err, PraxisError::PermissionDenied { .. }));
}

#[tokio::test]
async fn transfer_to_same_therapist_is_rejected() {
    let (service, directory, db) = setup().await;
    let (admin, old_therapist, _new_therapist, patient) =
        transfer_fixture(&service, &directory, &db).await;

    let err = service
        .transfer_patient(&admin, patient, old_therapist, old_therapist)
        .await
        .unwrap_err();
    assert!(matches!(err, PraxisError::InvalidArgument { .. }));
}

#[tokio::test]
async fn transfer_without_relationship_fails_before_writing() {
    let (service, directory, db) = setup().await;
    let (admin, old_therapist, new_therapist, _patient) =
        transfer_fixture(&service, &directory, &db).await;

    let stranger_patient = Uuid::new_v4();
    let err = service
        .transfer_patient(&admin, stranger_patient, old_therapist, new_therapist)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // No relationship document was created for the unknown patient.
    let relationships = SurrealRelationshipRepository::new(db);
    let rels = relationships
        .list_for_patient(stranger_patient)
        .await
        .unwrap();
    assert!(rels.is_empty());
}

#[tokio::test]
async fn rerunning_a_transfer_is_safe() {
    let (service, directory, db) = setup().await;
    let (admin, old_therapist, new_therapist, patient) =
        transfer_fixture(&service, &directory, &db).await;

    service
        .transfer_patient(&admin, patient, old_therapist, new_therapist)
        .await
        .unwrap();
    // Re-driving the same transfer (the recovery path after a crash
    // mid-sequence) converges on the same end state.
    service
        .transfer_patient(&admin, patient, old_therapist, new_therapist)
        .await
        .unwrap();

    let relationships = SurrealRelationshipRepository::new(db);
    let all = relationships.list_for_patient(patient).await.unwrap();
    let active: Vec<_> = all
        .iter()
        .filter(|r| r.status == RelationshipStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].therapist_id, new_therapist);

    let claims = directory.lookup_by_id(patient).await.unwrap().claims.unwrap();
    assert_eq!(claims.therapist_ids, Some(vec![new_therapist]));
}
