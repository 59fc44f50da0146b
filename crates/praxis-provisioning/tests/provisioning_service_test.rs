//! Integration tests for the account provisioning flows, using the
//! full service wired to in-memory SurrealDB.

use chrono::{Duration, Utc};
use praxis_core::directory::{CreatePrincipal, IdentityDirectory};
use praxis_core::error::PraxisError;
use praxis_core::models::claims::{ClaimSet, Role, tenant_id_for};
use praxis_core::models::invitation::{
    Invitation, InvitationStatus, InvitedRole, TherapistPrefill,
};
use praxis_core::models::relationship::{Relationship, RelationshipStatus};
use praxis_core::models::user::CreateUserProfile;
use praxis_core::repository::{
    AuditLogFilter, AuditLogRepository, InvitationRepository, Pagination,
    RelationshipRepository, TherapistProfileRepository, UserProfileRepository,
};
use praxis_db::repository::{
    SurrealAppointmentRepository, SurrealAuditLogRepository, SurrealInvitationRepository,
    SurrealPatientProfileRepository, SurrealRelationshipRepository,
    SurrealTherapistProfileRepository, SurrealUserProfileRepository,
};
use praxis_db::{DirectoryConfig, SurrealDirectory};
use praxis_provisioning::{
    AdminUpdateUser, Caller, CreateTherapistUser, IssueAdminInvitation, ProvisioningConfig,
    ProvisioningService, RedeemTherapistInvitation,
};
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

fn therapist_input(email: &str) -> CreateTherapistUser {
    CreateTherapistUser {
        email: email.into(),
        password: "therapist-password".into(),
        display_name: "Dr. Treats".into(),
        cedula: "12345678".into(),
        specialization: vec!["CBT".into()],
        license_number: Some("LIC-42".into()),
    }
}

#[tokio::test]
async fn admin_creates_pre_verified_therapist() {
    let (service, directory, db) = setup().await;
    let admin = admin_caller(&directory).await;

    let uid = service
        .create_therapist_user(&admin, therapist_input("dr@x.com"))
        .await
        .unwrap();

    // Claims were written explicitly, not left to the propagator.
    let principal = directory.lookup_by_id(uid).await.unwrap();
    let claims = principal.claims.expect("claims must be set");
    assert_eq!(claims.role, Role::Therapist);
    assert_eq!(claims.is_verified, Some(true));
    assert_eq!(claims.tenant_id, Some(tenant_id_for(uid)));

    // Both profile documents exist; the therapist is pre-verified.
    let users = SurrealUserProfileRepository::new(db.clone());
    let profile = users.get_by_uid(uid).await.unwrap();
    assert_eq!(profile.role, Role::Therapist);
    let therapists = SurrealTherapistProfileRepository::new(db.clone());
    let therapist = therapists.get_by_uid(uid).await.unwrap();
    assert!(therapist.is_verified);
    assert_eq!(therapist.tenant_id, tenant_id_for(uid));

    // An audit entry recorded the creation.
    let audit = SurrealAuditLogRepository::new(db);
    let entries = audit
        .list(
            AuditLogFilter {
                action: Some("therapist.create".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(entries.total, 1);
    assert_eq!(entries.items[0].subject_id, Some(uid));
}

#[tokio::test]
async fn non_admin_cannot_create_therapists() {
    let (service, _directory, _db) = setup().await;
    let uid = Uuid::new_v4();
    let therapist = Caller::new(uid, ClaimSet::therapist(tenant_id_for(uid), true));

    let err = service
        .create_therapist_user(&therapist, therapist_input("dr@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, PraxisError::PermissionDenied { .. }));
}

#[tokio::test]
async fn duplicate_email_fails_account_creation() {
    let (service, directory, _db) = setup().await;
    let admin = admin_caller(&directory).await;

    service
        .create_therapist_user(&admin, therapist_input("dr@x.com"))
        .await
        .unwrap();
    let err = service
        .create_therapist_user(&admin, therapist_input("dr@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, PraxisError::AlreadyExists { .. }));
}

#[tokio::test]
async fn therapist_redemption_sets_verified_claims() {
    let (service, directory, _db) = setup().await;
    let admin = admin_caller(&directory).await;

    let issued = service
        .create_user_invitation(
            &admin,
            IssueAdminInvitation {
                role: InvitedRole::Therapist,
                target_email: "new-dr@x.com".into(),
                target_name: Some("Dr. New".into()),
                tenant_id: None,
                therapist_data: Some(TherapistPrefill {
                    cedula: Some("87654321".into()),
                    specialization: vec!["EMDR".into()],
                    license_number: None,
                }),
            },
        )
        .await
        .unwrap();

    let uid = service
        .create_therapist_from_invitation(
            &issued.token,
            RedeemTherapistInvitation {
                display_name: "Dr. New".into(),
                password: "new-password".into(),
                // Empty form fields fall back to the invitation's
                // pre-fill.
                cedula: String::new(),
                specialization: vec![],
                license_number: None,
            },
        )
        .await
        .unwrap();

    let principal = directory.lookup_by_id(uid).await.unwrap();
    assert_eq!(principal.email, "new-dr@x.com");
    let claims = principal.claims.expect("claims must be set");
    assert_eq!(claims.role, Role::Therapist);
    assert_eq!(claims.is_verified, Some(true));
    assert_eq!(claims.tenant_id, Some(tenant_id_for(uid)));

    let view_err = service.validate_invitation(&issued.token).await.unwrap_err();
    assert!(matches!(view_err, PraxisError::FailedPrecondition { .. }));
}

#[tokio::test]
async fn redeem_is_single_use() {
    let (service, directory, _db) = setup().await;
    let admin = admin_caller(&directory).await;

    let issued = service
        .create_user_invitation(
            &admin,
            IssueAdminInvitation {
                role: InvitedRole::Therapist,
                target_email: "dr@x.com".into(),
                target_name: None,
                tenant_id: None,
                therapist_data: None,
            },
        )
        .await
        .unwrap();

    let redeem = RedeemTherapistInvitation {
        display_name: "Dr. Once".into(),
        password: "once-password".into(),
        cedula: "12345678".into(),
        specialization: vec![],
        license_number: None,
    };

    service
        .create_therapist_from_invitation(&issued.token, redeem.clone())
        .await
        .unwrap();

    // Second redemption fails on status, whatever fields arrive.
    let err = service
        .create_therapist_from_invitation(&issued.token, redeem)
        .await
        .unwrap_err();
    match err {
        PraxisError::FailedPrecondition { message } => {
            assert!(message.contains("Used"), "unexpected message: {message}");
        }
        other => panic!("expected FailedPrecondition, got {other:?}"),
    }
}

#[tokio::test]
async fn patient_redemption_via_therapist_invitation() {
    let (service, directory, db) = setup().await;
    let admin = admin_caller(&directory).await;

    let therapist_id = service
        .create_therapist_user(&admin, therapist_input("dr@x.com"))
        .await
        .unwrap();
    let therapist = Caller::new(
        therapist_id,
        ClaimSet::therapist(tenant_id_for(therapist_id), true),
    );

    let issued = service
        .create_patient_invitation(&therapist, "p@x.com".into(), Some("P".into()))
        .await
        .unwrap();

    let patient_id = service
        .create_patient_from_invitation(&issued.token, "P".into(), "patient-password".into())
        .await
        .unwrap();

    // Relationship is Active under the therapist's tenant.
    let relationships = SurrealRelationshipRepository::new(db);
    let rel = relationships
        .get(&Relationship::composite_id(therapist_id, patient_id))
        .await
        .unwrap();
    assert_eq!(rel.status, RelationshipStatus::Active);
    assert_eq!(rel.tenant_id, tenant_id_for(therapist_id));

    // Claims carry exactly the one therapist.
    let principal = directory.lookup_by_id(patient_id).await.unwrap();
    let claims = principal.claims.expect("claims must be set");
    assert_eq!(claims.role, Role::Patient);
    assert_eq!(claims.therapist_ids, Some(vec![therapist_id]));
}

/// The worked end-to-end example: admin-issued patient invitation into
/// tenant `tenant_<T1>` redeemed by "P".
#[tokio::test]
async fn patient_redemption_via_admin_invitation() {
    let (service, directory, db) = setup().await;
    let admin = admin_caller(&directory).await;

    let t1 = service
        .create_therapist_user(&admin, therapist_input("t1@x.com"))
        .await
        .unwrap();

    let issued = service
        .create_user_invitation(
            &admin,
            IssueAdminInvitation {
                role: InvitedRole::Patient,
                target_email: "p@x.com".into(),
                target_name: Some("P".into()),
                tenant_id: Some(tenant_id_for(t1)),
                therapist_data: None,
            },
        )
        .await
        .unwrap();

    let view = service.validate_invitation(&issued.token).await.unwrap();
    assert_eq!(view.role, InvitedRole::Patient);
    assert_eq!(view.target_email, "p@x.com");
    assert_eq!(view.therapist_id, Some(t1));

    let u = service
        .create_patient_from_invitation(&issued.token, "P".into(), "abcdef".into())
        .await
        .unwrap();

    let relationships = SurrealRelationshipRepository::new(db.clone());
    let rel = relationships
        .get(&Relationship::composite_id(t1, u))
        .await
        .unwrap();
    assert_eq!(rel.status, RelationshipStatus::Active);

    let principal = directory.lookup_by_id(u).await.unwrap();
    let claims = principal.claims.expect("claims must be set");
    assert_eq!(claims.role, Role::Patient);
    assert_eq!(claims.therapist_ids, Some(vec![t1]));

    // Invitation is terminally Used with the resulting uid recorded.
    let invitations = SurrealInvitationRepository::new(db);
    let stored = invitations.find_by_token(&issued.token).await.unwrap();
    assert_eq!(stored.status(), InvitationStatus::Used);
    let Invitation::Admin(stored) = stored else {
        panic!("expected admin variant");
    };
    assert_eq!(stored.redeemed_uid, Some(u));
}

#[tokio::test]
async fn therapist_invitation_cannot_mint_a_therapist() {
    let (service, directory, _db) = setup().await;
    let admin = admin_caller(&directory).await;

    let issued = service
        .create_user_invitation(
            &admin,
            IssueAdminInvitation {
                role: InvitedRole::Patient,
                target_email: "p@x.com".into(),
                target_name: None,
                tenant_id: Some(tenant_id_for(Uuid::new_v4())),
                therapist_data: None,
            },
        )
        .await
        .unwrap();

    let err = service
        .create_therapist_from_invitation(
            &issued.token,
            RedeemTherapistInvitation {
                display_name: "Imposter".into(),
                password: "imposter-password".into(),
                cedula: "00000000".into(),
                specialization: vec![],
                license_number: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PraxisError::FailedPrecondition { .. }));
}

#[tokio::test]
async fn set_custom_claims_syncs_profile_both_directions() {
    let (service, directory, db) = setup().await;
    let admin = admin_caller(&directory).await;

    let uid = service
        .create_therapist_user(&admin, therapist_input("dr@x.com"))
        .await
        .unwrap();
    let therapists = SurrealTherapistProfileRepository::new(db);

    // Un-verify: profile follows the claim write.
    service
        .set_custom_claims(&admin, uid, ClaimSet::therapist(tenant_id_for(uid), false))
        .await
        .unwrap();
    assert!(!therapists.get_by_uid(uid).await.unwrap().is_verified);
    let claims = directory.lookup_by_id(uid).await.unwrap().claims.unwrap();
    assert_eq!(claims.is_verified, Some(false));

    // Re-verify: same sync in the other direction.
    service
        .set_custom_claims(&admin, uid, ClaimSet::therapist(tenant_id_for(uid), true))
        .await
        .unwrap();
    assert!(therapists.get_by_uid(uid).await.unwrap().is_verified);
}

#[tokio::test]
async fn set_custom_claims_is_admin_only() {
    let (service, _directory, _db) = setup().await;
    let uid = Uuid::new_v4();
    let caller = Caller::new(uid, ClaimSet::therapist(tenant_id_for(uid), true));

    let err = service
        .set_custom_claims(&caller, uid, ClaimSet::admin())
        .await
        .unwrap_err();
    assert!(matches!(err, PraxisError::PermissionDenied { .. }));
}

#[tokio::test]
async fn propagator_noops_without_profile_and_derives_with_one() {
    let (service, directory, db) = setup().await;

    // Principal exists, profile not yet written: the trigger is a
    // no-op, not an error.
    let principal = directory
        .create_principal(CreatePrincipal {
            email: "early@x.com".into(),
            password: "early-password".into(),
            display_name: "Early".into(),
            email_verified: false,
        })
        .await
        .unwrap();
    service.on_principal_created(principal.id).await.unwrap();
    assert!(directory.lookup_by_id(principal.id).await.unwrap().claims.is_none());

    // Once the profile lands, the trigger derives claims from it.
    let users = SurrealUserProfileRepository::new(db);
    users
        .create(CreateUserProfile {
            uid: principal.id,
            email: "early@x.com".into(),
            display_name: "Early".into(),
            role: Role::Patient,
        })
        .await
        .unwrap();
    service.on_principal_created(principal.id).await.unwrap();

    let claims = directory
        .lookup_by_id(principal.id)
        .await
        .unwrap()
        .claims
        .expect("claims derived from profile");
    assert_eq!(claims.role, Role::Patient);
    assert_eq!(claims.therapist_ids, Some(vec![]));
}

#[tokio::test]
async fn propagator_preserves_explicitly_set_verification() {
    let (service, directory, _db) = setup().await;
    let admin = admin_caller(&directory).await;

    let uid = service
        .create_therapist_user(&admin, therapist_input("dr@x.com"))
        .await
        .unwrap();

    // The trigger fires after provisioning already wrote verified
    // claims; the merge must not downgrade them.
    service.on_principal_created(uid).await.unwrap();
    let claims = directory.lookup_by_id(uid).await.unwrap().claims.unwrap();
    assert_eq!(claims.is_verified, Some(true));
}

#[tokio::test]
async fn admin_update_user_touches_profile_directory_and_specialization() {
    let (service, directory, db) = setup().await;
    let admin = admin_caller(&directory).await;

    let uid = service
        .create_therapist_user(&admin, therapist_input("dr@x.com"))
        .await
        .unwrap();

    service
        .admin_update_user(
            &admin,
            uid,
            AdminUpdateUser {
                display_name: Some("Dr. Renamed".into()),
                email: Some("renamed@x.com".into()),
                specialization: Some(vec!["Family therapy".into()]),
            },
        )
        .await
        .unwrap();

    let users = SurrealUserProfileRepository::new(db.clone());
    let profile = users.get_by_uid(uid).await.unwrap();
    assert_eq!(profile.display_name, "Dr. Renamed");
    assert_eq!(profile.email, "renamed@x.com");

    let principal = directory.lookup_by_id(uid).await.unwrap();
    assert_eq!(principal.email, "renamed@x.com");

    let therapists = SurrealTherapistProfileRepository::new(db);
    let therapist = therapists.get_by_uid(uid).await.unwrap();
    assert_eq!(therapist.specialization, vec!["Family therapy".to_string()]);
}

#[tokio::test]
async fn sweep_removes_only_orphans_beyond_grace() {
    let (service, directory, db) = setup().await;
    let admin = admin_caller(&directory).await;

    // A complete account and a fresh orphan both survive the sweep;
    // only principals past the grace period without a profile go.
    let kept = service
        .create_therapist_user(&admin, therapist_input("kept@x.com"))
        .await
        .unwrap();
    let fresh_orphan = directory
        .create_principal(CreatePrincipal {
            email: "fresh@x.com".into(),
            password: "fresh-password".into(),
            display_name: "Fresh".into(),
            email_verified: false,
        })
        .await
        .unwrap();

    let stale_orphan = directory
        .create_principal(CreatePrincipal {
            email: "stale@x.com".into(),
            password: "stale-password".into(),
            display_name: "Stale".into(),
            email_verified: false,
        })
        .await
        .unwrap();
    // Age the stale orphan past the grace period.
    db.query("UPDATE type::record('principal', $id) SET created_at = $created_at")
        .bind(("id", stale_orphan.id.to_string()))
        .bind(("created_at", Utc::now() - Duration::days(2)))
        .await
        .unwrap()
        .check()
        .unwrap();
    // The admin principal predates nothing; age the kept account too
    // to show profile-holders are immune regardless of age.
    db.query("UPDATE type::record('principal', $id) SET created_at = $created_at")
        .bind(("id", kept.to_string()))
        .bind(("created_at", Utc::now() - Duration::days(2)))
        .await
        .unwrap()
        .check()
        .unwrap();

    let removed = service.sweep_orphaned_principals(&admin).await.unwrap();
    assert_eq!(removed, 1);

    assert!(directory.lookup_by_id(kept).await.is_ok());
    assert!(directory.lookup_by_id(fresh_orphan.id).await.is_ok());
    let err = directory.lookup_by_id(stale_orphan.id).await.unwrap_err();
    assert!(err.is_not_found());
}
