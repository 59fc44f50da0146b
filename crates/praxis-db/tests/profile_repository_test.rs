//! Integration tests for the profile repositories using in-memory
//! SurrealDB.

use chrono::NaiveDate;
use praxis_core::error::PraxisError;
use praxis_core::models::claims::Role;
use praxis_core::models::patient::{PatientProfile, UpdatePatientProfile};
use praxis_core::models::therapist::{CreateTherapistProfile, UpdateTherapistProfile};
use praxis_core::models::user::{CreateUserProfile, UpdateUserProfile};
use praxis_core::repository::{
    PatientProfileRepository, TherapistProfileRepository, UserProfileRepository,
};
use praxis_db::repository::{
    SurrealPatientProfileRepository, SurrealTherapistProfileRepository,
    SurrealUserProfileRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    praxis_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn create_and_get_user_profile() {
    let db = setup().await;
    let repo = SurrealUserProfileRepository::new(db);
    let uid = Uuid::new_v4();

    let profile = repo
        .create(CreateUserProfile {
            uid,
            email: "alice@example.com".into(),
            display_name: "Alice".into(),
            role: Role::Therapist,
        })
        .await
        .unwrap();
    assert_eq!(profile.role, Role::Therapist);
    assert!(!profile.is_deleted);

    let fetched = repo.get_by_uid(uid).await.unwrap();
    assert_eq!(fetched.email, "alice@example.com");
}

#[tokio::test]
async fn duplicate_user_profile_fails_create() {
    let db = setup().await;
    let repo = SurrealUserProfileRepository::new(db);
    let uid = Uuid::new_v4();

    let input = CreateUserProfile {
        uid,
        email: "alice@example.com".into(),
        display_name: "Alice".into(),
        role: Role::Patient,
    };
    repo.create(input.clone()).await.unwrap();
    let err = repo.create(input).await.unwrap_err();
    assert!(matches!(err, PraxisError::AlreadyExists { .. }));
}

#[tokio::test]
async fn update_and_soft_delete_user_profile() {
    let db = setup().await;
    let repo = SurrealUserProfileRepository::new(db);
    let uid = Uuid::new_v4();

    repo.create(CreateUserProfile {
        uid,
        email: "old@example.com".into(),
        display_name: "Old".into(),
        role: Role::Patient,
    })
    .await
    .unwrap();

    let updated = repo
        .update(
            uid,
            UpdateUserProfile {
                email: Some("new@example.com".into()),
                display_name: Some("New".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.email, "new@example.com");

    repo.soft_delete(uid).await.unwrap();
    let fetched = repo.get_by_uid(uid).await.unwrap();
    assert!(fetched.is_deleted);
}

#[tokio::test]
async fn therapist_profile_derives_tenant_from_uid() {
    let db = setup().await;
    let repo = SurrealTherapistProfileRepository::new(db);
    let uid = Uuid::new_v4();

    let profile = repo
        .create(CreateTherapistProfile {
            uid,
            cedula: "12345678".into(),
            specialization: vec!["CBT".into(), "EMDR".into()],
            license_number: Some("LIC-42".into()),
            is_verified: true,
        })
        .await
        .unwrap();
    assert_eq!(profile.tenant_id, format!("tenant_{uid}"));
    assert!(profile.is_verified);
    assert_eq!(profile.specialization.len(), 2);
}

#[tokio::test]
async fn therapist_verified_flag_can_be_toggled() {
    let db = setup().await;
    let repo = SurrealTherapistProfileRepository::new(db);
    let uid = Uuid::new_v4();

    repo.create(CreateTherapistProfile {
        uid,
        cedula: "12345678".into(),
        specialization: vec![],
        license_number: None,
        is_verified: true,
    })
    .await
    .unwrap();

    repo.set_verified(uid, false).await.unwrap();
    let fetched = repo.get_by_uid(uid).await.unwrap();
    assert!(!fetched.is_verified);
}

#[tokio::test]
async fn therapist_update_changes_specialization() {
    let db = setup().await;
    let repo = SurrealTherapistProfileRepository::new(db);
    let uid = Uuid::new_v4();

    repo.create(CreateTherapistProfile {
        uid,
        cedula: "12345678".into(),
        specialization: vec!["CBT".into()],
        license_number: None,
        is_verified: true,
    })
    .await
    .unwrap();

    let updated = repo
        .update(
            uid,
            UpdateTherapistProfile {
                specialization: Some(vec!["Family therapy".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.specialization, vec!["Family therapy".to_string()]);
}

#[tokio::test]
async fn patient_profile_starts_empty_and_fills_in() {
    let db = setup().await;
    let repo = SurrealPatientProfileRepository::new(db);
    let uid = Uuid::new_v4();

    let profile = repo.create(PatientProfile::empty(uid)).await.unwrap();
    assert!(profile.date_of_birth.is_none());
    assert!(profile.phone.is_none());

    let dob = NaiveDate::from_ymd_opt(1990, 4, 2).unwrap();
    let updated = repo
        .update(
            uid,
            UpdatePatientProfile {
                date_of_birth: Some(Some(dob)),
                phone: Some(Some("+52 55 0000 0000".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.date_of_birth, Some(dob));
    assert_eq!(updated.phone.as_deref(), Some("+52 55 0000 0000"));
}
