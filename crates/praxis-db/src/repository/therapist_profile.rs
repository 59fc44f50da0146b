//! SurrealDB implementation of [`TherapistProfileRepository`].
//!
//! `tenant_id` is written once at creation, derived from the uid, and
//! never updated afterwards.

use chrono::{DateTime, Utc};
use praxis_core::error::PraxisResult;
use praxis_core::models::claims::tenant_id_for;
use praxis_core::models::therapist::{
    CreateTherapistProfile, TherapistProfile, UpdateTherapistProfile,
};
use praxis_core::repository::TherapistProfileRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TherapistProfileRow {
    cedula: String,
    specialization: Vec<String>,
    license_number: Option<String>,
    tenant_id: String,
    is_verified: bool,
    bank_info: Option<serde_json::Value>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

impl TherapistProfileRow {
    fn into_profile(self, uid: Uuid) -> TherapistProfile {
        TherapistProfile {
            uid,
            cedula: self.cedula,
            specialization: self.specialization,
            license_number: self.license_number,
            tenant_id: self.tenant_id,
            is_verified: self.is_verified,
            bank_info: self.bank_info,
        }
    }
}

/// SurrealDB implementation of the therapist profile repository.
#[derive(Clone)]
pub struct SurrealTherapistProfileRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTherapistProfileRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TherapistProfileRepository for SurrealTherapistProfileRepository<C> {
    async fn create(&self, input: CreateTherapistProfile) -> PraxisResult<TherapistProfile> {
        let uid_str = input.uid.to_string();
        let tenant_id = tenant_id_for(input.uid);

        let result = self
            .db
            .query(
                "CREATE type::record('therapist_profile', $uid) SET \
                 cedula = $cedula, \
                 specialization = $specialization, \
                 license_number = $license_number, \
                 tenant_id = $tenant_id, \
                 is_verified = $is_verified, \
                 bank_info = NONE",
            )
            .bind(("uid", uid_str.clone()))
            .bind(("cedula", input.cedula))
            .bind(("specialization", input.specialization))
            .bind(("license_number", input.license_number))
            .bind(("tenant_id", tenant_id))
            .bind(("is_verified", input.is_verified))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                DbError::AlreadyExists {
                    entity: format!("therapist_profile {uid_str}"),
                }
            } else {
                DbError::Migration(message)
            }
        })?;

        let rows: Vec<TherapistProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "therapist_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(input.uid))
    }

    async fn get_by_uid(&self, uid: Uuid) -> PraxisResult<TherapistProfile> {
        let uid_str = uid.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('therapist_profile', $uid)")
            .bind(("uid", uid_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TherapistProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "therapist_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(uid))
    }

    async fn update(&self, uid: Uuid, input: UpdateTherapistProfile) -> PraxisResult<TherapistProfile> {
        let uid_str = uid.to_string();

        let mut sets = Vec::new();
        if input.specialization.is_some() {
            sets.push("specialization = $specialization");
        }
        if input.license_number.is_some() {
            sets.push("license_number = $license_number");
        }
        if input.bank_info.is_some() {
            sets.push("bank_info = $bank_info");
        }
        if sets.is_empty() {
            return self.get_by_uid(uid).await;
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('therapist_profile', $uid) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("uid", uid_str.clone()));
        if let Some(specialization) = input.specialization {
            builder = builder.bind(("specialization", specialization));
        }
        if let Some(license_number) = input.license_number {
            // Option<Option<String>>: Some(Some(v)) = set, Some(None) = clear
            builder = builder.bind(("license_number", license_number));
        }
        if let Some(bank_info) = input.bank_info {
            builder = builder.bind(("bank_info", bank_info));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<TherapistProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "therapist_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(uid))
    }

    async fn set_verified(&self, uid: Uuid, is_verified: bool) -> PraxisResult<()> {
        let uid_str = uid.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('therapist_profile', $uid) SET \
                 is_verified = $is_verified, updated_at = time::now()",
            )
            .bind(("uid", uid_str.clone()))
            .bind(("is_verified", is_verified))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TherapistProfileRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "therapist_profile".into(),
                id: uid_str,
            }
            .into());
        }

        Ok(())
    }
}
