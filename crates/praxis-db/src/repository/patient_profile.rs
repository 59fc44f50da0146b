//! SurrealDB implementation of [`PatientProfileRepository`].

use chrono::{DateTime, NaiveDate, Utc};
use praxis_core::error::PraxisResult;
use praxis_core::models::patient::{PatientProfile, UpdatePatientProfile};
use praxis_core::repository::PatientProfileRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PatientProfileRow {
    date_of_birth: Option<String>,
    phone: Option<String>,
    emergency_contact: Option<String>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

impl PatientProfileRow {
    fn into_profile(self, uid: Uuid) -> Result<PatientProfile, DbError> {
        let date_of_birth = self
            .date_of_birth
            .map(|s| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| DbError::Migration(format!("invalid date of birth: {e}")))
            })
            .transpose()?;
        Ok(PatientProfile {
            uid,
            date_of_birth,
            phone: self.phone,
            emergency_contact: self.emergency_contact,
        })
    }
}

/// SurrealDB implementation of the patient profile repository.
#[derive(Clone)]
pub struct SurrealPatientProfileRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPatientProfileRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PatientProfileRepository for SurrealPatientProfileRepository<C> {
    async fn create(&self, input: PatientProfile) -> PraxisResult<PatientProfile> {
        let uid_str = input.uid.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('patient_profile', $uid) SET \
                 date_of_birth = $date_of_birth, \
                 phone = $phone, \
                 emergency_contact = $emergency_contact",
            )
            .bind(("uid", uid_str.clone()))
            .bind((
                "date_of_birth",
                input.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            ))
            .bind(("phone", input.phone))
            .bind(("emergency_contact", input.emergency_contact))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                DbError::AlreadyExists {
                    entity: format!("patient_profile {uid_str}"),
                }
            } else {
                DbError::Migration(message)
            }
        })?;

        let rows: Vec<PatientProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "patient_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(input.uid)?)
    }

    async fn get_by_uid(&self, uid: Uuid) -> PraxisResult<PatientProfile> {
        let uid_str = uid.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('patient_profile', $uid)")
            .bind(("uid", uid_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PatientProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "patient_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(uid)?)
    }

    async fn update(&self, uid: Uuid, input: UpdatePatientProfile) -> PraxisResult<PatientProfile> {
        let uid_str = uid.to_string();

        let mut sets = Vec::new();
        if input.date_of_birth.is_some() {
            sets.push("date_of_birth = $date_of_birth");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.emergency_contact.is_some() {
            sets.push("emergency_contact = $emergency_contact");
        }
        if sets.is_empty() {
            return self.get_by_uid(uid).await;
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('patient_profile', $uid) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("uid", uid_str.clone()));
        if let Some(date_of_birth) = input.date_of_birth {
            builder = builder.bind((
                "date_of_birth",
                date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            ));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(emergency_contact) = input.emergency_contact {
            builder = builder.bind(("emergency_contact", emergency_contact));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<PatientProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "patient_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(uid)?)
    }
}
