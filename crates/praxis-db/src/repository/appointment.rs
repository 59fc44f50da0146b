//! SurrealDB implementation of [`AppointmentRepository`].

use chrono::{DateTime, Utc};
use praxis_core::error::PraxisResult;
use praxis_core::models::appointment::{Appointment, AppointmentStatus, CreateAppointment};
use praxis_core::repository::AppointmentRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

fn parse_status(s: &str) -> Result<AppointmentStatus, DbError> {
    match s {
        "Scheduled" => Ok(AppointmentStatus::Scheduled),
        "Completed" => Ok(AppointmentStatus::Completed),
        "Cancelled" => Ok(AppointmentStatus::Cancelled),
        other => Err(DbError::Migration(format!(
            "unknown appointment status: {other}"
        ))),
    }
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Migration(format!("invalid {field} UUID: {e}")))
}

#[derive(Debug, SurrealValue)]
struct AppointmentRow {
    tenant_id: String,
    therapist_id: String,
    patient_id: String,
    status: String,
    scheduled_at: DateTime<Utc>,
}

impl AppointmentRow {
    fn into_appointment(self, id: Uuid) -> Result<Appointment, DbError> {
        Ok(Appointment {
            id,
            tenant_id: self.tenant_id,
            therapist_id: parse_uuid("therapist_id", &self.therapist_id)?,
            patient_id: parse_uuid("patient_id", &self.patient_id)?,
            status: parse_status(&self.status)?,
            scheduled_at: self.scheduled_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct AppointmentRowWithId {
    record_id: String,
    tenant_id: String,
    therapist_id: String,
    patient_id: String,
    status: String,
    scheduled_at: DateTime<Utc>,
}

impl AppointmentRowWithId {
    fn try_into_appointment(self) -> Result<Appointment, DbError> {
        let id = parse_uuid("appointment", &self.record_id)?;
        AppointmentRow {
            tenant_id: self.tenant_id,
            therapist_id: self.therapist_id,
            patient_id: self.patient_id,
            status: self.status,
            scheduled_at: self.scheduled_at,
        }
        .into_appointment(id)
    }
}

/// SurrealDB implementation of the appointment repository.
#[derive(Clone)]
pub struct SurrealAppointmentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAppointmentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AppointmentRepository for SurrealAppointmentRepository<C> {
    async fn create(&self, input: CreateAppointment) -> PraxisResult<Appointment> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('appointment', $id) SET \
                 tenant_id = $tenant_id, \
                 therapist_id = $therapist_id, \
                 patient_id = $patient_id, \
                 status = $status, \
                 scheduled_at = $scheduled_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id))
            .bind(("therapist_id", input.therapist_id.to_string()))
            .bind(("patient_id", input.patient_id.to_string()))
            .bind(("status", "Scheduled".to_string()))
            .bind(("scheduled_at", input.scheduled_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<AppointmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "appointment".into(),
            id: id_str,
        })?;

        Ok(row.into_appointment(id)?)
    }

    async fn list_for_pair(
        &self,
        patient_id: Uuid,
        therapist_id: Uuid,
    ) -> PraxisResult<Vec<Appointment>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM appointment \
                 WHERE patient_id = $patient_id AND therapist_id = $therapist_id \
                 ORDER BY scheduled_at ASC",
            )
            .bind(("patient_id", patient_id.to_string()))
            .bind(("therapist_id", therapist_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AppointmentRowWithId> = result.take(0).map_err(DbError::from)?;
        let appointments = rows
            .into_iter()
            .map(|row| row.try_into_appointment())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(appointments)
    }

    async fn reassign_scheduled(
        &self,
        patient_id: Uuid,
        old_therapist_id: Uuid,
        new_therapist_id: Uuid,
        new_tenant_id: &str,
    ) -> PraxisResult<u64> {
        let mut result = self
            .db
            .query(
                "UPDATE appointment SET \
                 therapist_id = $new_therapist_id, \
                 tenant_id = $new_tenant_id \
                 WHERE patient_id = $patient_id \
                 AND therapist_id = $old_therapist_id \
                 AND status = 'Scheduled'",
            )
            .bind(("patient_id", patient_id.to_string()))
            .bind(("old_therapist_id", old_therapist_id.to_string()))
            .bind(("new_therapist_id", new_therapist_id.to_string()))
            .bind(("new_tenant_id", new_tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AppointmentRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
