//! Appointment domain model.
//!
//! The calendar itself (request/approval flow, UI, reminders) lives
//! outside this subsystem. Appointments appear here only as the record
//! the transfer protocol must reattribute: still-scheduled appointments
//! of a transferred patient move to the new therapist's tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: String,
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub status: AppointmentStatus,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointment {
    pub tenant_id: String,
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}
