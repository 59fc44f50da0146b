//! SurrealDB implementation of [`InvitationRepository`].
//!
//! The two invitation variants live in physically separate tables,
//! both keyed by the invitation token, so `find_by_token` is a trial
//! lookup: the admin table first, then the therapist table. A token
//! resolves to at most one invitation across both.

use chrono::{DateTime, Utc};
use praxis_core::error::PraxisResult;
use praxis_core::models::invitation::{
    AdminInvitation, Invitation, InvitationKind, InvitationStatus, InvitedRole,
    TherapistInvitation,
};
use praxis_core::repository::{InvitationRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

fn table(kind: InvitationKind) -> &'static str {
    match kind {
        InvitationKind::Admin => "admin_invitation",
        InvitationKind::Therapist => "therapist_invitation",
    }
}

fn parse_status(s: &str) -> Result<InvitationStatus, DbError> {
    match s {
        "Pending" => Ok(InvitationStatus::Pending),
        "Used" => Ok(InvitationStatus::Used),
        "Expired" => Ok(InvitationStatus::Expired),
        "Cancelled" => Ok(InvitationStatus::Cancelled),
        other => Err(DbError::Migration(format!(
            "unknown invitation status: {other}"
        ))),
    }
}

fn status_to_string(status: InvitationStatus) -> &'static str {
    match status {
        InvitationStatus::Pending => "Pending",
        InvitationStatus::Used => "Used",
        InvitationStatus::Expired => "Expired",
        InvitationStatus::Cancelled => "Cancelled",
    }
}

fn parse_invited_role(s: &str) -> Result<InvitedRole, DbError> {
    match s {
        "Therapist" => Ok(InvitedRole::Therapist),
        "Patient" => Ok(InvitedRole::Patient),
        other => Err(DbError::Migration(format!("unknown invited role: {other}"))),
    }
}

fn invited_role_to_string(role: InvitedRole) -> &'static str {
    match role {
        InvitedRole::Therapist => "Therapist",
        InvitedRole::Patient => "Patient",
    }
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Migration(format!("invalid {field} UUID: {e}")))
}

#[derive(Debug, SurrealValue)]
struct AdminInvitationRow {
    role: String,
    invited_by: String,
    target_email: String,
    target_name: Option<String>,
    tenant_id: Option<String>,
    therapist_data: Option<serde_json::Value>,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    redeemed_uid: Option<String>,
}

impl AdminInvitationRow {
    fn into_invitation(self, token: String) -> Result<AdminInvitation, DbError> {
        let therapist_data = self
            .therapist_data
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| DbError::Migration(format!("invalid therapist prefill: {e}")))
            })
            .transpose()?;
        let redeemed_uid = self
            .redeemed_uid
            .map(|raw| parse_uuid("redeemed_uid", &raw))
            .transpose()?;
        Ok(AdminInvitation {
            token,
            role: parse_invited_role(&self.role)?,
            invited_by: parse_uuid("invited_by", &self.invited_by)?,
            target_email: self.target_email,
            target_name: self.target_name,
            tenant_id: self.tenant_id,
            therapist_data,
            status: parse_status(&self.status)?,
            expires_at: self.expires_at,
            created_at: self.created_at,
            used_at: self.used_at,
            redeemed_uid,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct TherapistInvitationRow {
    therapist_id: String,
    therapist_email: String,
    therapist_name: String,
    patient_email: String,
    patient_name: Option<String>,
    tenant_id: String,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    redeemed_uid: Option<String>,
}

impl TherapistInvitationRow {
    fn into_invitation(self, token: String) -> Result<TherapistInvitation, DbError> {
        let redeemed_uid = self
            .redeemed_uid
            .map(|raw| parse_uuid("redeemed_uid", &raw))
            .transpose()?;
        Ok(TherapistInvitation {
            token,
            therapist_id: parse_uuid("therapist_id", &self.therapist_id)?,
            therapist_email: self.therapist_email,
            therapist_name: self.therapist_name,
            patient_email: self.patient_email,
            patient_name: self.patient_name,
            tenant_id: self.tenant_id,
            status: parse_status(&self.status)?,
            expires_at: self.expires_at,
            created_at: self.created_at,
            used_at: self.used_at,
            redeemed_uid,
        })
    }
}

/// Minimal row struct for writes that only need an affected-row check.
#[derive(Debug, SurrealValue)]
struct StatusRow {
    #[allow(dead_code)]
    status: String,
}

/// Row struct carrying the token (record id) for list queries.
#[derive(Debug, SurrealValue)]
struct AdminInvitationRowWithId {
    record_id: String,
    role: String,
    invited_by: String,
    target_email: String,
    target_name: Option<String>,
    tenant_id: Option<String>,
    therapist_data: Option<serde_json::Value>,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    redeemed_uid: Option<String>,
}

#[derive(Debug, SurrealValue)]
struct TherapistInvitationRowWithId {
    record_id: String,
    therapist_id: String,
    therapist_email: String,
    therapist_name: String,
    patient_email: String,
    patient_name: Option<String>,
    tenant_id: String,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    redeemed_uid: Option<String>,
}

impl AdminInvitationRowWithId {
    fn try_into_invitation(self) -> Result<AdminInvitation, DbError> {
        let token = self.record_id.clone();
        AdminInvitationRow {
            role: self.role,
            invited_by: self.invited_by,
            target_email: self.target_email,
            target_name: self.target_name,
            tenant_id: self.tenant_id,
            therapist_data: self.therapist_data,
            status: self.status,
            expires_at: self.expires_at,
            created_at: self.created_at,
            used_at: self.used_at,
            redeemed_uid: self.redeemed_uid,
        }
        .into_invitation(token)
    }
}

impl TherapistInvitationRowWithId {
    fn try_into_invitation(self) -> Result<TherapistInvitation, DbError> {
        let token = self.record_id.clone();
        TherapistInvitationRow {
            therapist_id: self.therapist_id,
            therapist_email: self.therapist_email,
            therapist_name: self.therapist_name,
            patient_email: self.patient_email,
            patient_name: self.patient_name,
            tenant_id: self.tenant_id,
            status: self.status,
            expires_at: self.expires_at,
            created_at: self.created_at,
            used_at: self.used_at,
            redeemed_uid: self.redeemed_uid,
        }
        .into_invitation(token)
    }
}

/// SurrealDB implementation of the invitation repository.
#[derive(Clone)]
pub struct SurrealInvitationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInvitationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_admin(&self, token: &str) -> PraxisResult<Option<AdminInvitation>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('admin_invitation', $inv_token)")
            .bind(("inv_token", token.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AdminInvitationRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_invitation(token.to_string()))
            .transpose()
            .map_err(Into::into)
    }

    async fn find_therapist(&self, token: &str) -> PraxisResult<Option<TherapistInvitation>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('therapist_invitation', $inv_token)")
            .bind(("inv_token", token.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TherapistInvitationRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_invitation(token.to_string()))
            .transpose()
            .map_err(Into::into)
    }

    async fn create_admin(&self, inv: &AdminInvitation) -> PraxisResult<()> {
        let therapist_data = inv
            .therapist_data
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::Migration(format!("therapist prefill serialization: {e}")))?;

        let result = self
            .db
            .query(
                "CREATE type::record('admin_invitation', $inv_token) SET \
                 role = $role, \
                 invited_by = $invited_by, \
                 target_email = $target_email, \
                 target_name = $target_name, \
                 tenant_id = $tenant_id, \
                 therapist_data = $therapist_data, \
                 status = $status, \
                 expires_at = $expires_at, \
                 used_at = NONE, \
                 redeemed_uid = NONE",
            )
            .bind(("inv_token", inv.token.clone()))
            .bind(("role", invited_role_to_string(inv.role).to_string()))
            .bind(("invited_by", inv.invited_by.to_string()))
            .bind(("target_email", inv.target_email.clone()))
            .bind(("target_name", inv.target_name.clone()))
            .bind(("tenant_id", inv.tenant_id.clone()))
            .bind(("therapist_data", therapist_data))
            .bind(("status", status_to_string(inv.status).to_string()))
            .bind(("expires_at", inv.expires_at))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                DbError::AlreadyExists {
                    entity: format!("admin_invitation {}", inv.token),
                }
            } else {
                DbError::Migration(message)
            }
        })?;

        Ok(())
    }

    async fn create_therapist(&self, inv: &TherapistInvitation) -> PraxisResult<()> {
        let result = self
            .db
            .query(
                "CREATE type::record('therapist_invitation', $inv_token) SET \
                 therapist_id = $therapist_id, \
                 therapist_email = $therapist_email, \
                 therapist_name = $therapist_name, \
                 patient_email = $patient_email, \
                 patient_name = $patient_name, \
                 tenant_id = $tenant_id, \
                 status = $status, \
                 expires_at = $expires_at, \
                 used_at = NONE, \
                 redeemed_uid = NONE",
            )
            .bind(("inv_token", inv.token.clone()))
            .bind(("therapist_id", inv.therapist_id.to_string()))
            .bind(("therapist_email", inv.therapist_email.clone()))
            .bind(("therapist_name", inv.therapist_name.clone()))
            .bind(("patient_email", inv.patient_email.clone()))
            .bind(("patient_name", inv.patient_name.clone()))
            .bind(("tenant_id", inv.tenant_id.clone()))
            .bind(("status", status_to_string(inv.status).to_string()))
            .bind(("expires_at", inv.expires_at))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                DbError::AlreadyExists {
                    entity: format!("therapist_invitation {}", inv.token),
                }
            } else {
                DbError::Migration(message)
            }
        })?;

        Ok(())
    }

    async fn set_status(
        &self,
        token: &str,
        kind: InvitationKind,
        status: InvitationStatus,
    ) -> PraxisResult<()> {
        let query = format!(
            "UPDATE type::record('{}', $inv_token) SET status = $status",
            table(kind)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("inv_token", token.to_string()))
            .bind(("status", status_to_string(status).to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StatusRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: table(kind).into(),
                id: token.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl<C: Connection> InvitationRepository for SurrealInvitationRepository<C> {
    async fn create(&self, invitation: &Invitation) -> PraxisResult<()> {
        match invitation {
            Invitation::Admin(inv) => self.create_admin(inv).await,
            Invitation::Therapist(inv) => self.create_therapist(inv).await,
        }
    }

    async fn find_by_token(&self, token: &str) -> PraxisResult<Invitation> {
        if let Some(inv) = self.find_admin(token).await? {
            return Ok(Invitation::Admin(inv));
        }
        if let Some(inv) = self.find_therapist(token).await? {
            return Ok(Invitation::Therapist(inv));
        }
        Err(DbError::NotFound {
            entity: "invitation".into(),
            id: token.to_string(),
        }
        .into())
    }

    async fn mark_expired(&self, token: &str, kind: InvitationKind) -> PraxisResult<()> {
        self.set_status(token, kind, InvitationStatus::Expired).await
    }

    async fn mark_cancelled(&self, token: &str, kind: InvitationKind) -> PraxisResult<()> {
        self.set_status(token, kind, InvitationStatus::Cancelled)
            .await
    }

    async fn mark_used(
        &self,
        token: &str,
        kind: InvitationKind,
        redeemed_uid: Uuid,
        used_at: DateTime<Utc>,
    ) -> PraxisResult<()> {
        let query = format!(
            "UPDATE type::record('{}', $inv_token) SET \
             status = 'Used', used_at = $used_at, redeemed_uid = $redeemed_uid",
            table(kind)
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("inv_token", token.to_string()))
            .bind(("used_at", used_at))
            .bind(("redeemed_uid", redeemed_uid.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StatusRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: table(kind).into(),
                id: token.to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn list_by_issuer(
        &self,
        issuer: Uuid,
        pagination: Pagination,
    ) -> PraxisResult<PaginatedResult<Invitation>> {
        let issuer_str = issuer.to_string();

        let mut admin_result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM admin_invitation \
                 WHERE invited_by = $issuer ORDER BY created_at DESC",
            )
            .bind(("issuer", issuer_str.clone()))
            .await
            .map_err(DbError::from)?;
        let admin_rows: Vec<AdminInvitationRowWithId> =
            admin_result.take(0).map_err(DbError::from)?;

        let mut therapist_result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM therapist_invitation \
                 WHERE therapist_id = $issuer ORDER BY created_at DESC",
            )
            .bind(("issuer", issuer_str))
            .await
            .map_err(DbError::from)?;
        let therapist_rows: Vec<TherapistInvitationRowWithId> =
            therapist_result.take(0).map_err(DbError::from)?;

        // The two tables are merged and paginated in memory; a single
        // issuer's open invitations number in the dozens at most.
        let mut items = Vec::with_capacity(admin_rows.len() + therapist_rows.len());
        for row in admin_rows {
            items.push(Invitation::Admin(row.try_into_invitation()?));
        }
        for row in therapist_rows {
            items.push(Invitation::Therapist(row.try_into_invitation()?));
        }
        items.sort_by(|a, b| {
            let created = |inv: &Invitation| match inv {
                Invitation::Admin(i) => i.created_at,
                Invitation::Therapist(i) => i.created_at,
            };
            created(b).cmp(&created(a))
        });

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
