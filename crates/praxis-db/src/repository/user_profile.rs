//! SurrealDB implementation of [`UserProfileRepository`].

use chrono::{DateTime, Utc};
use praxis_core::error::PraxisResult;
use praxis_core::models::claims::Role;
use praxis_core::models::user::{CreateUserProfile, UpdateUserProfile, UserProfile};
use praxis_core::repository::UserProfileRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserProfileRow {
    email: String,
    display_name: String,
    role: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

fn parse_role(s: &str) -> Result<Role, DbError> {
    match s {
        "Admin" => Ok(Role::Admin),
        "Therapist" => Ok(Role::Therapist),
        "Patient" => Ok(Role::Patient),
        other => Err(DbError::Migration(format!("unknown role: {other}"))),
    }
}

fn role_to_string(role: Role) -> &'static str {
    match role {
        Role::Admin => "Admin",
        Role::Therapist => "Therapist",
        Role::Patient => "Patient",
    }
}

impl UserProfileRow {
    fn into_profile(self, uid: Uuid) -> Result<UserProfile, DbError> {
        Ok(UserProfile {
            uid,
            email: self.email,
            display_name: self.display_name,
            role: parse_role(&self.role)?,
            created_at: self.created_at,
            is_deleted: self.is_deleted,
        })
    }
}

/// SurrealDB implementation of the user profile repository.
#[derive(Clone)]
pub struct SurrealUserProfileRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserProfileRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserProfileRepository for SurrealUserProfileRepository<C> {
    async fn create(&self, input: CreateUserProfile) -> PraxisResult<UserProfile> {
        let uid_str = input.uid.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user_profile', $uid) SET \
                 email = $email, \
                 display_name = $display_name, \
                 role = $role, \
                 is_deleted = false",
            )
            .bind(("uid", uid_str.clone()))
            .bind(("email", input.email))
            .bind(("display_name", input.display_name))
            .bind(("role", role_to_string(input.role).to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            let message = e.to_string();
            if message.contains("already exists") {
                DbError::AlreadyExists {
                    entity: format!("user_profile {uid_str}"),
                }
            } else {
                DbError::Migration(message)
            }
        })?;

        let rows: Vec<UserProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(input.uid)?)
    }

    async fn get_by_uid(&self, uid: Uuid) -> PraxisResult<UserProfile> {
        let uid_str = uid.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user_profile', $uid)")
            .bind(("uid", uid_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(uid)?)
    }

    async fn update(&self, uid: Uuid, input: UpdateUserProfile) -> PraxisResult<UserProfile> {
        let uid_str = uid.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.display_name.is_some() {
            sets.push("display_name = $display_name");
        }
        if sets.is_empty() {
            return self.get_by_uid(uid).await;
        }

        let query = format!(
            "UPDATE type::record('user_profile', $uid) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("uid", uid_str.clone()));
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(display_name) = input.display_name {
            builder = builder.bind(("display_name", display_name));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<UserProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_profile".into(),
            id: uid_str,
        })?;

        Ok(row.into_profile(uid)?)
    }

    async fn soft_delete(&self, uid: Uuid) -> PraxisResult<()> {
        let uid_str = uid.to_string();

        let mut result = self
            .db
            .query("UPDATE type::record('user_profile', $uid) SET is_deleted = true")
            .bind(("uid", uid_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserProfileRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "user_profile".into(),
                id: uid_str,
            }
            .into());
        }

        Ok(())
    }
}
