//! SurrealDB-backed identity directory.
//!
//! Principals live in their own `principal` table, separate from every
//! profile document; the directory is consistent only with itself.
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided via [`DirectoryConfig`].
//!
//! Access tokens are HS256 JWTs that embed the principal's claim set;
//! `force_claims_refresh` moves the `tokens_valid_after` watermark so
//! previously minted tokens can be rejected by verifiers.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use praxis_core::directory::{CreatePrincipal, IdentityDirectory, Principal, UpdatePrincipal};
use praxis_core::error::PraxisResult;
use praxis_core::models::claims::ClaimSet;
use serde::{Deserialize, Serialize};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Configuration for the identity directory.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// HS256 signing secret for access tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 3600 = 1 hour).
    pub token_lifetime_secs: u64,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_lifetime_secs: 3600,
            jwt_issuer: "praxis".into(),
            pepper: None,
        }
    }
}

/// JWT claims embedded in every access token. The authorization claim
/// set is flattened into the payload so downstream services read
/// `role`, `tenant_id`, `is_verified` and `therapist_ids` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject — principal ID (UUID string).
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
    /// Authorization claims, absent until first propagation. Readers
    /// must treat a missing `role` as "not yet propagated" and force
    /// one refresh, not as a permanent error.
    #[serde(flatten)]
    pub claims: Option<ClaimSet>,
}

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct PrincipalRow {
    email: String,
    display_name: String,
    #[allow(dead_code)]
    password_hash: String,
    email_verified: bool,
    claims: Option<serde_json::Value>,
    #[allow(dead_code)]
    tokens_valid_after: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct PrincipalRowWithId {
    record_id: String,
    email: String,
    display_name: String,
    password_hash: String,
    email_verified: bool,
    claims: Option<serde_json::Value>,
    #[allow(dead_code)]
    tokens_valid_after: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn parse_claims(value: Option<serde_json::Value>) -> Result<Option<ClaimSet>, DbError> {
    value
        .map(|v| {
            serde_json::from_value(v)
                .map_err(|e| DbError::Migration(format!("invalid claims object: {e}")))
        })
        .transpose()
}

impl PrincipalRow {
    fn into_principal(self, id: Uuid) -> Result<Principal, DbError> {
        Ok(Principal {
            id,
            email: self.email,
            display_name: self.display_name,
            email_verified: self.email_verified,
            claims: parse_claims(self.claims)?,
            created_at: self.created_at,
        })
    }
}

impl PrincipalRowWithId {
    fn try_into_principal(self) -> Result<Principal, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        Ok(Principal {
            id,
            email: self.email,
            display_name: self.display_name,
            email_verified: self.email_verified,
            claims: parse_claims(self.claims)?,
            created_at: self.created_at,
        })
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Crypto(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Crypto(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash.
///
/// Public for use by the (out-of-scope) login layer and tests.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Crypto(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Crypto(format!("verify error: {e}"))),
    }
}

/// SurrealDB implementation of the identity directory.
#[derive(Clone)]
pub struct SurrealDirectory<C: Connection> {
    db: Surreal<C>,
    config: DirectoryConfig,
}

impl<C: Connection> SurrealDirectory<C> {
    pub fn new(db: Surreal<C>, config: DirectoryConfig) -> Self {
        Self { db, config }
    }

    /// Decode and verify an access token minted by this directory.
    pub fn decode_access_token(&self, token: &str) -> Result<AccessTokenClaims, DbError> {
        let key = DecodingKey::from_secret(self.config.jwt_secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

        jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| DbError::Crypto(format!("JWT decode: {e}")))
    }
}

impl<C: Connection> IdentityDirectory for SurrealDirectory<C> {
    async fn create_principal(&self, input: CreatePrincipal) -> PraxisResult<Principal> {
        // Existence probe; the unique email index backs this against
        // concurrent creates.
        let mut probe = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM principal WHERE email = $email")
            .bind(("email", input.email.clone()))
            .await
            .map_err(DbError::from)?;
        let existing: Vec<PrincipalRowWithId> = probe.take(0).map_err(DbError::from)?;
        if !existing.is_empty() {
            return Err(DbError::AlreadyExists {
                entity: format!("principal email={}", input.email),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let password_hash = hash_password(&input.password, self.config.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('principal', $id) SET \
                 email = $email, \
                 display_name = $display_name, \
                 password_hash = $password_hash, \
                 email_verified = $email_verified, \
                 claims = NONE, \
                 tokens_valid_after = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("email", input.email.clone()))
            .bind(("display_name", input.display_name))
            .bind(("password_hash", password_hash))
            .bind(("email_verified", input.email_verified))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            let message = e.to_string();
            if message.contains("idx_principal_email") {
                DbError::AlreadyExists {
                    entity: format!("principal email={}", input.email),
                }
            } else {
                DbError::Migration(message)
            }
        })?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: id_str,
        })?;

        Ok(row.into_principal(id)?)
    }

    async fn lookup_by_email(&self, email: &str) -> PraxisResult<Principal> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM principal WHERE email = $email")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_principal()?)
    }

    async fn lookup_by_id(&self, id: Uuid) -> PraxisResult<Principal> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('principal', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: id_str,
        })?;

        Ok(row.into_principal(id)?)
    }

    async fn update_principal(&self, id: Uuid, input: UpdatePrincipal) -> PraxisResult<Principal> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.display_name.is_some() {
            sets.push("display_name = $display_name");
        }
        if sets.is_empty() {
            return self.lookup_by_id(id).await;
        }

        let query = format!(
            "UPDATE type::record('principal', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
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

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: id_str,
        })?;

        Ok(row.into_principal(id)?)
    }

    async fn set_claims(&self, id: Uuid, claims: ClaimSet) -> PraxisResult<()> {
        let id_str = id.to_string();
        let claims_value = serde_json::to_value(&claims)
            .map_err(|e| DbError::Migration(format!("claims serialization: {e}")))?;

        let mut result = self
            .db
            .query("UPDATE type::record('principal', $id) SET claims = $claims")
            .bind(("id", id_str.clone()))
            .bind(("claims", claims_value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "principal".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn force_claims_refresh(&self, id: Uuid) -> PraxisResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('principal', $id) SET \
                 tokens_valid_after = time::now()",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "principal".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn delete_principal(&self, id: Uuid) -> PraxisResult<()> {
        self.db
            .query("DELETE type::record('principal', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_created_before(&self, cutoff: DateTime<Utc>) -> PraxisResult<Vec<Principal>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM principal \
                 WHERE created_at < $cutoff \
                 ORDER BY created_at ASC",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRowWithId> = result.take(0).map_err(DbError::from)?;
        let principals = rows
            .into_iter()
            .map(|row| row.try_into_principal())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(principals)
    }

    async fn mint_access_token(&self, id: Uuid) -> PraxisResult<String> {
        let principal = self.lookup_by_id(id).await?;

        let now = Utc::now().timestamp();
        let token_claims = AccessTokenClaims {
            sub: principal.id.to_string(),
            iss: self.config.jwt_issuer.clone(),
            iat: now,
            exp: now + self.config.token_lifetime_secs as i64,
            jti: Uuid::new_v4().to_string(),
            claims: principal.claims,
        };

        let key = EncodingKey::from_secret(self.config.jwt_secret.as_bytes());
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &token_claims, &key)
            .map_err(|e| DbError::Crypto(format!("JWT encode: {e}")))?;

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter2-hunter2", None).unwrap();
        assert!(verify_password("hunter2-hunter2", &hash, None).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("hunter2-hunter2", None).unwrap();
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("hunter2-hunter2", Some("pepper!")).unwrap();
        assert!(verify_password("hunter2-hunter2", &hash, Some("pepper!")).unwrap());
        assert!(!verify_password("hunter2-hunter2", &hash, None).unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash", None).is_err());
    }
}
