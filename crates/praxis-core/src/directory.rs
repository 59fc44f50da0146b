//! Identity-directory port.
//!
//! The directory holds authentication principals (credential + unique
//! id) and the authorization claims attached to them. It is consistent
//! only with itself: nothing here participates in document-store
//! transactions, so callers order their writes to keep partial failure
//! recoverable (principal creation first, as the least-reversible
//! step).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PraxisResult;
use crate::models::claims::ClaimSet;

/// An authentication identity record, independent of any profile
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
    /// Authorization claims, absent until first propagation.
    pub claims: Option<ClaimSet>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a new principal.
#[derive(Debug, Clone)]
pub struct CreatePrincipal {
    pub email: String,
    /// Raw password (hashed by the directory before storage).
    pub password: String,
    pub display_name: String,
    pub email_verified: bool,
}

/// Fields that can be updated on an existing principal.
#[derive(Debug, Clone, Default)]
pub struct UpdatePrincipal {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

pub trait IdentityDirectory: Send + Sync {
    /// Create a principal. Fails `AlreadyExists` when a principal with
    /// the same email is already registered.
    fn create_principal(
        &self,
        input: CreatePrincipal,
    ) -> impl Future<Output = PraxisResult<Principal>> + Send;

    fn lookup_by_email(&self, email: &str) -> impl Future<Output = PraxisResult<Principal>> + Send;

    fn lookup_by_id(&self, id: Uuid) -> impl Future<Output = PraxisResult<Principal>> + Send;

    fn update_principal(
        &self,
        id: Uuid,
        input: UpdatePrincipal,
    ) -> impl Future<Output = PraxisResult<Principal>> + Send;

    /// Replace the principal's claim set wholesale. Callers wanting
    /// merge semantics read first (the claims writer does).
    fn set_claims(
        &self,
        id: Uuid,
        claims: ClaimSet,
    ) -> impl Future<Output = PraxisResult<()>> + Send;

    /// Invalidate outstanding access tokens so the next one minted
    /// carries the current claims.
    fn force_claims_refresh(&self, id: Uuid) -> impl Future<Output = PraxisResult<()>> + Send;

    /// Remove a principal outright. Used by the orphan-reconciliation
    /// sweep, not by any user-facing flow.
    fn delete_principal(&self, id: Uuid) -> impl Future<Output = PraxisResult<()>> + Send;

    /// Principals created before the cutoff, oldest first. Feeds the
    /// orphan-reconciliation sweep.
    fn list_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = PraxisResult<Vec<Principal>>> + Send;

    /// Mint a signed access token embedding the principal's current
    /// claim set.
    fn mint_access_token(&self, id: Uuid) -> impl Future<Output = PraxisResult<String>> + Send;
}
