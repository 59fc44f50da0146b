//! Provisioning configuration.

/// Configuration for the provisioning service.
#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    /// Invitation lifetime in seconds (default: 604_800 = 7 days).
    pub invitation_lifetime_secs: u64,
    /// Base URL invitation links are built from; the token is appended
    /// as an `?invite=` query parameter.
    pub invitation_base_url: String,
    /// Grace period before a principal without a matching user profile
    /// is considered orphaned (default: 86_400 = 24 hours).
    pub orphan_grace_secs: u64,
    /// Minimum password length for newly created accounts.
    pub min_password_length: usize,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            invitation_lifetime_secs: 604_800,
            invitation_base_url: "https://app.praxis.example/join".into(),
            orphan_grace_secs: 86_400,
            min_password_length: 6,
        }
    }
}
