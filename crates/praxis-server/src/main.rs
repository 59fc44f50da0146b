//! Praxis Server — application entry point.
//!
//! Connects to SurrealDB, runs migrations, and wires the provisioning
//! service. The RPC transport that exposes the service's entry points
//! lives outside this repository.

use praxis_db::repository::{
    SurrealAppointmentRepository, SurrealAuditLogRepository, SurrealInvitationRepository,
    SurrealPatientProfileRepository, SurrealRelationshipRepository,
    SurrealTherapistProfileRepository, SurrealUserProfileRepository,
};
use praxis_db::{DbConfig, DbManager, DirectoryConfig, SurrealDirectory};
use praxis_provisioning::{ProvisioningConfig, ProvisioningService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("praxis=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Praxis server...");

    let mut db_config = DbConfig::default();
    if let Ok(url) = std::env::var("PRAXIS_DB_URL") {
        db_config.url = url;
    }

    let manager = match DbManager::connect(&db_config).await {
        Ok(manager) => manager,
        Err(err) => {
            tracing::error!(error = %err, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(err) = praxis_db::run_migrations(&manager.client()).await {
        tracing::error!(error = %err, "Migrations failed");
        std::process::exit(1);
    }

    let directory_config = DirectoryConfig {
        jwt_secret: std::env::var("PRAXIS_JWT_SECRET").unwrap_or_default(),
        ..Default::default()
    };
    if directory_config.jwt_secret.is_empty() {
        tracing::warn!("PRAXIS_JWT_SECRET is not set; minted tokens will not be secure");
    }

    let db = manager.client();
    let _service = ProvisioningService::new(
        SurrealDirectory::new(db.clone(), directory_config),
        SurrealUserProfileRepository::new(db.clone()),
        SurrealTherapistProfileRepository::new(db.clone()),
        SurrealPatientProfileRepository::new(db.clone()),
        SurrealInvitationRepository::new(db.clone()),
        SurrealRelationshipRepository::new(db.clone()),
        SurrealAppointmentRepository::new(db.clone()),
        SurrealAuditLogRepository::new(db),
        ProvisioningConfig::default(),
    );

    tracing::info!("Provisioning service ready");

    // TODO: mount the service behind the RPC gateway once the
    // transport crate lands.

    tracing::info!("Praxis server stopped.");
}
