//! # Tenantry Provisioner
//!
//! Provisions one tenant from a JSON bundle file and prints the result.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/tenantry cargo run -p tenantry-provisioner -- bundle.json
//! ```
//!
//! The bundle has the shape:
//!
//! ```json
//! {
//!   "tenant": {"label": "Acme Corp"},
//!   "account": {"email": "admin@acme.test", "name": "Admin"},
//!   "password": "correct horse battery"
//! }
//! ```
//!
//! The password and the private key are never printed.

use anyhow::Context;
use tenantry_provisioner::config::Config;
use tenantry_provisioner::orchestrator::{TenantBundle, TenantProvisioner};
use tenantry_shared::auth::password::CredentialEngine;
use tenantry_shared::db::migrations::run_migrations;
use tenantry_shared::db::pool::{close_pool, create_pool};
use tenantry_shared::store::PgStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantry_provisioner=debug,tenantry_shared=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Tenantry Provisioner v{} starting...", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .context("usage: tenantry-provisioner <bundle.json>")?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read bundle file {}", path))?;
    let mut bundle: TenantBundle =
        serde_json::from_str(&raw).with_context(|| format!("invalid bundle in {}", path))?;

    let config = Config::from_env()?;

    let pool = create_pool(config.database.clone()).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let provisioner = TenantProvisioner::with_config(
        PgStore::new(pool.clone()),
        CredentialEngine::new(config.credentials),
        config.policy,
    );

    let result = provisioner.provision(&mut bundle).await;
    close_pool(pool).await;
    result?;

    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}
