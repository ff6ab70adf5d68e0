//! # Tenantry Provisioner Library
//!
//! Provisions tenants: a tenant, its admin directory and scope, an
//! administrator account with credentials and an RSA key, and the
//! associations between them, committed atomically.
//!
//! ## Modules
//!
//! - `orchestrator`: The provisioning workflow and standalone scope creation
//! - `policy`: Which step failures abort the workflow
//! - `config`: Environment configuration for the binary
//!
//! ## Example
//!
//! ```no_run
//! use tenantry_provisioner::orchestrator::{TenantBundle, TenantProvisioner};
//! use tenantry_shared::models::{account::Account, tenant::Tenant};
//! use tenantry_shared::store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provisioner = TenantProvisioner::new(MemoryStore::new());
//! let mut bundle = TenantBundle::new(Tenant::new("Acme"))
//!     .with_account(Account::new("admin@acme.test", "Admin"), "correct horse battery");
//!
//! provisioner.provision(&mut bundle).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod orchestrator;
pub mod policy;

pub use orchestrator::{ProvisionError, ProvisionState, TenantBundle, TenantProvisioner};
pub use policy::{ProvisioningPolicy, Severity};
