/// Common test utilities for provisioning tests
///
/// - In-memory store shared by the provisioner and the assertions
/// - Cheap Argon2 parameters so tests stay fast
/// - Bundle builders

use tenantry_provisioner::orchestrator::{TenantBundle, TenantProvisioner};
use tenantry_provisioner::policy::ProvisioningPolicy;
use tenantry_shared::auth::password::{CredentialConfig, CredentialEngine};
use tenantry_shared::models::{account::Account, tenant::Tenant};
use tenantry_shared::store::memory::MemoryState;
use tenantry_shared::store::MemoryStore;

pub const PASSWORD: &str = "correct horse battery";

/// Test context containing a store and a provisioner over it
pub struct TestContext {
    pub store: MemoryStore,
    pub provisioner: TenantProvisioner<MemoryStore>,
}

impl TestContext {
    /// Creates a context with the default policy
    pub fn new() -> Self {
        Self::with_policy(ProvisioningPolicy::default())
    }

    /// Creates a context with the given policy
    pub fn with_policy(policy: ProvisioningPolicy) -> Self {
        Self::with_engine(engine(), policy)
    }

    /// Creates a context with explicit credential parameters and policy
    pub fn with_engine(credentials: CredentialEngine, policy: ProvisioningPolicy) -> Self {
        let store = MemoryStore::new();
        let provisioner = TenantProvisioner::with_config(store.clone(), credentials, policy);
        Self { store, provisioner }
    }

    /// Committed store contents
    pub async fn state(&self) -> MemoryState {
        self.store.snapshot().await
    }
}

pub fn engine() -> CredentialEngine {
    CredentialEngine::new(CredentialConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
        output_len: 32,
    })
}

/// Engine whose parameters argon2 rejects, so every hash fails
pub fn broken_engine() -> CredentialEngine {
    CredentialEngine::new(CredentialConfig {
        memory_kib: 1,
        ..*engine().config()
    })
}

/// Bundle for a new tenant with a new administrator
pub fn new_bundle(email: &str) -> TenantBundle {
    TenantBundle::new(Tenant::new("Acme Corp")).with_account(Account::new(email, "Admin"), PASSWORD)
}

/// Asserts that nothing at all was committed
pub fn assert_empty(state: &MemoryState) {
    assert!(state.tenants.is_empty(), "tenants: {:?}", state.tenants);
    assert!(state.directories.is_empty());
    assert!(state.accounts.is_empty());
    assert!(state.keys.is_empty());
    assert!(state.scopes.is_empty());
    assert!(state.directory_accounts.is_empty());
    assert!(state.directory_scopes.is_empty());
}
