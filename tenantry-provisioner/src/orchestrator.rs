/// Tenant provisioning orchestrator
///
/// Establishes a tenant together with everything needed to administer it, in
/// one storage transaction:
///
/// ```text
/// TenantProvisioner::provision
///   ├─> admission checks (no writes)
///   ├─> Tenant            persist
///   ├─> Directory         default admin directory, or the supplied one
///   ├─> Account           new: password, persist, membership, RSA key
///   │                     existing: membership only
///   ├─> active key ids    best-effort read
///   ├─> Scope             default admin scope, or the supplied one
///   ├─> Directory↔Scope   priority 1, default store for accounts, groups, RBAC
///   └─> commit
/// ```
///
/// Any fatal failure rolls the transaction back and restores the bundle to
/// what the caller passed in. Which failures are fatal is decided by
/// [`ProvisioningPolicy`].
///
/// # Example
///
/// ```no_run
/// use tenantry_provisioner::orchestrator::{TenantBundle, TenantProvisioner};
/// use tenantry_shared::models::{account::Account, tenant::Tenant};
/// use tenantry_shared::store::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provisioner = TenantProvisioner::new(MemoryStore::new());
///
/// let mut bundle = TenantBundle::new(Tenant::new("Acme Corp"))
///     .with_account(Account::new("admin@acme.test", "Admin"), "correct horse battery");
///
/// provisioner.provision(&mut bundle).await?;
/// assert!(bundle.key.is_some());
/// # Ok(())
/// # }
/// ```

use crate::policy::{ProvisioningPolicy, Severity};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tenantry_shared::auth::keys::KeyIssuer;
use tenantry_shared::auth::password::CredentialEngine;
use tenantry_shared::error::{IdentityError, IdentityResult, StoreError, ACCOUNT_EMAIL_CONSTRAINT};
use tenantry_shared::models::{
    account::Account, directory::Directory, directory_scope::DirectoryScope, key::Key, scope::Scope,
    tenant::Tenant, Entity,
};
use tenantry_shared::store::{
    AccountStore, DirectoryStore, KeyStore, ScopeStore, Store, TenantStore, Transaction,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Input and output of a provisioning run
///
/// Entities are updated in place with their stored ids and timestamps. The
/// password is read but never serialized back; `key` is output only.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TenantBundle {
    /// Tenant to create; must not carry an id
    pub tenant: Tenant,

    /// Admin directory; created with defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<Directory>,

    /// Administrator account, new (no id) or existing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,

    /// Plaintext password for a new account
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Admin scope; created with defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    /// Key issued for a new account
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
}

impl fmt::Debug for TenantBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantBundle")
            .field("tenant", &self.tenant)
            .field("directory", &self.directory)
            .field("account", &self.account)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("key", &self.key)
            .finish()
    }
}

impl TenantBundle {
    /// Starts a bundle for a new tenant
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            ..Default::default()
        }
    }

    /// Sets the administrator account and its password
    pub fn with_account(mut self, account: Account, password: impl Into<String>) -> Self {
        self.account = Some(account);
        self.password = Some(password.into());
        self
    }

    /// Sets an existing administrator account
    pub fn with_existing_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self.password = None;
        self
    }

    /// Supplies the admin directory
    pub fn with_directory(mut self, directory: Directory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Supplies the admin scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Progress of a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Start,
    TenantPersisted,
    DirectoryResolved,
    AccountResolved,
    ScopeResolved,
    Bound,
    Done,
    Aborted,
}

impl ProvisionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionState::Start => "start",
            ProvisionState::TenantPersisted => "tenant_persisted",
            ProvisionState::DirectoryResolved => "directory_resolved",
            ProvisionState::AccountResolved => "account_resolved",
            ProvisionState::ScopeResolved => "scope_resolved",
            ProvisionState::Bound => "bound",
            ProvisionState::Done => "done",
            ProvisionState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisioning run that was aborted
///
/// Nothing was committed and the bundle holds its input values again.
#[derive(Debug, thiserror::Error)]
#[error("provisioning aborted after {reached}: {error}")]
pub struct ProvisionError {
    /// Last state reached before the failure
    pub reached: ProvisionState,

    /// Cause of the abort
    #[source]
    pub error: IdentityError,
}

impl ProvisionError {
    /// Returns the cause of the abort
    pub fn kind(&self) -> &IdentityError {
        &self.error
    }
}

/// Runs tenant provisioning against a [`Store`]
///
/// Holds no mutable state; clones share the store.
#[derive(Debug, Clone)]
pub struct TenantProvisioner<S: Store> {
    store: S,
    credentials: CredentialEngine,
    keys: KeyIssuer,
    policy: ProvisioningPolicy,
}

impl<S: Store> TenantProvisioner<S> {
    /// Creates a provisioner with default credential parameters and policy
    pub fn new(store: S) -> Self {
        Self::with_config(store, CredentialEngine::default(), ProvisioningPolicy::default())
    }

    /// Creates a provisioner with explicit credential parameters and policy
    pub fn with_config(store: S, credentials: CredentialEngine, policy: ProvisioningPolicy) -> Self {
        Self {
            store,
            credentials,
            keys: KeyIssuer::new(),
            policy,
        }
    }

    /// Returns the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Provisions a tenant from `bundle`
    ///
    /// On success every entity in the bundle carries its stored id and
    /// timestamps, and `bundle.key` holds the key issued for a new account.
    ///
    /// # Errors
    ///
    /// - `IdNotNull` if the tenant already has an id
    /// - `AccountNotProvided` if no account is supplied
    /// - `InvalidName` / `InvalidEmail` if a new account fails validation
    /// - `DupEmail` if a live account already uses the email
    /// - `Store(NotFound)` if an existing account is unknown or soft-deleted
    /// - `KeyIssuance` if the key cannot be generated
    /// - `Store` for any other storage failure
    /// - credential and key listing failures when the policy makes them fatal
    pub async fn provision(&self, bundle: &mut TenantBundle) -> Result<(), ProvisionError> {
        let mut reached = ProvisionState::Start;

        if let Err(error) = admit(bundle) {
            warn!(error = %error, "Tenant bundle rejected");
            return Err(ProvisionError { reached, error });
        }

        let input = bundle.clone();

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(self.abort(bundle, input, reached, e.into())),
        };

        if let Err(error) = self.run(&mut tx, bundle, &mut reached).await {
            if let Err(e) = tx.rollback().await {
                warn!(error = %e, "Rollback failed; transaction is discarded on drop");
            }
            return Err(self.abort(bundle, input, reached, error));
        }

        if let Err(e) = tx.commit().await {
            return Err(self.abort(bundle, input, reached, e.into()));
        }
        advance(&mut reached, ProvisionState::Done);

        info!(
            tenant_id = ?bundle.tenant.id,
            directory_id = ?bundle.directory.as_ref().and_then(|d| d.id),
            account_id = ?bundle.account.as_ref().and_then(|a| a.id),
            scope_id = ?bundle.scope.as_ref().and_then(|s| s.id),
            key_id = ?bundle.key.as_ref().and_then(|k| k.id),
            "Tenant provisioned"
        );
        Ok(())
    }

    /// Workflow body; every write goes through `tx`
    async fn run(
        &self,
        tx: &mut S::Tx,
        bundle: &mut TenantBundle,
        reached: &mut ProvisionState,
    ) -> IdentityResult<()> {
        // Tenant
        tx.save_tenant(&mut bundle.tenant).await?;
        let tenant_id = persisted_id(&bundle.tenant)?;
        debug!(tenant_id = %tenant_id, "Tenant persisted");
        advance(reached, ProvisionState::TenantPersisted);

        // Admin directory
        let directory = bundle.directory.get_or_insert_with(Directory::default);
        directory.fill_admin_defaults();
        if directory.is_new() {
            directory.tenant_uid = Some(tenant_id);
        }
        tx.save_directory(directory).await?;
        let directory_id = persisted_id(directory)?;
        debug!(tenant_id = %tenant_id, directory_id = %directory_id, "Admin directory resolved");
        advance(reached, ProvisionState::DirectoryResolved);

        // Admin account
        let account = bundle.account.as_mut().ok_or(IdentityError::AccountNotProvided)?;
        let account_id = if account.is_new() {
            self.apply_password(account, bundle.password.as_deref()).await?;

            tx.save_account(account).await.map_err(account_error)?;
            let account_id = persisted_id(account)?;
            tx.upsert_directory_account(directory_id, account_id).await?;

            let mut key = self.issue_key(account_id).await?;
            tx.save_key(&mut key).await?;
            debug!(account_id = %account_id, key_id = ?key.id, "Issued key for new account");
            bundle.key = Some(key);

            account_id
        } else {
            let account_id = persisted_id(account)?;
            // Foreign keys accept soft-deleted rows
            if tx.find_account(account_id).await?.is_none() {
                return Err(StoreError::NotFound { entity: Account::KIND }.into());
            }
            tx.upsert_directory_account(directory_id, account_id).await?;
            debug!(account_id = %account_id, "Existing account added to admin directory");
            account_id
        };
        advance(reached, ProvisionState::AccountResolved);

        match tx.list_active_keys_by_account(account_id).await {
            Ok(key_ids) => debug!(account_id = %account_id, key_ids = ?key_ids, "Active keys"),
            Err(e) => self.tolerate(self.policy.key_listing_failure, "listing active keys", e.into())?,
        }

        // Admin scope
        let scope = bundle.scope.get_or_insert_with(Scope::default);
        scope.fill_admin_defaults();
        if scope.is_new() {
            scope.tenant_id = Some(tenant_id);
        }
        tx.save_scope(scope).await?;
        let scope_id = persisted_id(scope)?;
        debug!(tenant_id = %tenant_id, scope_id = %scope_id, "Admin scope resolved");
        advance(reached, ProvisionState::ScopeResolved);

        tx.upsert_directory_scope(&DirectoryScope::admin(directory_id, scope_id, Utc::now()))
            .await?;
        advance(reached, ProvisionState::Bound);

        Ok(())
    }

    /// Sets the new account's password, subject to the credential policy
    ///
    /// A missing password counts as an invalid one.
    async fn apply_password(&self, account: &mut Account, password: Option<&str>) -> IdentityResult<()> {
        let engine = self.credentials.clone();
        let password = password.unwrap_or_default().to_string();
        let mut candidate = account.clone();

        // Argon2 is memory-hard; keep it off the async workers
        let hashed = tokio::task::spawn_blocking(move || {
            engine.set_password(&mut candidate, &password).map(|()| candidate)
        })
        .await
        .map_err(|e| IdentityError::HashingFailure(e.to_string()))
        .and_then(|result| result);

        match hashed {
            Ok(hashed) => {
                account.password_hash = hashed.password_hash;
                Ok(())
            }
            Err(e) => self.tolerate(self.policy.credential_failure, "setting admin password", e),
        }
    }

    async fn issue_key(&self, account_id: Uuid) -> IdentityResult<Key> {
        let issuer = self.keys;
        tokio::task::spawn_blocking(move || issuer.issue(Some(account_id)))
            .await
            .map_err(|e| IdentityError::KeyIssuance(e.to_string()))?
    }

    /// Applies `severity` to a step failure
    fn tolerate(&self, severity: Severity, step: &str, error: IdentityError) -> IdentityResult<()> {
        if severity.is_fatal() {
            return Err(error);
        }
        warn!(step = step, severity = %severity, error = %error, "Step failed; continuing");
        Ok(())
    }

    fn abort(
        &self,
        bundle: &mut TenantBundle,
        input: TenantBundle,
        reached: ProvisionState,
        error: IdentityError,
    ) -> ProvisionError {
        *bundle = input;
        error!(
            reached = %reached,
            state = %ProvisionState::Aborted,
            error = %error,
            "Tenant provisioning aborted and rolled back"
        );
        ProvisionError { reached, error }
    }

    /// Creates a scope for an existing tenant
    ///
    /// # Errors
    ///
    /// - `TenantNotProvided` if the scope names no tenant
    /// - `IdNotNull` if the scope already has an id
    /// - `Store` if the tenant does not exist or the write fails
    pub async fn create_scope(&self, scope: &mut Scope) -> IdentityResult<()> {
        scope.validate_owner()?;
        if !scope.is_new() {
            return Err(IdentityError::IdNotNull);
        }

        let mut tx = self.store.begin().await?;
        let mut candidate = scope.clone();
        if let Err(e) = tx.save_scope(&mut candidate).await {
            error!(tenant_id = ?scope.tenant_id, error = %e, "Could not create scope");
            tx.rollback().await?;
            return Err(e.into());
        }
        tx.commit().await?;

        *scope = candidate;
        info!(tenant_id = ?scope.tenant_id, scope_id = ?scope.id, "Scope created");
        Ok(())
    }

    /// Lists the live scopes of a tenant, oldest first
    pub async fn list_scopes(&self, tenant_id: Uuid) -> IdentityResult<Vec<Scope>> {
        let mut tx = self.store.begin().await?;
        let scopes = tx.list_scopes_by_tenant(tenant_id).await?;
        tx.commit().await?;
        Ok(scopes)
    }
}

/// Checks the bundle before anything is written
fn admit(bundle: &TenantBundle) -> IdentityResult<()> {
    if !bundle.tenant.is_new() {
        return Err(IdentityError::IdNotNull);
    }

    let account = bundle.account.as_ref().ok_or(IdentityError::AccountNotProvided)?;
    if account.is_new() {
        account.validate_fields()?;
    }

    Ok(())
}

fn advance(reached: &mut ProvisionState, next: ProvisionState) {
    debug!(from = %reached, to = %next, "Provisioning state");
    *reached = next;
}

/// Reads the id a save must have assigned
fn persisted_id<T: Entity>(entity: &T) -> IdentityResult<Uuid> {
    entity
        .id()
        .ok_or(IdentityError::Store(StoreError::NotFound { entity: T::KIND }))
}

fn account_error(e: StoreError) -> IdentityError {
    if e.is_conflict_on(ACCOUNT_EMAIL_CONSTRAINT) {
        IdentityError::DupEmail
    } else {
        e.into()
    }
}
