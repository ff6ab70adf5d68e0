/// In-memory gateway
///
/// Keeps every table in a `HashMap` behind a tokio mutex. A transaction holds
/// the mutex for its whole lifetime and works on a private copy of the state:
/// commit swaps the copy in, rollback (or drop) discards it. Transactions are
/// therefore fully serialized.
///
/// The store mirrors the PostgreSQL schema closely enough for workflow tests:
/// storage-assigned ids, default status, soft-delete filtering, foreign keys
/// and the case-insensitive unique email index, reported with the same
/// constraint names.
///
/// Operations can be made to fail on demand with [`MemoryStore::fail_on`].
///
/// # Example
///
/// ```
/// use tenantry_shared::models::tenant::Tenant;
/// use tenantry_shared::store::{MemoryStore, Store, TenantStore, Transaction};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
///
/// let mut tx = store.begin().await?;
/// let mut tenant = Tenant::new("Acme Corp");
/// tx.save_tenant(&mut tenant).await?;
/// tx.commit().await?;
///
/// assert_eq!(store.snapshot().await.tenants.len(), 1);
/// # Ok(())
/// # }
/// ```

use super::{AccountStore, DirectoryStore, KeyStore, ScopeStore, Store, TenantStore, Transaction};
use crate::error::{StoreError, StoreResult, ACCOUNT_EMAIL_CONSTRAINT};
use crate::models::{
    account::Account, directory::Directory, directory_account::DirectoryAccount,
    directory_scope::DirectoryScope, key::Key, scope::Scope, tenant::Tenant, Entity,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    Commit,
    SaveTenant,
    SaveDirectory,
    SaveAccount,
    SaveKey,
    SaveScope,
    UpsertDirectoryAccount,
    UpsertDirectoryScope,
    ListActiveKeys,
}

impl Fault {
    fn as_str(&self) -> &'static str {
        match self {
            Fault::Begin => "begin",
            Fault::Commit => "commit",
            Fault::SaveTenant => "save_tenant",
            Fault::SaveDirectory => "save_directory",
            Fault::SaveAccount => "save_account",
            Fault::SaveKey => "save_key",
            Fault::SaveScope => "save_scope",
            Fault::UpsertDirectoryAccount => "upsert_directory_account",
            Fault::UpsertDirectoryScope => "upsert_directory_scope",
            Fault::ListActiveKeys => "list_active_keys_by_account",
        }
    }
}

/// Committed contents of a [`MemoryStore`]
///
/// Soft-deleted rows are kept, as in PostgreSQL.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub tenants: HashMap<Uuid, Tenant>,
    pub directories: HashMap<Uuid, Directory>,
    pub accounts: HashMap<Uuid, Account>,
    pub keys: HashMap<Uuid, Key>,
    pub scopes: HashMap<Uuid, Scope>,
    pub directory_accounts: HashMap<(Uuid, Uuid), DirectoryAccount>,
    pub directory_scopes: HashMap<(Uuid, Uuid), DirectoryScope>,
}

#[derive(Debug, Default)]
struct FaultSet(std::sync::Mutex<HashSet<Fault>>);

impl FaultSet {
    fn set(&self) -> std::sync::MutexGuard<'_, HashSet<Fault>> {
        // A panicking test must not poison the store for the others
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, fault: Fault) -> StoreResult<()> {
        if self.set().contains(&fault) {
            tracing::debug!(operation = fault.as_str(), "Injected store fault");
            return Err(StoreError::Unavailable(format!("injected fault: {}", fault.as_str())));
        }
        Ok(())
    }
}

/// Gateway over in-process maps
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultSet>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `fault` fail with `StoreError::Unavailable`
    pub fn fail_on(&self, fault: Fault) {
        self.faults.set().insert(fault);
    }

    /// Removes every injected fault
    pub fn clear_faults(&self) {
        self.faults.set().clear();
    }

    /// Copies the committed state
    ///
    /// Waits for any open transaction to finish.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> StoreResult<MemoryTransaction> {
        self.faults.check(Fault::Begin)?;

        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        })
    }
}

/// An open in-memory transaction
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<FaultSet>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self) -> StoreResult<()> {
        self.faults.check(Fault::Commit)?;

        let MemoryTransaction { mut guard, working, .. } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

/// Current time at PostgreSQL precision
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A timestamp strictly after `previous`
fn after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict {
        constraint: constraint.to_string(),
    }
}

fn is_live<T: Entity>(table: &HashMap<Uuid, T>, id: Option<Uuid>) -> bool {
    id.and_then(|id| table.get(&id)).is_some_and(|row| !row.is_deleted())
}

/// Applies the insert-or-update bookkeeping to `entity` and stores it
///
/// `merge` runs on updates after the immutable fields have been restored and
/// may copy further stored fields over the caller's values.
fn save<T: Entity>(table: &mut HashMap<Uuid, T>, entity: &mut T, merge: impl FnOnce(&mut T, &T)) -> StoreResult<()> {
    match entity.id() {
        None => {
            let id = Uuid::new_v4();
            entity.set_id(id);
            entity.set_deleted(None);
            entity.stamp_insert(now());
            table.insert(id, entity.clone());
        }
        Some(id) => {
            let stored = table
                .get(&id)
                .filter(|row| !row.is_deleted())
                .ok_or(StoreError::NotFound { entity: T::KIND })?;

            entity.retain_immutable(stored);
            merge(entity, stored);
            if entity.status().is_empty() {
                if let Some(status) = stored.get_status() {
                    entity.set_status(status);
                }
            }
            entity.set_deleted(None);
            entity.stamp_update(after(stored.updated()));
            table.insert(id, entity.clone());
        }
    }
    Ok(())
}

#[async_trait]
impl TenantStore for MemoryTransaction {
    async fn save_tenant(&mut self, tenant: &mut Tenant) -> StoreResult<()> {
        self.faults.check(Fault::SaveTenant)?;
        save(&mut self.working.tenants, tenant, |_, _| {})
    }

    async fn find_tenant(&mut self, id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(self.working.tenants.get(&id).filter(|t| !t.is_deleted()).cloned())
    }
}

#[async_trait]
impl DirectoryStore for MemoryTransaction {
    async fn save_directory(&mut self, directory: &mut Directory) -> StoreResult<()> {
        self.faults.check(Fault::SaveDirectory)?;
        if directory.id.is_none() && !is_live(&self.working.tenants, directory.tenant_uid) {
            return Err(conflict("directories_tenant_uid_fkey"));
        }
        save(&mut self.working.directories, directory, |_, _| {})
    }

    async fn upsert_directory_account(
        &mut self,
        directory_id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<DirectoryAccount> {
        self.faults.check(Fault::UpsertDirectoryAccount)?;
        if !is_live(&self.working.directories, Some(directory_id)) {
            return Err(conflict("directory_account_directory_id_fkey"));
        }
        if !is_live(&self.working.accounts, Some(account_id)) {
            return Err(conflict("directory_account_account_id_fkey"));
        }

        let link = self
            .working
            .directory_accounts
            .entry((directory_id, account_id))
            .and_modify(|link| {
                link.updated = after(link.updated);
                link.deleted = None;
            })
            .or_insert_with(|| DirectoryAccount::new(directory_id, account_id, now()));

        Ok(link.clone())
    }

    async fn list_directory_accounts(&mut self, directory_id: Uuid) -> StoreResult<Vec<DirectoryAccount>> {
        let mut links: Vec<DirectoryAccount> = self
            .working
            .directory_accounts
            .values()
            .filter(|link| link.directory_id == directory_id && link.deleted.is_none())
            .cloned()
            .collect();
        links.sort_by_key(|link| link.created);
        Ok(links)
    }
}

#[async_trait]
impl AccountStore for MemoryTransaction {
    async fn save_account(&mut self, account: &mut Account) -> StoreResult<()> {
        self.faults.check(Fault::SaveAccount)?;

        let email = account.email.to_lowercase();
        let taken = self
            .working
            .accounts
            .values()
            .any(|other| other.id != account.id && !other.is_deleted() && other.email.to_lowercase() == email);
        if taken {
            return Err(conflict(ACCOUNT_EMAIL_CONSTRAINT));
        }

        save(&mut self.working.accounts, account, |_, _| {})
    }

    async fn find_account(&mut self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.working.accounts.get(&id).filter(|a| !a.is_deleted()).cloned())
    }

    async fn find_account_by_email(&mut self, email: &str) -> StoreResult<Option<Account>> {
        let email = email.to_lowercase();
        Ok(self
            .working
            .accounts
            .values()
            .find(|a| !a.is_deleted() && a.email.to_lowercase() == email)
            .cloned())
    }

    async fn delete_account(&mut self, id: Uuid) -> StoreResult<bool> {
        match self.working.accounts.get_mut(&id).filter(|a| !a.is_deleted()) {
            Some(account) => {
                let now = after(account.updated);
                account.mark_deleted(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl KeyStore for MemoryTransaction {
    async fn save_key(&mut self, key: &mut Key) -> StoreResult<()> {
        self.faults.check(Fault::SaveKey)?;
        if key.id.is_none() && !self.working.accounts.contains_key(&key.account_id.unwrap_or_default()) {
            return Err(conflict("keys_account_id_fkey"));
        }

        // Key material never changes after insert
        save(&mut self.working.keys, key, |key, stored| {
            key.public_key_pem = stored.public_key_pem.clone();
            key.private_key_pem = stored.private_key_pem.clone();
        })
    }

    async fn list_active_keys_by_account(&mut self, account_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.faults.check(Fault::ListActiveKeys)?;

        let mut keys: Vec<&Key> = self
            .working
            .keys
            .values()
            .filter(|k| k.account_id == Some(account_id) && k.status == "active" && !k.is_deleted())
            .collect();
        keys.sort_by_key(|k| k.created);
        Ok(keys.into_iter().filter_map(|k| k.id).collect())
    }
}

#[async_trait]
impl ScopeStore for MemoryTransaction {
    async fn save_scope(&mut self, scope: &mut Scope) -> StoreResult<()> {
        self.faults.check(Fault::SaveScope)?;
        if scope.id.is_none() && !is_live(&self.working.tenants, scope.tenant_id) {
            return Err(conflict("scopes_tenant_id_fkey"));
        }
        save(&mut self.working.scopes, scope, |_, _| {})
    }

    async fn upsert_directory_scope(&mut self, binding: &DirectoryScope) -> StoreResult<DirectoryScope> {
        self.faults.check(Fault::UpsertDirectoryScope)?;
        if !is_live(&self.working.directories, Some(binding.directory_id)) {
            return Err(conflict("directory_scope_directory_id_fkey"));
        }
        if !is_live(&self.working.scopes, Some(binding.scope_id)) {
            return Err(conflict("directory_scope_scope_id_fkey"));
        }

        let stored = self
            .working
            .directory_scopes
            .entry((binding.directory_id, binding.scope_id))
            .and_modify(|stored| {
                stored.priority = binding.priority;
                stored.is_default_account_store = binding.is_default_account_store;
                stored.is_default_group_store = binding.is_default_group_store;
                stored.is_default_rbac_store = binding.is_default_rbac_store;
                stored.updated = after(stored.updated);
                stored.deleted = None;
            })
            .or_insert_with(|| {
                let now = now();
                DirectoryScope {
                    created: now,
                    updated: now,
                    deleted: None,
                    ..binding.clone()
                }
            });

        Ok(stored.clone())
    }

    async fn list_scopes_by_tenant(&mut self, tenant_id: Uuid) -> StoreResult<Vec<Scope>> {
        let mut scopes: Vec<Scope> = self
            .working
            .scopes
            .values()
            .filter(|s| s.tenant_id == Some(tenant_id) && !s.is_deleted())
            .cloned()
            .collect();
        scopes.sort_by_key(|s| s.created);
        Ok(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    async fn seeded(store: &MemoryStore) -> (Tenant, Directory, Account) {
        let mut tx = store.begin().await.unwrap();

        let mut tenant = Tenant::new("Acme");
        tx.save_tenant(&mut tenant).await.unwrap();

        let mut directory = Directory::default_admin();
        directory.tenant_uid = tenant.id;
        tx.save_directory(&mut directory).await.unwrap();

        let mut account = Account::new("admin@acme.test", "Admin");
        tx.save_account(&mut account).await.unwrap();

        tx.commit().await.unwrap();
        (tenant, directory, account)
    }

    #[tokio::test]
    async fn test_insert_assigns_id_timestamps_and_status() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let mut tenant = Tenant::new("Acme");
        tx.save_tenant(&mut tenant).await.unwrap();

        assert!(tenant.id.is_some());
        assert_eq!(tenant.get_status(), Some(Status::Active));
        assert_eq!(tenant.created, tenant.updated);
    }

    #[tokio::test]
    async fn test_update_keeps_created_and_owner() {
        let store = MemoryStore::new();
        let (tenant, mut directory, _) = seeded(&store).await;
        let created = directory.created;

        let mut tx = store.begin().await.unwrap();
        directory.label = "Renamed".to_string();
        directory.tenant_uid = Some(Uuid::new_v4());
        directory.created = Utc::now() + Duration::days(1);
        tx.save_directory(&mut directory).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(directory.label, "Renamed");
        assert_eq!(directory.tenant_uid, tenant.id);
        assert_eq!(directory.created, created);
        assert!(directory.updated > created);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let mut tenant = Tenant::new("Ghost");
        tenant.id = Some(Uuid::new_v4());
        let err = tx.save_tenant(&mut tenant).await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound { entity: "tenant" }));
    }

    #[tokio::test]
    async fn test_duplicate_email_ignores_case() {
        let store = MemoryStore::new();
        seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        let mut other = Account::new("ADMIN@acme.test", "Other");
        let err = tx.save_account(&mut other).await.unwrap_err();

        assert!(err.is_conflict_on(ACCOUNT_EMAIL_CONSTRAINT));
        assert!(other.id.is_none());
    }

    #[tokio::test]
    async fn test_email_reusable_after_soft_delete() {
        let store = MemoryStore::new();
        let (_, _, account) = seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete_account(account.id.unwrap()).await.unwrap());
        assert!(!tx.delete_account(account.id.unwrap()).await.unwrap());

        assert!(tx.find_account(account.id.unwrap()).await.unwrap().is_none());
        assert!(tx.find_account_by_email("admin@acme.test").await.unwrap().is_none());

        let mut again = Account::new("admin@acme.test", "Admin again");
        tx.save_account(&mut again).await.unwrap();
        assert_ne!(again.id, account.id);
    }

    #[tokio::test]
    async fn test_association_rejects_soft_deleted_account() {
        let store = MemoryStore::new();
        let (_, directory, account) = seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        tx.delete_account(account.id.unwrap()).await.unwrap();

        let err = tx
            .upsert_directory_account(directory.id.unwrap(), account.id.unwrap())
            .await
            .unwrap_err();
        assert!(err.is_conflict_on("directory_account_account_id_fkey"));
        assert!(tx.working.directory_accounts.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let mut tenant = Tenant::new("Acme");
        tx.save_tenant(&mut tenant).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.snapshot().await.tenants.is_empty());
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            let mut tenant = Tenant::new("Acme");
            tx.save_tenant(&mut tenant).await.unwrap();
        }

        assert!(store.snapshot().await.tenants.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let mut directory = Directory::default_admin();
        directory.tenant_uid = Some(Uuid::new_v4());
        let err = tx.save_directory(&mut directory).await.unwrap_err();
        assert!(err.is_conflict_on("directories_tenant_uid_fkey"));

        let mut key = Key {
            account_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let err = tx.save_key(&mut key).await.unwrap_err();
        assert!(err.is_conflict_on("keys_account_id_fkey"));
    }

    #[tokio::test]
    async fn test_directory_account_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let (_, directory, account) = seeded(&store).await;
        let (directory_id, account_id) = (directory.id.unwrap(), account.id.unwrap());

        let mut tx = store.begin().await.unwrap();
        let first = tx.upsert_directory_account(directory_id, account_id).await.unwrap();
        let second = tx.upsert_directory_account(directory_id, account_id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.created, second.created);
        assert!(second.updated > first.updated);
        assert_eq!(store.snapshot().await.directory_accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_directory_scope_upsert_updates_flags() {
        let store = MemoryStore::new();
        let (tenant, directory, _) = seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        let mut scope = Scope::default_admin();
        scope.tenant_id = tenant.id;
        tx.save_scope(&mut scope).await.unwrap();

        let mut binding = DirectoryScope::admin(directory.id.unwrap(), scope.id.unwrap(), Utc::now());
        binding.is_default_group_store = false;
        tx.upsert_directory_scope(&binding).await.unwrap();

        let binding = DirectoryScope::admin(directory.id.unwrap(), scope.id.unwrap(), Utc::now());
        let stored = tx.upsert_directory_scope(&binding).await.unwrap();
        tx.commit().await.unwrap();

        assert!(stored.is_default_group_store);
        assert_eq!(store.snapshot().await.directory_scopes.len(), 1);
    }

    #[tokio::test]
    async fn test_key_material_is_immutable() {
        let store = MemoryStore::new();
        let (_, _, account) = seeded(&store).await;

        let mut tx = store.begin().await.unwrap();
        let mut key = Key {
            account_id: account.id,
            public_key_pem: "public".to_string(),
            private_key_pem: "private".to_string(),
            ..Default::default()
        };
        tx.save_key(&mut key).await.unwrap();
        assert_eq!(key.status, "active");
        assert_eq!(tx.list_active_keys_by_account(account.id.unwrap()).await.unwrap(), vec![key.id.unwrap()]);

        key.public_key_pem = "tampered".to_string();
        key.set_status(Status::Inactive);
        tx.save_key(&mut key).await.unwrap();

        assert_eq!(key.public_key_pem, "public");
        assert!(tx.list_active_keys_by_account(account.id.unwrap()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::new();
        store.fail_on(Fault::SaveTenant);

        let mut tx = store.begin().await.unwrap();
        let err = tx.save_tenant(&mut Tenant::new("Acme")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        drop(tx);

        store.clear_faults();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.save_tenant(&mut Tenant::new("Acme")).await.is_ok());
    }
}
