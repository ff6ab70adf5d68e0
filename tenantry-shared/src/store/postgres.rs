/// PostgreSQL gateway
///
/// [`PgStore`] wraps a connection pool. Every gateway call runs inside a
/// [`PgTransaction`] so the provisioning workflow commits or rolls back as a
/// whole. Dropping an uncommitted transaction rolls it back.
///
/// # Example
///
/// ```no_run
/// use tenantry_shared::models::tenant::Tenant;
/// use tenantry_shared::store::{PgStore, Store, TenantStore, Transaction};
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PgStore::new(pool);
/// let mut tx = store.begin().await?;
///
/// let mut tenant = Tenant::new("Acme Corp");
/// tx.save_tenant(&mut tenant).await?;
/// tx.commit().await?;
///
/// assert!(tenant.id.is_some());
/// # Ok(())
/// # }
/// ```

use super::{AccountStore, DirectoryStore, KeyStore, ScopeStore, Store, TenantStore, Transaction};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    account::Account, directory::Directory, directory_account::DirectoryAccount,
    directory_scope::DirectoryScope, key::Key, scope::Scope, tenant::Tenant, Entity,
};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Postgres};
use tracing::debug;
use uuid::Uuid;

/// Gateway over a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> StoreResult<PgTransaction> {
        let tx = self.pool.begin().await?;
        debug!("Opened database transaction");
        Ok(PgTransaction { tx })
    }
}

/// An open PostgreSQL transaction
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

/// Maps a missing row on update to `NotFound`
fn found<T: Entity>(row: Option<T>) -> StoreResult<T> {
    row.ok_or(StoreError::NotFound { entity: T::KIND })
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        debug!("Committed database transaction");
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        debug!("Rolled back database transaction");
        Ok(())
    }
}

#[async_trait]
impl TenantStore for PgTransaction {
    async fn save_tenant(&mut self, tenant: &mut Tenant) -> StoreResult<()> {
        let stored = match tenant.id {
            None => Tenant::insert(&mut *self.tx, tenant).await?,
            Some(id) => found(Tenant::update(&mut *self.tx, id, tenant).await?)?,
        };
        *tenant = stored;
        Ok(())
    }

    async fn find_tenant(&mut self, id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(Tenant::find_by_id(&mut *self.tx, id).await?)
    }
}

#[async_trait]
impl DirectoryStore for PgTransaction {
    async fn save_directory(&mut self, directory: &mut Directory) -> StoreResult<()> {
        let stored = match directory.id {
            None => Directory::insert(&mut *self.tx, directory).await?,
            Some(id) => found(Directory::update(&mut *self.tx, id, directory).await?)?,
        };
        *directory = stored;
        Ok(())
    }

    async fn upsert_directory_account(
        &mut self,
        directory_id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<DirectoryAccount> {
        Ok(DirectoryAccount::upsert(&mut *self.tx, directory_id, account_id).await?)
    }

    async fn list_directory_accounts(&mut self, directory_id: Uuid) -> StoreResult<Vec<DirectoryAccount>> {
        Ok(DirectoryAccount::list_by_directory(&mut *self.tx, directory_id).await?)
    }
}

#[async_trait]
impl AccountStore for PgTransaction {
    async fn save_account(&mut self, account: &mut Account) -> StoreResult<()> {
        let stored = match account.id {
            None => Account::insert(&mut *self.tx, account).await?,
            Some(id) => found(Account::update(&mut *self.tx, id, account).await?)?,
        };
        *account = stored;
        Ok(())
    }

    async fn find_account(&mut self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(Account::find_by_id(&mut *self.tx, id).await?)
    }

    async fn find_account_by_email(&mut self, email: &str) -> StoreResult<Option<Account>> {
        Ok(Account::find_by_email(&mut *self.tx, email).await?)
    }

    async fn delete_account(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(Account::soft_delete(&mut *self.tx, id).await?)
    }
}

#[async_trait]
impl KeyStore for PgTransaction {
    async fn save_key(&mut self, key: &mut Key) -> StoreResult<()> {
        let stored = match key.id {
            None => Key::insert(&mut *self.tx, key).await?,
            Some(id) => found(Key::update(&mut *self.tx, id, key).await?)?,
        };
        *key = stored;
        Ok(())
    }

    /// Runs under a savepoint so a failed read leaves the transaction usable
    async fn list_active_keys_by_account(&mut self, account_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut savepoint = self.tx.begin().await?;
        match Key::list_active_ids_by_account(&mut *savepoint, account_id).await {
            Ok(ids) => {
                savepoint.commit().await?;
                Ok(ids)
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ScopeStore for PgTransaction {
    async fn save_scope(&mut self, scope: &mut Scope) -> StoreResult<()> {
        let stored = match scope.id {
            None => Scope::insert(&mut *self.tx, scope).await?,
            Some(id) => found(Scope::update(&mut *self.tx, id, scope).await?)?,
        };
        *scope = stored;
        Ok(())
    }

    async fn upsert_directory_scope(&mut self, binding: &DirectoryScope) -> StoreResult<DirectoryScope> {
        Ok(DirectoryScope::upsert(&mut *self.tx, binding).await?)
    }

    async fn list_scopes_by_tenant(&mut self, tenant_id: Uuid) -> StoreResult<Vec<Scope>> {
        Ok(Scope::list_by_tenant(&mut *self.tx, tenant_id).await?)
    }
}
