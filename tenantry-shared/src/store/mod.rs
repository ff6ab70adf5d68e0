/// Persistence gateway
///
/// Storage is split into one capability trait per entity family. A
/// [`Gateway`] is anything that implements all of them; a [`Store`] opens
/// [`Transaction`]s, which are gateways whose writes become visible together
/// on [`Transaction::commit`] and are discarded on [`Transaction::rollback`]
/// (or when the transaction is dropped).
///
/// # Save semantics
///
/// `save_*` inspects the entity id:
///
/// - `None`: insert. The id, both timestamps and (when empty) the status
///   are written back into the entity.
/// - `Some(id)`: update the mutable fields of the live row with that id and
///   refresh `updated`. The id, `created` and the owning foreign key never
///   change; the entity is overwritten with the stored row. A missing or
///   soft-deleted row yields [`StoreError::NotFound`].
///
/// Association upserts are idempotent on their natural key.
///
/// # Implementations
///
/// - [`postgres::PgStore`]: sqlx over a PostgreSQL pool
/// - [`memory::MemoryStore`]: in-process maps with snapshot transactions
///
/// [`StoreError::NotFound`]: crate::error::StoreError::NotFound

use crate::error::StoreResult;
use crate::models::{
    account::Account, directory::Directory, directory_account::DirectoryAccount,
    directory_scope::DirectoryScope, key::Key, scope::Scope, tenant::Tenant,
};
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Tenant persistence
#[async_trait]
pub trait TenantStore: Send {
    /// Inserts or updates a tenant
    async fn save_tenant(&mut self, tenant: &mut Tenant) -> StoreResult<()>;

    /// Finds a live tenant by id
    async fn find_tenant(&mut self, id: Uuid) -> StoreResult<Option<Tenant>>;
}

/// Directory persistence and directory membership
#[async_trait]
pub trait DirectoryStore: Send {
    /// Inserts or updates a directory
    async fn save_directory(&mut self, directory: &mut Directory) -> StoreResult<()>;

    /// Adds an account to a directory, refreshing the row if already present
    async fn upsert_directory_account(
        &mut self,
        directory_id: Uuid,
        account_id: Uuid,
    ) -> StoreResult<DirectoryAccount>;

    /// Lists the live memberships of a directory
    async fn list_directory_accounts(&mut self, directory_id: Uuid) -> StoreResult<Vec<DirectoryAccount>>;
}

/// Account persistence
#[async_trait]
pub trait AccountStore: Send {
    /// Inserts or updates an account
    ///
    /// A second live account with the same email (ignoring case) is rejected
    /// with a conflict on [`ACCOUNT_EMAIL_CONSTRAINT`](crate::error::ACCOUNT_EMAIL_CONSTRAINT).
    async fn save_account(&mut self, account: &mut Account) -> StoreResult<()>;

    /// Finds a live account by id
    async fn find_account(&mut self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Finds a live account by email, ignoring case
    async fn find_account_by_email(&mut self, email: &str) -> StoreResult<Option<Account>>;

    /// Soft-deletes an account; false if no live account has this id
    async fn delete_account(&mut self, id: Uuid) -> StoreResult<bool>;
}

/// Key persistence
#[async_trait]
pub trait KeyStore: Send {
    /// Inserts or updates a key
    async fn save_key(&mut self, key: &mut Key) -> StoreResult<()>;

    /// Lists the ids of an account's live, active keys, oldest first
    async fn list_active_keys_by_account(&mut self, account_id: Uuid) -> StoreResult<Vec<Uuid>>;
}

/// Scope persistence and directory bindings
#[async_trait]
pub trait ScopeStore: Send {
    /// Inserts or updates a scope
    async fn save_scope(&mut self, scope: &mut Scope) -> StoreResult<()>;

    /// Binds a directory to a scope, updating priority and flags if already bound
    async fn upsert_directory_scope(&mut self, binding: &DirectoryScope) -> StoreResult<DirectoryScope>;

    /// Lists the live scopes of a tenant, oldest first
    async fn list_scopes_by_tenant(&mut self, tenant_id: Uuid) -> StoreResult<Vec<Scope>>;
}

/// Full set of storage capabilities
pub trait Gateway: TenantStore + DirectoryStore + AccountStore + KeyStore + ScopeStore {}

impl<T> Gateway for T where T: TenantStore + DirectoryStore + AccountStore + KeyStore + ScopeStore {}

/// A unit of work over a [`Gateway`]
#[async_trait]
pub trait Transaction: Gateway {
    /// Makes every write of the transaction visible
    async fn commit(self) -> StoreResult<()>;

    /// Discards every write of the transaction
    async fn rollback(self) -> StoreResult<()>;
}

/// Source of transactions
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// Transaction type produced by [`Store::begin`]
    type Tx: Transaction + 'static;

    /// Opens a transaction
    async fn begin(&self) -> StoreResult<Self::Tx>;
}
