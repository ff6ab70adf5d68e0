/// Error types shared by the identity core
///
/// Two layers of errors exist:
///
/// - [`StoreError`]: failures reported by a persistence gateway
/// - [`IdentityError`]: every error kind the core surfaces to its callers,
///   including admission failures, credential failures and wrapped store errors
///
/// # Example
///
/// ```
/// use tenantry_shared::error::{IdentityError, StoreError};
///
/// let err: IdentityError = StoreError::NotFound { entity: "account" }.into();
/// assert!(err.is_store());
/// assert_eq!(IdentityError::IdNotNull.to_string(), "id provided and not expected");
/// ```

/// Name of the unique constraint guarding account emails.
///
/// Storage implementations report it in [`StoreError::Conflict`] so callers
/// can tell a duplicate email apart from any other conflict.
pub const ACCOUNT_EMAIL_CONSTRAINT: &str = "accounts_email_key";

/// Errors reported by a persistence gateway
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique or foreign key constraint rejected the write
    #[error("constraint violation: {constraint}")]
    Conflict {
        /// Name of the violated constraint
        constraint: String,
    },

    /// The record to update does not exist or is soft-deleted
    #[error("{entity} not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
    },

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// The store refused the operation for a reason unrelated to the data
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true if this is a conflict on the given constraint
    pub fn is_conflict_on(&self, name: &str) -> bool {
        matches!(self, StoreError::Conflict { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() || db_err.is_foreign_key_violation() => {
                StoreError::Conflict {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            other => StoreError::Database(other),
        }
    }
}

/// Result alias for gateway operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Every error kind surfaced by the identity core
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// An id was supplied on a create path
    #[error("id provided and not expected")]
    IdNotNull,

    /// An administrator account is required and was not supplied
    #[error("account not provided")]
    AccountNotProvided,

    /// A tenant id is required and was not supplied
    #[error("tenant not provided")]
    TenantNotProvided,

    /// Account name is empty or too long
    #[error("invalid name")]
    InvalidName,

    /// Account email is empty, too long or malformed
    #[error("invalid email address")]
    InvalidEmail,

    /// Password length is outside the accepted range
    #[error("invalid password")]
    InvalidPassword,

    /// The hashing primitive failed
    #[error("failed to hash password: {0}")]
    HashingFailure(String),

    /// The supplied password does not match the stored hash
    #[error("credentials do not match")]
    CredentialMismatch,

    /// Another account already uses this email
    #[error("email exists in db")]
    DupEmail,

    /// RSA key generation or encoding failed
    #[error("failed to issue key: {0}")]
    KeyIssuance(String),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IdentityError {
    /// Returns true for errors raised by the persistence gateway
    pub fn is_store(&self) -> bool {
        matches!(self, IdentityError::Store(_))
    }
}

/// Result alias for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
