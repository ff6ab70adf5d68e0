/// Account model, field validation and database operations
///
/// Accounts are login identities. The email address is unique among live
/// accounts; uniqueness is enforced by storage, not by [`Account::validate_fields`].
/// Passwords are stored as Argon2id hashes, never in plaintext (see
/// [`crate::auth::password`]).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(256) NOT NULL,
///     name VARCHAR(256) NOT NULL,
///     password_hash TEXT,
///     status VARCHAR(32) NOT NULL DEFAULT 'active',
///     created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted TIMESTAMPTZ
/// );
/// CREATE UNIQUE INDEX accounts_email_key ON accounts (lower(email)) WHERE deleted IS NULL;
/// ```
///
/// # Example
///
/// ```
/// use tenantry_shared::models::account::Account;
///
/// let account = Account::new("admin@example.com", "Admin");
/// assert!(account.validate_fields().is_ok());
///
/// let nameless = Account::new("admin@example.com", "");
/// assert!(nameless.validate_fields().is_err());
/// ```

use crate::error::IdentityError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::sync::LazyLock;
use uuid::Uuid;

/// Maximum length in bytes of an account name or email
pub const MAX_FIELD_LENGTH: usize = 256;

/// Address shape accepted for account emails: `local@domain.tld`
///
/// Exactly one `@`, a non-empty local part, and after the `@` a non-empty
/// label, a dot, and a non-empty remainder.
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@.]+\.[^@]+$").expect("EMAIL_REGEX is a valid regex pattern"));

/// Account model representing a login identity
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID, assigned on first insert
    #[serde(default)]
    pub id: Option<Uuid>,

    /// Email address, unique among live accounts
    #[serde(default)]
    pub email: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Argon2id password hash
    ///
    /// Never serialized. `None` means the account cannot authenticate by
    /// password.
    #[serde(skip)]
    pub password_hash: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: String,

    /// When the account was created
    #[serde(default)]
    pub created: DateTime<Utc>,

    /// When the account was last updated
    #[serde(default)]
    pub updated: DateTime<Utc>,

    /// When the account was soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
}

super::impl_entity!(Account, "account");

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("status", &self.status)
            .field("created", &self.created)
            .field("updated", &self.updated)
            .field("deleted", &self.deleted)
            .finish()
    }
}

impl Account {
    /// Builds an unpersisted account without a password
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Checks the account fields before persistence
    ///
    /// Name is checked before email; the first failing check wins.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if the name is empty or longer than 256 bytes
    /// - `InvalidEmail` if the email is empty, longer than 256 bytes or not
    ///   shaped like `local@domain.tld`
    pub fn validate_fields(&self) -> Result<(), IdentityError> {
        if self.name.is_empty() || self.name.len() > MAX_FIELD_LENGTH {
            return Err(IdentityError::InvalidName);
        }
        if self.email.is_empty() || self.email.len() > MAX_FIELD_LENGTH || !EMAIL_REGEX.is_match(&self.email) {
            return Err(IdentityError::InvalidEmail);
        }
        Ok(())
    }

    /// True if the account holds a password hash
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Inserts a new account
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A live account already uses this email (unique violation on
    ///   `accounts_email_key`)
    /// - Database connection fails
    pub async fn insert<'e, E>(executor: E, account: &Account) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (email, name, password_hash, status)
            VALUES ($1, $2, $3, COALESCE(NULLIF($4, ''), 'active'))
            RETURNING id, email, name, password_hash, status, created, updated, deleted
            "#,
        )
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.password_hash)
        .bind(&account.status)
        .fetch_one(executor)
        .await?;

        Ok(account)
    }

    /// Updates email, name, password hash and status of a live account
    ///
    /// # Returns
    ///
    /// The stored row, or None if no live account has this id
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        account: &Account,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET email = $2,
                name = $3,
                password_hash = $4,
                status = COALESCE(NULLIF($5, ''), status),
                updated = NOW()
            WHERE id = $1 AND deleted IS NULL
            RETURNING id, email, name, password_hash, status, created, updated, deleted
            "#,
        )
        .bind(id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.password_hash)
        .bind(&account.status)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    /// Finds a live account by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, name, password_hash, status, created, updated, deleted
            FROM accounts
            WHERE id = $1 AND deleted IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    /// Finds a live account by email (case-insensitive)
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, name, password_hash, status, created, updated, deleted
            FROM accounts
            WHERE lower(email) = lower($1) AND deleted IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    /// Soft-deletes an account so it can no longer be used
    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE accounts SET deleted = NOW(), updated = NOW() WHERE id = $1 AND deleted IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
