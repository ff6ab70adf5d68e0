/// Directory ↔ account association
///
/// Places an account in a directory. The pair is the natural key; adding the
/// same pair again is a no-op that refreshes `updated` (and revives a
/// soft-deleted association).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE directory_account (
///     directory_id UUID NOT NULL REFERENCES directories(id),
///     account_id UUID NOT NULL REFERENCES accounts(id),
///     created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted TIMESTAMPTZ,
///     PRIMARY KEY (directory_id, account_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Membership of an account in a directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectoryAccount {
    /// Directory ID
    pub directory_id: Uuid,

    /// Account ID
    pub account_id: Uuid,

    /// When the association was first created
    pub created: DateTime<Utc>,

    /// When the association was last upserted
    pub updated: DateTime<Utc>,

    /// When the association was soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
}

impl DirectoryAccount {
    /// Builds an association stamped with `now`
    pub fn new(directory_id: Uuid, account_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            directory_id,
            account_id,
            created: now,
            updated: now,
            deleted: None,
        }
    }

    /// Inserts the association or refreshes the existing row
    ///
    /// # Returns
    ///
    /// The stored row; `created` keeps its original value on conflict
    pub async fn upsert<'e, E>(executor: E, directory_id: Uuid, account_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let link = sqlx::query_as::<_, DirectoryAccount>(
            r#"
            INSERT INTO directory_account (directory_id, account_id, created, updated)
            VALUES ($1, $2, clock_timestamp(), clock_timestamp())
            ON CONFLICT (directory_id, account_id)
            DO UPDATE SET updated = clock_timestamp(), deleted = NULL
            RETURNING directory_id, account_id, created, updated, deleted
            "#,
        )
        .bind(directory_id)
        .bind(account_id)
        .fetch_one(executor)
        .await?;

        Ok(link)
    }

    /// Lists the live associations of a directory
    pub async fn list_by_directory<'e, E>(executor: E, directory_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let links = sqlx::query_as::<_, DirectoryAccount>(
            r#"
            SELECT directory_id, account_id, created, updated, deleted
            FROM directory_account
            WHERE directory_id = $1 AND deleted IS NULL
            ORDER BY created ASC
            "#,
        )
        .bind(directory_id)
        .fetch_all(executor)
        .await?;

        Ok(links)
    }
}
