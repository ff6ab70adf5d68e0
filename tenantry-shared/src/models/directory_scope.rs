/// Directory ↔ scope association
///
/// Binds a directory to a scope with a priority and three flags marking the
/// scope as the directory's default account, group and RBAC store.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE directory_scope (
///     directory_id UUID NOT NULL REFERENCES directories(id),
///     scope_id UUID NOT NULL REFERENCES scopes(id),
///     priority BIGINT NOT NULL DEFAULT 0,
///     is_default_account_store BOOLEAN NOT NULL DEFAULT FALSE,
///     is_default_group_store BOOLEAN NOT NULL DEFAULT FALSE,
///     is_default_rbac_store BOOLEAN NOT NULL DEFAULT FALSE,
///     created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted TIMESTAMPTZ,
///     PRIMARY KEY (directory_id, scope_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Binding of a scope to a directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectoryScope {
    /// Directory ID
    pub directory_id: Uuid,

    /// Scope ID
    pub scope_id: Uuid,

    /// Lookup priority, lower values win
    pub priority: i64,

    /// Scope is the directory's default account store
    pub is_default_account_store: bool,

    /// Scope is the directory's default group store
    pub is_default_group_store: bool,

    /// Scope is the directory's default RBAC store
    pub is_default_rbac_store: bool,

    /// When the binding was first created
    pub created: DateTime<Utc>,

    /// When the binding was last upserted
    pub updated: DateTime<Utc>,

    /// When the binding was soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
}

impl DirectoryScope {
    /// Builds the binding used for a tenant's admin directory and scope
    ///
    /// The admin scope is by construction the only store of the admin
    /// directory: priority 1 and every default-store flag set.
    pub fn admin(directory_id: Uuid, scope_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            directory_id,
            scope_id,
            priority: 1,
            is_default_account_store: true,
            is_default_group_store: true,
            is_default_rbac_store: true,
            created: now,
            updated: now,
            deleted: None,
        }
    }

    /// Inserts the binding or updates priority and flags of the existing row
    pub async fn upsert<'e, E>(executor: E, binding: &DirectoryScope) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let binding = sqlx::query_as::<_, DirectoryScope>(
            r#"
            INSERT INTO directory_scope (
                directory_id, scope_id, priority,
                is_default_account_store, is_default_group_store, is_default_rbac_store,
                created, updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, clock_timestamp(), clock_timestamp())
            ON CONFLICT (directory_id, scope_id)
            DO UPDATE SET priority = EXCLUDED.priority,
                          is_default_account_store = EXCLUDED.is_default_account_store,
                          is_default_group_store = EXCLUDED.is_default_group_store,
                          is_default_rbac_store = EXCLUDED.is_default_rbac_store,
                          updated = clock_timestamp(),
                          deleted = NULL
            RETURNING directory_id, scope_id, priority,
                      is_default_account_store, is_default_group_store, is_default_rbac_store,
                      created, updated, deleted
            "#,
        )
        .bind(binding.directory_id)
        .bind(binding.scope_id)
        .bind(binding.priority)
        .bind(binding.is_default_account_store)
        .bind(binding.is_default_group_store)
        .bind(binding.is_default_rbac_store)
        .fetch_one(executor)
        .await?;

        Ok(binding)
    }

    /// Lists the live bindings of a directory by priority
    pub async fn list_by_directory<'e, E>(executor: E, directory_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let bindings = sqlx::query_as::<_, DirectoryScope>(
            r#"
            SELECT directory_id, scope_id, priority,
                   is_default_account_store, is_default_group_store, is_default_rbac_store,
                   created, updated, deleted
            FROM directory_scope
            WHERE directory_id = $1 AND deleted IS NULL
            ORDER BY priority ASC
            "#,
        )
        .bind(directory_id)
        .fetch_all(executor)
        .await?;

        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_binding_flags() {
        let binding = DirectoryScope::admin(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        assert_eq!(binding.priority, 1);
        assert!(binding.is_default_account_store);
        assert!(binding.is_default_group_store);
        assert!(binding.is_default_rbac_store);
        assert!(binding.deleted.is_none());
    }
}
