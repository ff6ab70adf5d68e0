/// Tenant model and database operations
///
/// A tenant is the top-level isolation boundary (an organization or
/// customer). Directories and scopes hang off a tenant.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tenants (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     label VARCHAR(256) NOT NULL,
///     status VARCHAR(32) NOT NULL DEFAULT 'active',
///     created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tenantry_shared::models::tenant::Tenant;
/// use tenantry_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let tenant = Tenant::insert(&pool, &Tenant::new("Acme Corp")).await?;
/// println!("Created tenant: {:?}", tenant.id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Tenant model representing an organization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    /// Unique tenant ID, assigned on first insert
    #[serde(default)]
    pub id: Option<Uuid>,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Lifecycle status (see [`Status`](super::Status))
    #[serde(default)]
    pub status: String,

    /// When the tenant was created
    #[serde(default)]
    pub created: DateTime<Utc>,

    /// When the tenant was last updated
    #[serde(default)]
    pub updated: DateTime<Utc>,

    /// When the tenant was soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
}

super::impl_entity!(Tenant, "tenant");

impl Tenant {
    /// Builds an unpersisted tenant with the given label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Inserts a new tenant
    ///
    /// The id and timestamps are generated by the database. An empty status
    /// is stored as `active`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails
    pub async fn insert<'e, E>(executor: E, tenant: &Tenant) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (label, status)
            VALUES ($1, COALESCE(NULLIF($2, ''), 'active'))
            RETURNING id, label, status, created, updated, deleted
            "#,
        )
        .bind(&tenant.label)
        .bind(&tenant.status)
        .fetch_one(executor)
        .await?;

        Ok(tenant)
    }

    /// Updates the mutable fields of an existing tenant
    ///
    /// # Returns
    ///
    /// The stored row, or None if no live tenant has this id
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        tenant: &Tenant,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            UPDATE tenants
            SET label = $2,
                status = COALESCE(NULLIF($3, ''), status),
                updated = NOW()
            WHERE id = $1 AND deleted IS NULL
            RETURNING id, label, status, created, updated, deleted
            "#,
        )
        .bind(id)
        .bind(&tenant.label)
        .bind(&tenant.status)
        .fetch_optional(executor)
        .await?;

        Ok(tenant)
    }

    /// Finds a live tenant by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, label, status, created, updated, deleted
            FROM tenants
            WHERE id = $1 AND deleted IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(tenant)
    }

    /// Soft-deletes a tenant
    ///
    /// # Returns
    ///
    /// True if a live tenant was marked deleted
    pub async fn soft_delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE tenants SET deleted = NOW(), updated = NOW() WHERE id = $1 AND deleted IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
