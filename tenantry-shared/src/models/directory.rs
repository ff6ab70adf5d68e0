/// Directory model and database operations
///
/// A directory groups accounts under a tenant and acts as an authentication
/// store boundary. Every provisioned tenant owns one default admin directory.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE directories (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_uid UUID NOT NULL REFERENCES tenants(id),
///     label VARCHAR(256) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status VARCHAR(32) NOT NULL DEFAULT 'active',
///     created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Label given to the directory created during tenant provisioning
pub const DEFAULT_ADMIN_DIRECTORY_LABEL: &str = "Default Admin Directory";

/// Description given to the directory created during tenant provisioning
pub const DEFAULT_ADMIN_DIRECTORY_DESCRIPTION: &str =
    "Default directory to hold administrative accounts for this tenant";

/// Directory model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Directory {
    /// Unique directory ID, assigned on first insert
    #[serde(default)]
    pub id: Option<Uuid>,

    /// Owning tenant
    #[serde(default)]
    pub tenant_uid: Option<Uuid>,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: String,

    /// When the directory was created
    #[serde(default)]
    pub created: DateTime<Utc>,

    /// When the directory was last updated
    #[serde(default)]
    pub updated: DateTime<Utc>,

    /// When the directory was soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
}

super::impl_entity!(Directory, "directory", [tenant_uid]);

impl Directory {
    /// Builds the default admin directory for a tenant
    pub fn default_admin() -> Self {
        let mut directory = Self::default();
        directory.fill_admin_defaults();
        directory
    }

    /// Fills empty label, description and status with the admin defaults
    ///
    /// Fields the caller already set are left untouched.
    pub fn fill_admin_defaults(&mut self) {
        if self.label.is_empty() {
            self.label = DEFAULT_ADMIN_DIRECTORY_LABEL.to_string();
        }
        if self.description.is_empty() {
            self.description = DEFAULT_ADMIN_DIRECTORY_DESCRIPTION.to_string();
        }
        if self.status.is_empty() {
            self.status = super::Status::Active.as_str().to_string();
        }
    }

    /// Inserts a new directory
    ///
    /// # Errors
    ///
    /// Returns an error if the owning tenant does not exist (foreign key
    /// violation) or the database connection fails
    pub async fn insert<'e, E>(executor: E, directory: &Directory) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let directory = sqlx::query_as::<_, Directory>(
            r#"
            INSERT INTO directories (tenant_uid, label, description, status)
            VALUES ($1, $2, $3, COALESCE(NULLIF($4, ''), 'active'))
            RETURNING id, tenant_uid, label, description, status, created, updated, deleted
            "#,
        )
        .bind(directory.tenant_uid)
        .bind(&directory.label)
        .bind(&directory.description)
        .bind(&directory.status)
        .fetch_one(executor)
        .await?;

        Ok(directory)
    }

    /// Updates label, description and status of a live directory
    ///
    /// The owning tenant never changes after insert.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        directory: &Directory,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let directory = sqlx::query_as::<_, Directory>(
            r#"
            UPDATE directories
            SET label = $2,
                description = $3,
                status = COALESCE(NULLIF($4, ''), status),
                updated = NOW()
            WHERE id = $1 AND deleted IS NULL
            RETURNING id, tenant_uid, label, description, status, created, updated, deleted
            "#,
        )
        .bind(id)
        .bind(&directory.label)
        .bind(&directory.description)
        .bind(&directory.status)
        .fetch_optional(executor)
        .await?;

        Ok(directory)
    }

    /// Lists the live directories of a tenant, oldest first
    pub async fn list_by_tenant<'e, E>(executor: E, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let directories = sqlx::query_as::<_, Directory>(
            r#"
            SELECT id, tenant_uid, label, description, status, created, updated, deleted
            FROM directories
            WHERE tenant_uid = $1 AND deleted IS NULL
            ORDER BY created ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(directories)
    }
}
