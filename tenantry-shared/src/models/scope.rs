/// Scope model and database operations
///
/// A scope is an authorization boundary under a tenant, comparable to an
/// application. Directories are bound to scopes through
/// [`DirectoryScope`](super::directory_scope::DirectoryScope).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE scopes (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id),
///     label VARCHAR(256) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status VARCHAR(32) NOT NULL DEFAULT 'active',
///     created TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted TIMESTAMPTZ
/// );
/// ```

use crate::error::IdentityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Label given to the scope created during tenant provisioning
pub const DEFAULT_ADMIN_SCOPE_LABEL: &str = "Default Admin Scope";

/// Description given to the scope created during tenant provisioning
pub const DEFAULT_ADMIN_SCOPE_DESCRIPTION: &str = "Default scope to administer this tenant";

/// Scope model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Scope {
    /// Unique scope ID, assigned on first insert
    #[serde(default)]
    pub id: Option<Uuid>,

    /// Owning tenant
    #[serde(default)]
    pub tenant_id: Option<Uuid>,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: String,

    /// When the scope was created
    #[serde(default)]
    pub created: DateTime<Utc>,

    /// When the scope was last updated
    #[serde(default)]
    pub updated: DateTime<Utc>,

    /// When the scope was soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
}

super::impl_entity!(Scope, "scope", [tenant_id]);

impl Scope {
    /// Builds the default admin scope for a tenant
    pub fn default_admin() -> Self {
        let mut scope = Self::default();
        scope.fill_admin_defaults();
        scope
    }

    /// Fills empty label, description and status with the admin defaults
    pub fn fill_admin_defaults(&mut self) {
        if self.label.is_empty() {
            self.label = DEFAULT_ADMIN_SCOPE_LABEL.to_string();
        }
        if self.description.is_empty() {
            self.description = DEFAULT_ADMIN_SCOPE_DESCRIPTION.to_string();
        }
        if self.status.is_empty() {
            self.status = super::Status::Active.as_str().to_string();
        }
    }

    /// Checks that a scope created on its own names its tenant
    pub fn validate_owner(&self) -> Result<(), IdentityError> {
        match self.tenant_id {
            Some(id) if !id.is_nil() => Ok(()),
            _ => Err(IdentityError::TenantNotProvided),
        }
    }

    /// Inserts a new scope
    pub async fn insert<'e, E>(executor: E, scope: &Scope) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let scope = sqlx::query_as::<_, Scope>(
            r#"
            INSERT INTO scopes (tenant_id, label, description, status)
            VALUES ($1, $2, $3, COALESCE(NULLIF($4, ''), 'active'))
            RETURNING id, tenant_id, label, description, status, created, updated, deleted
            "#,
        )
        .bind(scope.tenant_id)
        .bind(&scope.label)
        .bind(&scope.description)
        .bind(&scope.status)
        .fetch_one(executor)
        .await?;

        Ok(scope)
    }

    /// Updates label, description and status of a live scope
    pub async fn update<'e, E>(executor: E, id: Uuid, scope: &Scope) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let scope = sqlx::query_as::<_, Scope>(
            r#"
            UPDATE scopes
            SET label = $2,
                description = $3,
                status = COALESCE(NULLIF($4, ''), status),
                updated = NOW()
            WHERE id = $1 AND deleted IS NULL
            RETURNING id, tenant_id, label, description, status, created, updated, deleted
            "#,
        )
        .bind(id)
        .bind(&scope.label)
        .bind(&scope.description)
        .bind(&scope.status)
        .fetch_optional(executor)
        .await?;

        Ok(scope)
    }

    /// Finds a live scope by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let scope = sqlx::query_as::<_, Scope>(
            r#"
            SELECT id, tenant_id, label, description, status, created, updated, deleted
            FROM scopes
            WHERE id = $1 AND deleted IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(scope)
    }

    /// Lists the live scopes owned by a tenant, oldest first
    pub async fn list_by_tenant<'e, E>(executor: E, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let scopes = sqlx::query_as::<_, Scope>(
            r#"
            SELECT id, tenant_id, label, description, status, created, updated, deleted
            FROM scopes
            WHERE tenant_id = $1 AND deleted IS NULL
            ORDER BY created ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_admin_scope() {
        let scope = Scope::default_admin();
        assert_eq!(scope.label, DEFAULT_ADMIN_SCOPE_LABEL);
        assert_eq!(scope.description, DEFAULT_ADMIN_SCOPE_DESCRIPTION);
        assert_eq!(scope.status, "active");
    }

    #[test]
    fn test_validate_owner() {
        let mut scope = Scope::default();
        assert!(matches!(scope.validate_owner(), Err(IdentityError::TenantNotProvided)));

        scope.tenant_id = Some(Uuid::nil());
        assert!(matches!(scope.validate_owner(), Err(IdentityError::TenantNotProvided)));

        scope.tenant_id = Some(Uuid::new_v4());
        assert!(scope.validate_owner().is_ok());
    }
}
