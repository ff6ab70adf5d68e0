/// Identity data model
///
/// This module contains the identity entities, their field-level validation
/// and their PostgreSQL queries.
///
/// # Models
///
/// - `tenant`: Top-level isolation boundary
/// - `directory`: Groups accounts under a tenant
/// - `account`: Login identity with email, name and password hash
/// - `key`: RSA key pair bound to an account
/// - `scope`: Authorization boundary under a tenant
/// - `directory_account`: Directory ↔ account association
/// - `directory_scope`: Directory ↔ scope association with store flags
///
/// # Lifecycle
///
/// Entities are created once, mutated in place and never physically deleted.
/// Deleting sets the `deleted` timestamp and every read path filters
/// `deleted IS NULL`.
///
/// # Example
///
/// ```
/// use tenantry_shared::models::{tenant::Tenant, Entity, Status};
///
/// let mut tenant = Tenant::new("Acme Corp");
/// assert!(tenant.is_new());
///
/// tenant.stamp_insert(chrono::Utc::now());
/// assert_eq!(tenant.get_status(), Some(Status::Active));
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Implements [`Entity`] for a model with the standard field names
///
/// The optional list names owning foreign keys that must survive updates.
macro_rules! impl_entity {
    ($model:ty, $kind:literal $(, [$($immutable:ident),*])?) => {
        impl $crate::models::Entity for $model {
            const KIND: &'static str = $kind;

            fn id(&self) -> Option<::uuid::Uuid> {
                self.id
            }

            fn set_id(&mut self, id: ::uuid::Uuid) {
                self.id = Some(id);
            }

            fn status(&self) -> &str {
                &self.status
            }

            fn set_status(&mut self, status: $crate::models::Status) {
                self.status = status.as_str().to_string();
            }

            fn created(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created
            }

            fn updated(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated
            }

            fn deleted(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                self.deleted
            }

            fn set_timestamps(
                &mut self,
                created: ::chrono::DateTime<::chrono::Utc>,
                updated: ::chrono::DateTime<::chrono::Utc>,
            ) {
                self.created = created;
                self.updated = updated;
            }

            fn set_deleted(&mut self, deleted: Option<::chrono::DateTime<::chrono::Utc>>) {
                self.deleted = deleted;
            }

            fn retain_immutable(&mut self, stored: &Self) {
                self.created = stored.created;
                $($(self.$immutable = stored.$immutable.clone();)*)?
            }
        }
    };
}

pub(crate) use impl_entity;

pub mod account;
pub mod directory;
pub mod directory_account;
pub mod directory_scope;
pub mod key;
pub mod scope;
pub mod tenant;

/// Lifecycle status shared by every entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Usable
    Active,

    /// Disabled by an administrator
    Inactive,

    /// Temporarily blocked
    Suspended,
}

impl Status {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Suspended => "suspended",
        }
    }

    /// Parses status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Status::Active),
            "inactive" => Some(Status::Inactive),
            "suspended" => Some(Status::Suspended),
            _ => None,
        }
    }
}

/// Common behavior of persisted identity records
///
/// Storage implementations rely on this trait to apply the insert/update
/// bookkeeping uniformly: id assignment, timestamps, default status and the
/// fields that may not change after insert.
pub trait Entity: Clone + Send + Sync {
    /// Human-readable record kind, used in errors and logs
    const KIND: &'static str;

    /// Storage-assigned identifier, `None` until first persisted
    fn id(&self) -> Option<Uuid>;

    /// Assigns the storage identifier
    fn set_id(&mut self, id: Uuid);

    /// Raw status string
    fn status(&self) -> &str;

    /// Replaces the status
    fn set_status(&mut self, status: Status);

    /// Insert timestamp
    fn created(&self) -> DateTime<Utc>;

    /// Last update timestamp
    fn updated(&self) -> DateTime<Utc>;

    /// Soft delete timestamp
    fn deleted(&self) -> Option<DateTime<Utc>>;

    /// Sets the timestamps directly
    fn set_timestamps(&mut self, created: DateTime<Utc>, updated: DateTime<Utc>);

    /// Sets or clears the soft delete timestamp
    fn set_deleted(&mut self, deleted: Option<DateTime<Utc>>);

    /// Copies the fields that are immutable after insert from the stored copy
    fn retain_immutable(&mut self, stored: &Self);

    /// True until the record has been persisted
    fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// True once the record has been soft-deleted
    fn is_deleted(&self) -> bool {
        self.deleted().is_some()
    }

    /// Gets the parsed status
    fn get_status(&self) -> Option<Status> {
        Status::from_str(self.status())
    }

    /// Applies insert bookkeeping: both timestamps and the default status
    fn stamp_insert(&mut self, now: DateTime<Utc>) {
        self.set_timestamps(now, now);
        if self.status().is_empty() {
            self.set_status(Status::Active);
        }
    }

    /// Applies update bookkeeping
    fn stamp_update(&mut self, now: DateTime<Utc>) {
        let created = self.created();
        self.set_timestamps(created, now);
    }

    /// Marks the record deleted
    fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.set_deleted(Some(now));
        self.stamp_update(now);
    }
}
