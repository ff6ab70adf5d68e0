//! # Tenantry Shared Library
//!
//! Identity core used by the tenant provisioner: entities, credential
//! material, persistence gateways and database plumbing.
//!
//! ## Module Organization
//!
//! - `models`: Entities, field validation and their SQL queries
//! - `auth`: Password hashing and RSA key issuance
//! - `store`: Persistence gateway traits with PostgreSQL and in-memory implementations
//! - `db`: Connection pool and embedded migrations
//! - `error`: Error taxonomy

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

/// Current version of the Tenantry shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
