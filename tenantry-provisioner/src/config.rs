/// Configuration for the provisioner
///
/// Loaded once from environment variables (a `.env` file is read first when
/// present) and passed into constructors.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DATABASE_MIN_CONNECTIONS`: Idle connections kept open (default: 2)
/// - `DATABASE_CONNECT_TIMEOUT_SECONDS`: Acquire timeout (default: 30)
/// - `PASSWORD_MEMORY_KIB`: Argon2 memory cost (default: 65536)
/// - `PASSWORD_ITERATIONS`: Argon2 passes (default: 3)
/// - `PASSWORD_PARALLELISM`: Argon2 lanes (default: 4)
/// - `PROVISION_CREDENTIAL_FAILURE`: `warn` or `fatal` (default: warn)
/// - `PROVISION_KEY_LISTING_FAILURE`: `warn` or `fatal` (default: warn)
/// - `RUN_MIGRATIONS`: Apply migrations on startup (default: true)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use tenantry_provisioner::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Pool size: {}", config.database.max_connections);
/// # Ok(())
/// # }
/// ```

use crate::policy::{ProvisioningPolicy, Severity};
use anyhow::Context;
use std::env;
use std::str::FromStr;
use tenantry_shared::auth::password::CredentialConfig;
use tenantry_shared::db::pool::DatabaseConfig;

/// Complete provisioner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection pool settings
    pub database: DatabaseConfig,

    /// Argon2 cost parameters
    pub credentials: CredentialConfig,

    /// Failure handling for best-effort steps
    pub policy: ProvisioningPolicy,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` is missing
    /// - A variable is set to a value that does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let pool_defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", pool_defaults.max_connections)?,
            min_connections: parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", pool_defaults.min_connections)?,
            connect_timeout_seconds: parse_or(
                &lookup,
                "DATABASE_CONNECT_TIMEOUT_SECONDS",
                pool_defaults.connect_timeout_seconds,
            )?,
            ..pool_defaults
        };

        if database.min_connections > database.max_connections {
            anyhow::bail!("DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS");
        }

        let credential_defaults = CredentialConfig::default();
        let credentials = CredentialConfig {
            memory_kib: parse_or(&lookup, "PASSWORD_MEMORY_KIB", credential_defaults.memory_kib)?,
            iterations: parse_or(&lookup, "PASSWORD_ITERATIONS", credential_defaults.iterations)?,
            parallelism: parse_or(&lookup, "PASSWORD_PARALLELISM", credential_defaults.parallelism)?,
            ..credential_defaults
        };

        let policy_defaults = ProvisioningPolicy::default();
        let policy = ProvisioningPolicy {
            credential_failure: parse_or::<Severity, _>(
                &lookup,
                "PROVISION_CREDENTIAL_FAILURE",
                policy_defaults.credential_failure,
            )?,
            key_listing_failure: parse_or::<Severity, _>(
                &lookup,
                "PROVISION_KEY_LISTING_FAILURE",
                policy_defaults.key_listing_failure,
            )?,
        };

        let run_migrations = parse_or(&lookup, "RUN_MIGRATIONS", true)?;

        Ok(Self {
            database,
            credentials,
            policy,
            run_migrations,
        })
    }
}

/// Parses `key` if set, otherwise returns `default`
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: '{}' ({})", key, raw, e)),
        None => Ok(default),
    }
}
