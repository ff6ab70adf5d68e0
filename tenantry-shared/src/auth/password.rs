/// Credential engine: Argon2id password hashing for accounts
///
/// Passwords are never stored. The engine turns them into PHC-formatted
/// Argon2id hashes kept in [`Account::password_hash`] and verifies candidates
/// against those hashes.
///
/// # Security
///
/// - **Algorithm**: Argon2id, version 0x13
/// - **Memory**: 64 MB (65536 KiB) by default
/// - **Iterations**: 3 passes by default
/// - **Parallelism**: 4 lanes by default
/// - **Output**: 32-byte hash
/// - **Salt**: 16 random bytes per hash
///
/// Verification reads the parameters back from the stored hash, so hashes made
/// with older parameters keep verifying after the configuration changes.
///
/// # Example
///
/// ```
/// use tenantry_shared::auth::password::{CredentialConfig, CredentialEngine};
/// use tenantry_shared::models::account::Account;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = CredentialEngine::new(CredentialConfig::default());
/// let mut account = Account::new("admin@example.com", "Admin");
///
/// engine.set_password(&mut account, "correct horse battery")?;
/// assert!(engine.match_password(&account, "correct horse battery").is_ok());
/// assert!(engine.match_password(&account, "wrong password").is_err());
/// # Ok(())
/// # }
/// ```

use crate::error::{IdentityError, IdentityResult};
use crate::models::account::Account;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum password length in bytes
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in bytes
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Degree of parallelism (lanes)
    pub parallelism: u32,

    /// Hash output length in bytes
    pub output_len: usize,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
            output_len: 32,
        }
    }
}

/// Hashes, sets and verifies account passwords
#[derive(Debug, Clone, Default)]
pub struct CredentialEngine {
    config: CredentialConfig,
}

impl CredentialEngine {
    /// Creates an engine with the given cost parameters
    ///
    /// Parameters are checked when hashing, not here.
    pub fn new(config: CredentialConfig) -> Self {
        Self { config }
    }

    /// Returns the configured cost parameters
    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    /// Hashes a password into a PHC string
    ///
    /// Example output:
    /// ```text
    /// $argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `HashingFailure` if the parameters are rejected by Argon2 or
    /// hashing fails
    pub fn hash(&self, password: &str) -> IdentityResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        let params = ParamsBuilder::new()
            .m_cost(self.config.memory_kib)
            .t_cost(self.config.iterations)
            .p_cost(self.config.parallelism)
            .output_len(self.config.output_len)
            .build()
            .map_err(|e| IdentityError::HashingFailure(format!("invalid parameters: {}", e)))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| IdentityError::HashingFailure(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Validates, hashes and stores a new password on the account
    ///
    /// The account is left untouched on error.
    ///
    /// # Errors
    ///
    /// - `InvalidPassword` if the password is shorter than 8 or longer than
    ///   256 bytes
    /// - `HashingFailure` if hashing fails
    pub fn set_password(&self, account: &mut Account, password: &str) -> IdentityResult<()> {
        if password.len() < MIN_PASSWORD_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
            return Err(IdentityError::InvalidPassword);
        }

        let hash = self.hash(password)?;
        account.password_hash = Some(hash);
        Ok(())
    }

    /// Checks a candidate password against the account's stored hash
    ///
    /// # Errors
    ///
    /// Returns `CredentialMismatch` if the account has no hash, the stored
    /// hash cannot be parsed, or the password does not verify
    pub fn match_password(&self, account: &Account, password: &str) -> IdentityResult<()> {
        let stored = account
            .password_hash
            .as_deref()
            .ok_or(IdentityError::CredentialMismatch)?;

        let parsed_hash = PasswordHash::new(stored).map_err(|_| IdentityError::CredentialMismatch)?;

        // Parameters are embedded in the hash; comparison is constant-time
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| IdentityError::CredentialMismatch)
    }

    /// Replaces the password after verifying the current one
    ///
    /// # Errors
    ///
    /// - `CredentialMismatch` if `current` does not match
    /// - `InvalidPassword` / `HashingFailure` as for [`Self::set_password`]
    pub fn update_password(&self, account: &mut Account, current: &str, new: &str) -> IdentityResult<()> {
        self.match_password(account, current)?;
        self.set_password(account, new)
    }

    /// Removes the password hash
    ///
    /// The account can no longer authenticate by password but is otherwise
    /// unchanged.
    pub fn delete_password(&self, account: &mut Account) {
        account.password_hash = None;
    }
}
