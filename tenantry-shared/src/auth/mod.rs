/// Credential material for accounts
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing, verification and length rules
/// - [`keys`]: RSA key pair issuance with PEM encoding
///
/// # Example
///
/// ```no_run
/// use tenantry_shared::auth::keys::KeyIssuer;
/// use tenantry_shared::auth::password::CredentialEngine;
/// use tenantry_shared::models::account::Account;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut account = Account::new("admin@example.com", "Admin");
/// CredentialEngine::default().set_password(&mut account, "user_password")?;
///
/// let key = KeyIssuer::new().issue(Some(uuid::Uuid::new_v4()))?;
/// assert!(key.public_key_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
/// # Ok(())
/// # }
/// ```

pub mod keys;
pub mod password;
