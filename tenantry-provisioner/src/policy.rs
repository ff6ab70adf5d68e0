/// Failure policy for the provisioning workflow
///
/// Some steps of the workflow are allowed to fail without aborting it. Which
/// ones is decided here rather than inside the orchestrator:
///
/// | event | configurable | default |
/// |---|---|---|
/// | credential failure while provisioning a new account | yes | `Warn` |
/// | listing the account's active keys | yes | `Warn` |
/// | key issuance or key persistence | no | `Fatal` |
/// | any other store write | no | `Fatal` |
///
/// A `Warn` failure is logged at `warn` level and the workflow continues.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a step failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Abort the workflow and roll back
    Fatal,

    /// Log and continue
    Warn,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Warn => "warn",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Severity::Fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown severity
#[derive(Debug, thiserror::Error)]
#[error("unknown severity '{0}', expected 'warn' or 'fatal'")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Severity::Fatal),
            "warn" => Ok(Severity::Warn),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Per-event severities for the configurable steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPolicy {
    /// Password validation or hashing failed for a new account
    pub credential_failure: Severity,

    /// Reading the account's active key ids failed
    pub key_listing_failure: Severity,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            credential_failure: Severity::Warn,
            key_listing_failure: Severity::Warn,
        }
    }
}

impl ProvisioningPolicy {
    /// Policy that aborts on every failure
    pub fn strict() -> Self {
        Self {
            credential_failure: Severity::Fatal,
            key_listing_failure: Severity::Fatal,
        }
    }
}
