//! Tunables for the authentication context.
//!
//! Loaded from `STOREFRONT_AUTH__*` environment variables via the `config`
//! crate, e.g. `STOREFRONT_AUTH__FALLBACK=disabled` or
//! `STOREFRONT_AUTH__RETRY__MAX_ATTEMPTS=5`. Every field has a default.

use crate::admin::FallbackPolicy;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Authentication context configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    /// Name of the allow-list record set.
    /// Default: "admins"
    #[serde(default = "default_admins_table")]
    pub admins_table: String,
    /// What to do when the filtered admin query fails.
    #[serde(default)]
    pub fallback: FallbackPolicy,
    /// Re-check schedule while a session is not (yet) admin.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_admins_table() -> String {
    "admins".to_string()
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            admins_table: default_admins_table(),
            fallback: FallbackPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AuthOptions {
    /// Loads options from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(Self::environment())
    }

    /// The `STOREFRONT_AUTH__*` environment source.
    #[must_use]
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix("STOREFRONT_AUTH")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    /// Loads options from an environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// Sets the fallback policy.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
