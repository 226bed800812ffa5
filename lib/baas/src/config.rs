//! Backend connection configuration.
//!
//! Loaded from `SUPABASE_*` environment variables via the `config` crate:
//! `SUPABASE_URL`, `SUPABASE_ANON_KEY`, `SUPABASE_SERVICE_KEY`, and
//! `SUPABASE_REQUEST_TIMEOUT_SECS`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the backend service.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct BaasConfig {
    /// Project base URL (e.g., "https://abc.supabase.co").
    /// Empty when unset; clients refuse to build without it.
    #[serde(default)]
    url: String,
    /// Public key used by browser-facing clients.
    #[serde(default)]
    anon_key: Option<String>,
    /// Service-role key; bypasses row-level security. Tooling only.
    #[serde(default)]
    service_key: Option<String>,
    /// Per-request timeout in seconds.
    /// Default: 10
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl BaasConfig {
    /// Creates a configuration for a public client.
    #[must_use]
    pub fn new(url: String, anon_key: String) -> Self {
        Self {
            url,
            anon_key: Some(anon_key),
            service_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Creates a configuration for a service-role client.
    #[must_use]
    pub fn service_role(url: String, service_key: String) -> Self {
        Self {
            url,
            anon_key: None,
            service_key: Some(service_key),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Loads configuration from `SUPABASE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value fails to parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(Self::environment())
    }

    /// The `SUPABASE_*` environment source. Tests swap in a fixed map with
    /// [`config::Environment::source`].
    #[must_use]
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix("SUPABASE")
            .prefix_separator("_")
            .try_parsing(true)
    }

    /// Loads configuration from an environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if a value fails to parse.
    pub fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// Returns the project base URL without a trailing slash.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Returns the public key, if configured.
    #[must_use]
    pub fn anon_key(&self) -> Option<&str> {
        self.anon_key.as_deref()
    }

    /// Returns the service-role key, if configured.
    #[must_use]
    pub fn service_key(&self) -> Option<&str> {
        self.service_key.as_deref()
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for BaasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaasConfig")
            .field("url", &self.url)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "<redacted>"))
            .field("service_key", &self.service_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_has_defaults() {
        let config = BaasConfig::new(
            "https://abc.supabase.co/".to_string(),
            "anon".to_string(),
        );
        assert_eq!(config.url(), "https://abc.supabase.co");
        assert_eq!(config.anon_key(), Some("anon"));
        assert!(config.service_key().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn service_role_config() {
        let config = BaasConfig::service_role(
            "https://abc.supabase.co".to_string(),
            "service".to_string(),
        )
        .with_request_timeout(Duration::from_secs(3));
        assert_eq!(config.service_key(), Some("service"));
        assert!(config.anon_key().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn deserialize_applies_defaults() {
        let config: BaasConfig =
            serde_json::from_str(r#"{"url": "https://abc.supabase.co"}"#).expect("deserialize");
        assert!(config.anon_key().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    fn vars(pairs: &[(&str, &str)]) -> config::Environment {
        BaasConfig::environment().source(Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ))
    }

    #[test]
    fn loads_supabase_variables() {
        let config = BaasConfig::from_environment(vars(&[
            ("SUPABASE_URL", "https://abc.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("SUPABASE_SERVICE_KEY", "service"),
            ("SUPABASE_REQUEST_TIMEOUT_SECS", "30"),
        ]))
        .expect("load");
        assert_eq!(config.url(), "https://abc.supabase.co");
        assert_eq!(config.anon_key(), Some("anon"));
        assert_eq!(config.service_key(), Some("service"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_variables_leave_url_empty() {
        let config = BaasConfig::from_environment(vars(&[])).expect("load");
        assert_eq!(config.url(), "");
        assert!(config.anon_key().is_none());
        assert!(config.service_key().is_none());
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let result = BaasConfig::from_environment(vars(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_REQUEST_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_keys() {
        let config = BaasConfig::service_role(
            "https://abc.supabase.co".to_string(),
            "very-secret".to_string(),
        );
        assert!(!format!("{config:?}").contains("very-secret"));
    }
}
