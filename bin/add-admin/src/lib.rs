//! Grants admin access to an existing storefront account.
//!
//! The tool runs with service-role credentials: it confirms the account
//! exists through the elevated directory, then adds a row to the admin
//! allow-list unless one is already there.

use serde::Deserialize;
use std::fmt;
use std::process::ExitCode;
use storefront_baas::{AdminDirectory, BaasConfig, Query, RecordStore, Row};
use storefront_core::{AccountId, AdminRecordId, Result};
use tracing::{info, instrument, warn};

/// Usage line printed for a missing or invalid argument.
pub const USAGE: &str = "Usage: storefront-add-admin <ACCOUNT_ID>";

/// Errors that stop provisioning. Every variant exits with status 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// No account ID was given, or it is malformed.
    InvalidAccountId {
        /// Why the argument was rejected.
        reason: String,
    },
    /// The backend URL or service key is not configured.
    MissingCredentials {
        /// Error details.
        details: String,
    },
    /// A configuration value is invalid, or the client could not be built.
    Configuration {
        /// Error details.
        details: String,
    },
    /// The elevated account lookup failed.
    UserLookupFailed {
        /// Error details.
        details: String,
    },
    /// No account has this ID.
    UserNotFound {
        /// The requested account.
        account_id: AccountId,
    },
    /// Inserting the allow-list row failed.
    InsertFailed {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAccountId { reason } => write!(f, "invalid account ID: {reason}"),
            Self::MissingCredentials { details } => write!(
                f,
                "SUPABASE_URL and SUPABASE_SERVICE_KEY environment variables must be set: {details}"
            ),
            Self::Configuration { details } => write!(f, "invalid configuration: {details}"),
            Self::UserLookupFailed { details } => {
                write!(f, "error checking if user exists: {details}")
            }
            Self::UserNotFound { account_id } => write!(f, "user with ID {account_id} not found"),
            Self::InsertFailed { details } => write!(f, "error adding admin: {details}"),
        }
    }
}

impl std::error::Error for ProvisionError {}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The account was already on the allow-list. Nothing was written.
    AlreadyAdmin,
    /// A new allow-list row was written.
    Added {
        /// ID of the new row, when the store returned it.
        record_id: Option<AdminRecordId>,
    },
}

impl ProvisionOutcome {
    /// Message printed on success.
    #[must_use]
    pub fn message(&self, account_id: &AccountId) -> String {
        match self {
            Self::AlreadyAdmin => format!("User {account_id} is already an admin"),
            Self::Added { .. } => {
                format!("User {account_id} has been added as an admin successfully!")
            }
        }
    }
}

/// Maps a run's result to the process exit status.
#[must_use]
pub fn exit_code(result: &Result<ProvisionOutcome, ProvisionError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

/// Tool settings beyond the backend connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProvisionSettings {
    /// Allow-list table.
    /// Default: "admins"
    #[serde(default = "default_admins_table")]
    pub admins_table: String,
}

fn default_admins_table() -> String {
    "admins".to_string()
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            admins_table: default_admins_table(),
        }
    }
}

impl ProvisionSettings {
    /// Loads settings from `STOREFRONT_AUTH__*` environment variables, the
    /// same ones the auth context reads.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Configuration`] if a value fails to parse.
    pub fn from_env() -> Result<Self, ProvisionError> {
        Self::from_environment(
            config::Environment::with_prefix("STOREFRONT_AUTH")
                .prefix_separator("__")
                .separator("__"),
        )
    }

    /// Loads settings from an environment source.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Configuration`] if a value fails to parse.
    pub fn from_environment(environment: config::Environment) -> Result<Self, ProvisionError> {
        config::Config::builder()
            .add_source(environment)
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| {
                ProvisionError::Configuration {
                    details: e.to_string(),
                }
                .into()
            })
    }
}

/// Parses the command-line account argument.
///
/// # Errors
///
/// Returns [`ProvisionError::InvalidAccountId`] if the argument is missing or
/// malformed.
pub fn parse_account_arg(arg: Option<String>) -> Result<AccountId, ProvisionError> {
    let Some(arg) = arg else {
        return Err(ProvisionError::InvalidAccountId {
            reason: "please provide a user ID as an argument".to_string(),
        }
        .into());
    };
    AccountId::try_from(arg).map_err(|e| {
        ProvisionError::InvalidAccountId {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Loads the service-role connection settings from `SUPABASE_*`.
///
/// # Errors
///
/// See [`load_service_config_from`].
pub fn load_service_config() -> Result<BaasConfig, ProvisionError> {
    load_service_config_from(BaasConfig::environment())
}

/// Loads the service-role connection settings from an environment source.
///
/// # Errors
///
/// Returns [`ProvisionError::MissingCredentials`] if the URL or service key
/// is absent or empty, and [`ProvisionError::Configuration`] if a value
/// fails to parse.
pub fn load_service_config_from(
    environment: config::Environment,
) -> Result<BaasConfig, ProvisionError> {
    let config =
        BaasConfig::from_environment(environment).map_err(|e| ProvisionError::Configuration {
            details: e.to_string(),
        })?;
    if config.url().is_empty() {
        return Err(ProvisionError::MissingCredentials {
            details: "SUPABASE_URL is not set".to_string(),
        }
        .into());
    }
    if config.service_key().is_none_or(str::is_empty) {
        return Err(ProvisionError::MissingCredentials {
            details: "SUPABASE_SERVICE_KEY is not set".to_string(),
        }
        .into());
    }
    Ok(config)
}

/// Adds `account_id` to the allow-list in `table`.
///
/// # Errors
///
/// Returns an error if the account lookup fails, the account does not exist,
/// or the insert fails. A failure while checking for an existing row is only
/// logged.
#[instrument(skip(directory, records, account_id), fields(account_id = %account_id))]
pub async fn provision_admin(
    directory: &dyn AdminDirectory,
    records: &dyn RecordStore,
    table: &str,
    account_id: &AccountId,
) -> Result<ProvisionOutcome, ProvisionError> {
    let profile = directory
        .get_user_by_id(account_id)
        .await
        .map_err(|e| ProvisionError::UserLookupFailed {
            details: e.to_string(),
        })?
        .ok_or_else(|| ProvisionError::UserNotFound {
            account_id: account_id.clone(),
        })?;
    info!(email = profile.email.as_deref(), "account found");

    let existing = Query::new().select("id").eq("user_id", account_id.as_str());
    match records.select(table, &existing).await {
        Ok(rows) if !rows.is_empty() => return Ok(ProvisionOutcome::AlreadyAdmin),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "could not check for an existing admin row, continuing"),
    }

    let mut row = Row::new();
    row.insert(
        "user_id".to_string(),
        serde_json::Value::String(account_id.as_str().to_string()),
    );
    let stored = records
        .insert(table, vec![row])
        .await
        .map_err(|e| ProvisionError::InsertFailed {
            details: e.to_string(),
        })?;

    let record_id = stored
        .first()
        .and_then(|row| row.get("id"))
        .and_then(|id| match id {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .and_then(|id| AdminRecordId::try_from(id).ok());
    info!(record_id = record_id.as_ref().map(AdminRecordId::as_str), "admin row added");

    Ok(ProvisionOutcome::Added { record_id })
}
