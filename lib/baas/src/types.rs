//! Data types exchanged with the backend service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use storefront_core::AccountId;

/// A row returned by the record API, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// An authenticated identity issued by the identity service.
///
/// The storefront only ever holds a read-only copy; the identity service
/// owns the session and replaces it on sign-in, refresh, and sign-out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    account_id: AccountId,
    email: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session for the given account.
    #[must_use]
    pub fn new(account_id: AccountId, access_token: String) -> Self {
        Self {
            account_id,
            email: None,
            access_token,
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Sets the display email.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Returns the account this session belongs to.
    #[must_use]
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Returns the display email, if the identity service provided one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the bearer token for API calls.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token, if present.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns when the access token expires, if known.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the access token is known to have expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

// Tokens never show up in logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// An account as seen through the elevated admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    /// The account identifier.
    pub id: AccountId,
    /// The account's email, if any.
    #[serde(default)]
    pub email: Option<String>,
}

/// Kind of authentication state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    /// Emitted once to a new subscriber with the session at that time.
    InitialSession,
    /// A user signed in.
    SignedIn,
    /// The user signed out or the session was revoked.
    SignedOut,
    /// The access token was refreshed.
    TokenRefreshed,
    /// The user's profile changed.
    UserUpdated,
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        };
        f.write_str(name)
    }
}

/// A change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    /// What happened.
    pub event: AuthChangeEvent,
    /// The session after the change, absent when signed out.
    pub session: Option<Session>,
}

impl AuthStateChange {
    /// Creates a change notification.
    #[must_use]
    pub fn new(event: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// A row filter understood by the record API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`.
    Eq { column: String, value: String },
}

/// A selection against a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    columns: Vec<String>,
    filters: Vec<Filter>,
}

impl Query {
    /// Creates a query selecting every column with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column to the selection.
    #[must_use]
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Returns the selected columns; empty means all.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the filters.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Returns true if `row` satisfies every filter.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq { column, value } => match row.get(column) {
                Some(serde_json::Value::String(s)) => s == value,
                Some(other) => other.to_string() == *value,
                None => false,
            },
        })
    }

    /// Renders the query as REST query-string pairs.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let select = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };

        let mut pairs = vec![("select".to_string(), select)];
        for filter in &self.filters {
            match filter {
                Filter::Eq { column, value } => {
                    pairs.push((column.clone(), format!("eq.{value}")));
                }
            }
        }
        pairs
    }
}
