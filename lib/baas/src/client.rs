//! HTTP client for the backend's auth and REST endpoints.

use crate::config::BaasConfig;
use crate::contract::{AdminDirectory, IdentityProvider, RecordStore};
use crate::error::BaasError;
use crate::events::{AuthEventHub, AuthSubscription};
use crate::types::{AccountProfile, AuthChangeEvent, AuthStateChange, Query, Row, Session};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use rootcause::prelude::Report;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use storefront_core::AccountId;
use tracing::{debug, instrument, warn};

/// Client for a single backend project.
///
/// Holds the cached session the way a browser SDK would, and announces every
/// change through its [`AuthEventHub`]. Cloning shares the session and hub.
#[derive(Clone)]
pub struct BaasClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    service_role: bool,
    session: Arc<RwLock<Option<Session>>>,
    events: Arc<AuthEventHub>,
}

/// Token grant returned by the auth endpoints.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: AccountId,
    #[serde(default)]
    email: Option<String>,
}

/// Error body shapes used by the auth and REST services.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default, alias = "msg", alias = "error_description")]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));

        Session::new(self.user.id, self.access_token)
            .with_email(self.user.email)
            .with_refresh_token(self.refresh_token)
            .with_expires_at(expires_at)
    }
}

impl BaasClient {
    /// Creates a public client authenticated with the anon key.
    ///
    /// # Errors
    ///
    /// Returns an error if the anon key is missing or the HTTP client cannot be built.
    pub fn new(config: &BaasConfig) -> Result<Self, Report<BaasError>> {
        let key = config.anon_key().ok_or_else(|| BaasError::Configuration {
            details: "SUPABASE_ANON_KEY is not set".to_string(),
        })?;
        Self::build(config, key.to_string(), false)
    }

    /// Creates an elevated client authenticated with the service-role key.
    ///
    /// # Errors
    ///
    /// Returns an error if the service key is missing or the HTTP client cannot be built.
    pub fn service_role(config: &BaasConfig) -> Result<Self, Report<BaasError>> {
        let key = config.service_key().ok_or_else(|| BaasError::Configuration {
            details: "SUPABASE_SERVICE_KEY is not set".to_string(),
        })?;
        Self::build(config, key.to_string(), true)
    }

    fn build(
        config: &BaasConfig,
        api_key: String,
        service_role: bool,
    ) -> Result<Self, Report<BaasError>> {
        if config.url().is_empty() {
            return Err(BaasError::Configuration {
                details: "SUPABASE_URL is empty".to_string(),
            }
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BaasError::Configuration {
                details: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.url().to_string(),
            api_key,
            service_role,
            session: Arc::new(RwLock::new(None)),
            events: AuthEventHub::new(),
        })
    }

    /// Returns the hub that announces this client's session changes.
    #[must_use]
    pub fn events(&self) -> &Arc<AuthEventHub> {
        &self.events
    }

    /// Signs in with email and password, replacing any cached session.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Report<BaasError>> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&body)
            .send()
            .await
            .map_err(connection_error)?;
        let token: TokenResponse = decode(response).await?;
        let session = token.into_session();

        self.store_session(Some(session.clone()));
        debug!(account_id = %session.account_id(), "signed in");
        self.events.emit(AuthStateChange::new(
            AuthChangeEvent::SignedIn,
            Some(session.clone()),
        ));
        Ok(session)
    }

    /// Exchanges the cached refresh token for a new session.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Session, Report<BaasError>> {
        let refresh_token = self
            .cached_session()
            .and_then(|s| s.refresh_token().map(str::to_string))
            .ok_or(BaasError::NoSession)?;

        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&body)
            .send()
            .await
            .map_err(connection_error)?;
        let token: TokenResponse = decode(response).await?;
        let session = token.into_session();

        self.store_session(Some(session.clone()));
        self.events.emit(AuthStateChange::new(
            AuthChangeEvent::TokenRefreshed,
            Some(session.clone()),
        ));
        Ok(session)
    }

    /// Fetches the profile behind the cached session's access token.
    #[instrument(skip(self))]
    pub async fn get_user(&self) -> Result<AccountProfile, Report<BaasError>> {
        let session = self.cached_session().ok_or(BaasError::NoSession)?;
        let response = self
            .request(Method::GET, "/auth/v1/user")
            .bearer_auth(session.access_token())
            .send()
            .await
            .map_err(connection_error)?;
        let user: UserResponse = decode(response).await?;
        Ok(AccountProfile {
            id: user.id,
            email: user.email,
        })
    }

    fn cached_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: Option<Session>) {
        *self
            .session
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = session;
    }

    fn clear_session(&self) {
        self.store_session(None);
        self.events
            .emit(AuthStateChange::new(AuthChangeEvent::SignedOut, None));
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.api_key)
    }

    /// Bearer token for row access: the signed-in user's token if any,
    /// otherwise the client's own key.
    fn row_bearer(&self) -> String {
        if self.service_role {
            return self.api_key.clone();
        }
        self.cached_session()
            .map_or_else(|| self.api_key.clone(), |s| s.access_token().to_string())
    }
}

#[async_trait]
impl IdentityProvider for BaasClient {
    async fn get_session(&self) -> Result<Option<Session>, Report<BaasError>> {
        let Some(session) = self.cached_session() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        debug!(account_id = %session.account_id(), "cached session expired, refreshing");
        match self.refresh_session().await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(e) => {
                warn!(error = %e, "session refresh failed, signing out locally");
                self.clear_session();
                Err(e)
            }
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe_with(AuthStateChange::new(
            AuthChangeEvent::InitialSession,
            self.cached_session(),
        ))
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), Report<BaasError>> {
        let Some(session) = self.cached_session() else {
            self.clear_session();
            return Ok(());
        };

        let response = self
            .request(Method::POST, "/auth/v1/logout")
            .bearer_auth(session.access_token())
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        // The token being already invalid still ends the session locally.
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND
        {
            debug!(account_id = %session.account_id(), "signed out");
            self.clear_session();
            return Ok(());
        }

        Err(status_error(response).await.into())
    }
}

#[async_trait]
impl RecordStore for BaasClient {
    #[instrument(skip(self, table, query), fields(table = %table))]
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, Report<BaasError>> {
        let response = self
            .request(Method::GET, &format!("/rest/v1/{table}"))
            .bearer_auth(self.row_bearer())
            .query(&query.to_query_pairs())
            .send()
            .await
            .map_err(connection_error)?;
        let rows: Vec<Row> = decode(response).await?;
        debug!(count = rows.len(), "rows selected");
        Ok(rows)
    }

    #[instrument(skip(self, table, rows), fields(table = %table, count = rows.len()))]
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, Report<BaasError>> {
        let response = self
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .bearer_auth(self.row_bearer())
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await
            .map_err(connection_error)?;
        let stored: Vec<Row> = decode(response).await?;
        debug!(count = stored.len(), "rows inserted");
        Ok(stored)
    }
}

#[async_trait]
impl AdminDirectory for BaasClient {
    #[instrument(skip(self, account_id), fields(account_id = %account_id))]
    async fn get_user_by_id(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<AccountProfile>, Report<BaasError>> {
        if !self.service_role {
            return Err(BaasError::Configuration {
                details: "admin user lookup requires the service-role key".to_string(),
            }
            .into());
        }

        let response = self
            .request(Method::GET, &format!("/auth/v1/admin/users/{account_id}"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(connection_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let user: UserResponse = decode(response).await?;
        Ok(Some(AccountProfile {
            id: user.id,
            email: user.email,
        }))
    }
}

fn connection_error(e: reqwest::Error) -> BaasError {
    BaasError::ConnectionFailed {
        details: e.to_string(),
    }
}

async fn status_error(response: Response) -> BaasError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    BaasError::from_status(status.as_u16(), error_message(status, &text))
}

fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, Report<BaasError>> {
    if !response.status().is_success() {
        return Err(status_error(response).await.into());
    }
    let body = response.bytes().await.map_err(connection_error)?;
    serde_json::from_slice(&body).map_err(|e| {
        BaasError::Decode {
            details: e.to_string(),
        }
        .into()
    })
}
