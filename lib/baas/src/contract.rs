//! The surface the storefront needs from the backend service.
//!
//! These traits let the authentication context and the provisioning tool
//! run against the real HTTP client in production and against in-memory
//! fakes in tests.

use crate::error::BaasError;
use crate::events::AuthSubscription;
use crate::types::{AccountProfile, Query, Row, Session};
use async_trait::async_trait;
use rootcause::prelude::Report;
use storefront_core::AccountId;

/// Identity operations available to a signed-in (or anonymous) client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, Report<BaasError>>;

    /// Registers for sign-in, sign-out, and token refresh notifications.
    fn on_auth_state_change(&self) -> AuthSubscription;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), Report<BaasError>>;
}

/// Row access to the hosted relational store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Selects the rows of `table` matching `query`.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, Report<BaasError>>;

    /// Inserts rows into `table`, returning the stored representation.
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, Report<BaasError>>;
}

/// Elevated account lookups. Requires service-role credentials.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Looks up an account by ID. Returns `None` if it does not exist.
    async fn get_user_by_id(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<AccountProfile>, Report<BaasError>>;
}
