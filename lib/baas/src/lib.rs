//! Backend-as-a-service client for the storefront.
//!
//! The storefront keeps no server of its own: identity (sessions, sign-out,
//! change notifications) and data (the `admins` allow-list) live in a hosted
//! backend. This crate provides:
//! - The contract the rest of the storefront depends on
//!   (`IdentityProvider`, `RecordStore`, `AdminDirectory`)
//! - Session, query, and change-notification types
//! - `AuthEventHub`, the fan-out behind `on_auth_state_change`
//! - `BaasClient`, the HTTP implementation of the contract
//!
//! # Example
//!
//! ```
//! use storefront_baas::Query;
//!
//! let query = Query::new().select("id").eq("user_id", "acct-1");
//! assert_eq!(
//!     query.to_query_pairs(),
//!     vec![
//!         ("select".to_string(), "id".to_string()),
//!         ("user_id".to_string(), "eq.acct-1".to_string()),
//!     ]
//! );
//! ```

pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod events;
pub mod types;

pub use client::BaasClient;
pub use config::BaasConfig;
pub use contract::{AdminDirectory, IdentityProvider, RecordStore};
pub use error::BaasError;
pub use events::{AuthEventHub, AuthSubscription};
pub use types::{AccountProfile, AuthChangeEvent, AuthStateChange, Filter, Query, Row, Session};
