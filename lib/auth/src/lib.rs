//! Authentication context and admin route guard for the storefront.
//!
//! [`AuthContext`] tracks the signed-in session and whether its account is
//! on the admin allow-list. [`AdminRouteGuard`] turns that state into a
//! render/redirect decision for the admin area.
//!
//! The admin flag is only ever true while a session is present, and a
//! lookup that finishes after the session changed never touches the state.

pub mod admin;
pub mod context;
pub mod error;
pub mod guard;
pub mod notify;
pub mod options;
pub mod retry;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use admin::{AdminLookup, AdminStatus, FallbackPolicy, LookupPath};
pub use context::{AuthBackend, AuthContext};
pub use error::AdminCheckError;
pub use guard::{AdminRouteGuard, GuardDecision};
pub use notify::{LogNotifier, Notification, NotificationLevel, Notifier};
pub use options::AuthOptions;
pub use retry::{Backoff, RetryPolicy};
pub use snapshot::AuthSnapshot;
