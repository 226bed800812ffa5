//! Point-in-time view of the authentication state.

use std::fmt;
use storefront_baas::Session;

/// What the rest of the storefront sees of authentication.
///
/// `is_admin` is never true without a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    session: Option<Session>,
    is_admin: bool,
    loading: bool,
}

impl AuthSnapshot {
    /// The state before the first session resolution.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            session: None,
            is_admin: false,
            loading: true,
        }
    }

    /// Creates a snapshot. `is_admin` is forced to false without a session.
    #[must_use]
    pub fn new(session: Option<Session>, is_admin: bool, loading: bool) -> Self {
        let is_admin = is_admin && session.is_some();
        Self {
            session,
            is_admin,
            loading,
        }
    }

    /// Returns the current session.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns true if the signed-in account is on the admin allow-list.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Returns true while a session or admin resolution is pending.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Returns true if someone is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn set_admin(&mut self, is_admin: bool) {
        self.is_admin = is_admin && self.session.is_some();
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// Renders the debug panel text.
impl fmt::Display for AuthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session {
            Some(session) => writeln!(
                f,
                "User: Logged in ({})",
                session.email().unwrap_or("no email")
            )?,
            None => writeln!(f, "User: Not logged in")?,
        }
        writeln!(f, "Admin: {}", if self.is_admin { "Yes" } else { "No" })?;
        write!(
            f,
            "User ID: {}",
            self.session
                .as_ref()
                .map_or("N/A", |s| s.account_id().as_str())
        )
    }
}
