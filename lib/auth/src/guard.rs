//! Route guard for the admin area.

use crate::snapshot::AuthSnapshot;
use tokio::sync::watch;

/// Where non-admins are sent.
pub const ROOT_PATH: &str = "/";

/// What to show for a protected admin route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state is still resolving; show a placeholder.
    Placeholder,
    /// Not an admin; navigate away.
    Redirect {
        /// Redirect target.
        to: &'static str,
    },
    /// Render the protected content.
    Render,
}

impl GuardDecision {
    /// Decides based on a single snapshot.
    #[must_use]
    pub fn for_snapshot(snapshot: &AuthSnapshot) -> Self {
        if snapshot.loading() {
            Self::Placeholder
        } else if snapshot.session().is_some() && snapshot.is_admin() {
            Self::Render
        } else {
            Self::Redirect { to: ROOT_PATH }
        }
    }
}

/// Watches the auth state on behalf of the admin area.
#[derive(Debug, Clone)]
pub struct AdminRouteGuard {
    changes: watch::Receiver<AuthSnapshot>,
}

impl AdminRouteGuard {
    /// Creates a guard over a stream of auth snapshots.
    #[must_use]
    pub fn new(changes: watch::Receiver<AuthSnapshot>) -> Self {
        Self { changes }
    }

    /// Returns the decision for the current state.
    #[must_use]
    pub fn decision(&self) -> GuardDecision {
        GuardDecision::for_snapshot(&self.changes.borrow())
    }

    /// Waits until loading finishes and returns the final decision.
    ///
    /// Redirects if the auth context goes away first.
    pub async fn settle(&mut self) -> GuardDecision {
        match self.changes.wait_for(|s| !s.loading()).await {
            Ok(snapshot) => GuardDecision::for_snapshot(&snapshot),
            Err(_) => GuardDecision::Redirect { to: ROOT_PATH },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::session;

    #[test]
    fn loading_shows_placeholder() {
        let snapshot = AuthSnapshot::new(Some(session("acct-a")), true, true);
        assert_eq!(
            GuardDecision::for_snapshot(&snapshot),
            GuardDecision::Placeholder
        );
        assert_eq!(
            GuardDecision::for_snapshot(&AuthSnapshot::initial()),
            GuardDecision::Placeholder
        );
    }

    #[test]
    fn signed_out_redirects_to_root() {
        let snapshot = AuthSnapshot::new(None, false, false);
        assert_eq!(
            GuardDecision::for_snapshot(&snapshot),
            GuardDecision::Redirect { to: "/" }
        );
    }

    #[test]
    fn non_admin_redirects_to_root() {
        let snapshot = AuthSnapshot::new(Some(session("acct-b")), false, false);
        assert_eq!(
            GuardDecision::for_snapshot(&snapshot),
            GuardDecision::Redirect { to: "/" }
        );
    }

    #[test]
    fn admin_renders() {
        let snapshot = AuthSnapshot::new(Some(session("acct-a")), true, false);
        assert_eq!(GuardDecision::for_snapshot(&snapshot), GuardDecision::Render);
    }

    #[tokio::test]
    async fn settle_waits_for_loading_to_finish() {
        let (tx, rx) = watch::channel(AuthSnapshot::initial());
        let mut guard = AdminRouteGuard::new(rx);
        assert_eq!(guard.decision(), GuardDecision::Placeholder);

        let waiter = tokio::spawn(async move { guard.settle().await });
        tx.send_replace(AuthSnapshot::new(Some(session("acct-a")), false, true));
        tx.send_replace(AuthSnapshot::new(Some(session("acct-a")), true, false));

        assert_eq!(waiter.await.unwrap(), GuardDecision::Render);
    }

    #[tokio::test]
    async fn settle_redirects_when_context_is_gone() {
        let (tx, rx) = watch::channel(AuthSnapshot::initial());
        let mut guard = AdminRouteGuard::new(rx);
        drop(tx);
        assert_eq!(
            guard.settle().await,
            GuardDecision::Redirect { to: "/" }
        );
    }
}
