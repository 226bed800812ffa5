//! The authentication context.
//!
//! [`AuthContext`] owns the subscription to the identity provider, caches
//! the current session, and keeps the admin flag in step with it. Readers
//! take snapshots or watch for changes; nothing outside the context writes
//! the state.
//!
//! Every change notification starts a new generation. Admin lookups and
//! their retries remember the generation they were started for, and their
//! results are dropped if a newer notification has arrived in the meantime
//! or the context has been torn down.

use crate::admin::{AdminLookup, AdminStatus};
use crate::error::AdminCheckError;
use crate::guard::AdminRouteGuard;
use crate::notify::{Notification, Notifier};
use crate::options::AuthOptions;
use crate::snapshot::AuthSnapshot;
use rootcause::prelude::Report;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use storefront_baas::{
    AuthSubscription, BaasClient, BaasError, IdentityProvider, RecordStore, Session,
};
use storefront_core::AccountId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// The backend capabilities the context depends on.
#[derive(Clone)]
pub struct AuthBackend {
    /// Session source and change notifications.
    pub identity: Arc<dyn IdentityProvider>,
    /// Row access for the admin allow-list.
    pub records: Arc<dyn RecordStore>,
}

impl AuthBackend {
    /// Creates a backend from separate capabilities.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, records: Arc<dyn RecordStore>) -> Self {
        Self { identity, records }
    }

    /// Uses one HTTP client for both identity and records.
    #[must_use]
    pub fn from_client(client: BaasClient) -> Self {
        let client = Arc::new(client);
        Self {
            identity: client.clone(),
            records: client,
        }
    }
}

/// Authentication and admin state for the storefront.
///
/// Tearing down (explicitly or by dropping) unsubscribes from the identity
/// provider and cancels every pending lookup and retry.
pub struct AuthContext {
    shared: Arc<Shared>,
}

struct Shared {
    backend: AuthBackend,
    notifier: Arc<dyn Notifier>,
    options: AuthOptions,
    state: watch::Sender<AuthSnapshot>,
    control: Mutex<Control>,
}

#[derive(Default)]
struct Control {
    active: bool,
    generation: u64,
    resolved: bool,
    lookup_pending: bool,
    sign_outs_in_flight: u32,
    retries_used: u32,
    failure_reported: bool,
    listener: Option<JoinHandle<()>>,
    initial: Option<JoinHandle<()>>,
    lookup: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl Control {
    fn loading(&self) -> bool {
        !self.resolved || self.lookup_pending || self.sign_outs_in_flight > 0
    }

    fn cancel_lookups(&mut self) {
        if let Some(lookup) = self.lookup.take() {
            lookup.abort();
        }
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }
}

impl AuthContext {
    /// Subscribes to the identity provider and starts resolving the session.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn mount(backend: AuthBackend, notifier: Arc<dyn Notifier>, options: AuthOptions) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::initial());
        let shared = Arc::new(Shared {
            backend,
            notifier,
            options,
            state,
            control: Mutex::new(Control {
                active: true,
                ..Control::default()
            }),
        });

        // Subscribe before asking for the session so no change is missed.
        let subscription = shared.backend.identity.on_auth_state_change();
        let listener = tokio::spawn(listen(Arc::clone(&shared), subscription));
        let initial = tokio::spawn(initialize(Arc::clone(&shared), 0));
        {
            let mut control = shared.lock();
            control.listener = Some(listener);
            control.initial = Some(initial);
        }

        debug!("auth context mounted");
        Self { shared }
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.state.subscribe()
    }

    /// Returns a guard for the admin area.
    #[must_use]
    pub fn admin_guard(&self) -> AdminRouteGuard {
        AdminRouteGuard::new(self.changes())
    }

    /// Checks `account_id` against the allow-list.
    ///
    /// The result is written into the state only if `account_id` still owns
    /// the current session and no newer notification has arrived. Errors
    /// count as "not admin".
    pub async fn check_admin_status(&self, account_id: &AccountId) -> bool {
        let generation = {
            let control = self.shared.lock();
            let current = self.shared.state.borrow();
            let owns_session = current
                .session()
                .is_some_and(|s| s.account_id() == account_id);
            (control.active && owns_session).then_some(control.generation)
        };

        let outcome = self.shared.lookup(account_id).await;
        let is_admin = matches!(outcome, Ok(AdminStatus { is_admin: true, .. }));
        if let Some(generation) = generation {
            Arc::clone(&self.shared).apply_lookup(generation, account_id, outcome, false);
        }
        is_admin
    }

    /// Signs the current user out.
    ///
    /// The outcome is also reported through the notifier. The session itself
    /// is cleared by the sign-out notification that follows.
    ///
    /// # Errors
    ///
    /// Returns the identity provider's error if sign-out failed.
    pub async fn sign_out(&self) -> Result<(), Report<BaasError>> {
        self.shared.begin_sign_out();
        let result = self.shared.backend.identity.sign_out().await;
        self.shared.end_sign_out();

        match &result {
            Ok(()) => {
                info!("signed out");
                self.shared
                    .notify(Notification::success("Signed out successfully"));
            }
            Err(e) => {
                error!(error = %e, "failed to sign out");
                self.shared.notify(Notification::error("Error signing out"));
            }
        }
        result
    }

    /// Unsubscribes and cancels all pending work. Idempotent.
    pub fn teardown(&self) {
        let mut control = self.shared.lock();
        if !control.active {
            return;
        }
        control.active = false;
        control.cancel_lookups();
        if let Some(listener) = control.listener.take() {
            listener.abort();
        }
        if let Some(initial) = control.initial.take() {
            initial.abort();
        }
        debug!(generation = control.generation, "auth context torn down");
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    async fn lookup(&self, account_id: &AccountId) -> Result<AdminStatus, Report<AdminCheckError>> {
        AdminLookup::new(
            self.backend.records.as_ref(),
            &self.options.admins_table,
            self.options.fallback,
        )
        .check(account_id)
        .await
    }

    /// Starts a new generation for `session`.
    ///
    /// With `expected`, applies only if the generation has not moved since
    /// the caller read it.
    fn replace_session(self: &Arc<Self>, expected: Option<u64>, session: Option<Session>) {
        let mut control = self.lock();
        if !control.active {
            return;
        }
        if expected.is_some_and(|expected| expected != control.generation) {
            debug!("initial session superseded by a change notification");
            return;
        }

        control.generation += 1;
        control.cancel_lookups();
        control.resolved = true;
        control.retries_used = 0;
        control.failure_reported = false;

        let generation = control.generation;
        let account_id = session.as_ref().map(|s| s.account_id().clone());
        control.lookup_pending = account_id.is_some();
        self.state
            .send_replace(AuthSnapshot::new(session, false, control.loading()));

        if let Some(account_id) = account_id {
            debug!(%account_id, generation, "checking admin status");
            control.lookup = Some(tokio::spawn(run_lookup(
                Arc::clone(self),
                generation,
                account_id,
            )));
        }
    }

    /// Marks the first resolution done without a session change.
    /// Returns false if a change notification got there first.
    fn resolve_without_session(&self, expected: u64) -> bool {
        let mut control = self.lock();
        if !control.active || control.generation != expected {
            return false;
        }
        control.resolved = true;
        let loading = control.loading();
        self.state.send_modify(|s| s.set_loading(loading));
        true
    }

    fn begin_sign_out(&self) {
        self.update_sign_outs(|in_flight| in_flight.saturating_add(1));
    }

    fn end_sign_out(&self) {
        self.update_sign_outs(|in_flight| in_flight.saturating_sub(1));
    }

    fn update_sign_outs(&self, update: impl FnOnce(u32) -> u32) {
        let mut control = self.lock();
        if !control.active {
            return;
        }
        control.sign_outs_in_flight = update(control.sign_outs_in_flight);
        let loading = control.loading();
        self.state.send_modify(|s| s.set_loading(loading));
    }

    /// Records a lookup result for `generation`. With `schedule_retry`, a
    /// negative result queues the next retry while attempts remain.
    fn apply_lookup(
        self: Arc<Self>,
        generation: u64,
        account_id: &AccountId,
        outcome: Result<AdminStatus, Report<AdminCheckError>>,
        schedule_retry: bool,
    ) {
        let mut control = self.lock();
        if !control.active || control.generation != generation {
            debug!(%account_id, generation, "discarding stale admin lookup");
            return;
        }

        let mut failure = None;
        let is_admin = match outcome {
            Ok(status) => {
                info!(%account_id, is_admin = status.is_admin, path = ?status.path, "admin status resolved");
                status.is_admin
            }
            Err(e) => {
                error!(%account_id, error = %e, "admin check failed");
                if !control.failure_reported {
                    control.failure_reported = true;
                    failure = Some(Notification::error("Could not verify admin access"));
                }
                false
            }
        };

        control.lookup_pending = false;
        let loading = control.loading();
        self.state.send_modify(|s| {
            s.set_admin(is_admin);
            s.set_loading(loading);
        });

        if is_admin {
            if let Some(retry) = control.retry.take() {
                retry.abort();
            }
        } else if schedule_retry && control.retries_used < self.options.retry.max_attempts() {
            let attempt = control.retries_used;
            control.retries_used += 1;
            let delay = self.options.retry.delay_for(attempt);
            let task = tokio::spawn(retry_after(
                Arc::clone(&self),
                generation,
                account_id.clone(),
                delay,
                attempt + 1,
            ));
            if let Some(previous) = control.retry.replace(task) {
                previous.abort();
            }
        }
        drop(control);

        if let Some(notification) = failure {
            self.notify(notification);
        }
    }

    /// Moves the retry timer that just fired into the lookup slot.
    /// Returns false if the retry belongs to an old generation.
    fn start_retry(&self, generation: u64) -> bool {
        let mut control = self.lock();
        if !control.active || control.generation != generation {
            return false;
        }
        control.lookup = control.retry.take();
        true
    }
}

async fn listen(shared: Arc<Shared>, mut subscription: AuthSubscription) {
    while let Some(change) = subscription.next().await {
        info!(
            event = %change.event,
            signed_in = change.session.is_some(),
            "auth state changed"
        );
        shared.replace_session(None, change.session);
    }
    debug!("auth subscription closed");
}

async fn initialize(shared: Arc<Shared>, generation: u64) {
    match shared.backend.identity.get_session().await {
        Ok(session) => {
            info!(signed_in = session.is_some(), "initial auth state");
            if session.is_some() {
                shared.replace_session(Some(generation), session);
            } else {
                shared.resolve_without_session(generation);
            }
        }
        Err(e) => {
            error!(error = %e, "failed to initialize auth");
            if shared.resolve_without_session(generation) {
                shared.notify(Notification::error("Could not restore your session"));
            }
        }
    }
}

async fn run_lookup(shared: Arc<Shared>, generation: u64, account_id: AccountId) {
    let outcome = shared.lookup(&account_id).await;
    shared.apply_lookup(generation, &account_id, outcome, true);
}

async fn retry_after(
    shared: Arc<Shared>,
    generation: u64,
    account_id: AccountId,
    delay: Duration,
    attempt: u32,
) {
    tokio::time::sleep(delay).await;
    if !shared.start_retry(generation) {
        return;
    }

    info!(
        %account_id,
        attempt,
        max_attempts = shared.options.retry.max_attempts(),
        "retrying admin check"
    );
    let outcome = shared.lookup(&account_id).await;
    shared.apply_lookup(generation, &account_id, outcome, true);
}
