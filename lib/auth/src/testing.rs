//! In-memory backend fakes shared by this crate's tests.

use crate::notify::{Notification, Notifier};
use async_trait::async_trait;
use rootcause::prelude::Report;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storefront_baas::{
    AuthChangeEvent, AuthEventHub, AuthStateChange, AuthSubscription, BaasError,
    IdentityProvider, Query, RecordStore, Row, Session,
};
use tokio::sync::Semaphore;

pub(crate) fn session(account: &str) -> Session {
    Session::new(account.parse().unwrap(), format!("token-{account}"))
        .with_email(Some(format!("{account}@example.com")))
}

/// Allow-list store with switchable failures, delayed visibility, and an
/// optional gate that holds every query until released.
pub(crate) struct FakeRecords {
    rows: Mutex<Vec<Row>>,
    fail_filtered: AtomicBool,
    fail_scan: AtomicBool,
    calls: AtomicUsize,
    hidden_calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl FakeRecords {
    pub(crate) fn with_admins(accounts: &[&str]) -> Self {
        let rows = accounts
            .iter()
            .enumerate()
            .map(|(i, account)| {
                let mut row = Row::new();
                row.insert("id".to_string(), serde_json::json!(format!("adm-{i}")));
                row.insert("user_id".to_string(), serde_json::json!(account));
                row
            })
            .collect();

        Self {
            rows: Mutex::new(rows),
            fail_filtered: AtomicBool::new(false),
            fail_scan: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            hidden_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub(crate) fn release(&self, queries: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(queries);
        }
    }

    pub(crate) fn fail_filtered(&self, fail: bool) {
        self.fail_filtered.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    /// The first `calls` queries see an empty allow-list.
    pub(crate) fn hide_for(&self, calls: usize) {
        self.hidden_calls.store(calls, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_calls(&self, calls: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < calls {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("timed out waiting for queries");
    }
}

#[async_trait]
impl RecordStore for FakeRecords {
    async fn select(&self, _table: &str, query: &Query) -> Result<Vec<Row>, Report<BaasError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let filtered = !query.filters().is_empty();
        if filtered && self.fail_filtered.load(Ordering::SeqCst) {
            return Err(BaasError::RequestFailed {
                status: 500,
                message: "filtered query unavailable".to_string(),
            }
            .into());
        }
        if !filtered && self.fail_scan.load(Ordering::SeqCst) {
            return Err(BaasError::RequestFailed {
                status: 500,
                message: "scan unavailable".to_string(),
            }
            .into());
        }
        if call <= self.hidden_calls.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect())
    }

    async fn insert(&self, _table: &str, rows: Vec<Row>) -> Result<Vec<Row>, Report<BaasError>> {
        self.rows.lock().unwrap().extend(rows.iter().cloned());
        Ok(rows)
    }
}

/// Identity provider whose sign-in and sign-out are driven by the test.
pub(crate) struct FakeIdentity {
    hub: Arc<AuthEventHub>,
    session: Mutex<Option<Session>>,
    fail_get_session: AtomicBool,
    fail_sign_out: AtomicBool,
    gate: Option<Semaphore>,
    sign_out_gate: Option<Semaphore>,
    sign_out_calls: AtomicUsize,
}

impl FakeIdentity {
    pub(crate) fn new(session: Option<Session>) -> Self {
        Self {
            hub: AuthEventHub::new(),
            session: Mutex::new(session),
            fail_get_session: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            gate: None,
            sign_out_gate: None,
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// `get_session` waits for [`FakeIdentity::release`].
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// `sign_out` waits for [`FakeIdentity::release_sign_outs`].
    pub(crate) fn gated_sign_out(mut self) -> Self {
        self.sign_out_gate = Some(Semaphore::new(0));
        self
    }

    pub(crate) fn release_sign_outs(&self, calls: usize) {
        if let Some(gate) = &self.sign_out_gate {
            gate.add_permits(calls);
        }
    }

    pub(crate) async fn wait_for_sign_out_calls(&self, calls: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.sign_out_calls.load(Ordering::SeqCst) < calls {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("timed out waiting for sign-out calls");
    }

    pub(crate) fn fail_get_session(&self, fail: bool) {
        self.fail_get_session.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn sign_in(&self, session: Session) {
        *self.session.lock().unwrap() = Some(session.clone());
        self.hub
            .emit(AuthStateChange::new(AuthChangeEvent::SignedIn, Some(session)));
    }

    pub(crate) fn expire(&self) {
        *self.session.lock().unwrap() = None;
        self.hub
            .emit(AuthStateChange::new(AuthChangeEvent::SignedOut, None));
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn get_session(&self) -> Result<Option<Session>, Report<BaasError>> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.fail_get_session.load(Ordering::SeqCst) {
            return Err(BaasError::ConnectionFailed {
                details: "identity service unreachable".to_string(),
            }
            .into());
        }
        Ok(self.session.lock().unwrap().clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.hub.subscribe()
    }

    async fn sign_out(&self) -> Result<(), Report<BaasError>> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.sign_out_gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(BaasError::RequestFailed {
                status: 503,
                message: "logout unavailable".to_string(),
            }
            .into());
        }
        self.expire();
        Ok(())
    }
}

/// Notifier that remembers everything it was given.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}
