//! Fan-out of authentication state changes.
//!
//! The identity client owns an [`AuthEventHub`]; each call to
//! `on_auth_state_change` registers a listener and hands back an
//! [`AuthSubscription`]. Dropping or unsubscribing the subscription removes
//! the listener.

use crate::types::AuthStateChange;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace};

type Listeners = HashMap<u64, mpsc::UnboundedSender<AuthStateChange>>;

/// Registry of auth state listeners.
#[derive(Debug, Default)]
pub struct AuthEventHub {
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
}

impl AuthEventHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new listener.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>) -> AuthSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        debug!(subscription_id = id, "auth listener registered");

        AuthSubscription {
            id,
            receiver: rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Registers a new listener whose first message is `initial`.
    ///
    /// Other listeners do not see `initial`.
    #[must_use]
    pub fn subscribe_with(self: &Arc<Self>, initial: AuthStateChange) -> AuthSubscription {
        let subscription = self.subscribe();
        if let Some(tx) = self.lock().get(&subscription.id) {
            // The receiver is held by `subscription`, so this cannot fail.
            let _ = tx.send(initial);
        }
        subscription
    }

    /// Delivers a change to every live listener, pruning closed ones.
    pub fn emit(&self, change: AuthStateChange) {
        let mut listeners = self.lock();
        listeners.retain(|id, tx| {
            let delivered = tx.send(change.clone()).is_ok();
            if !delivered {
                trace!(subscription_id = id, "pruning closed auth listener");
            }
            delivered
        });
        debug!(event = %change.event, listeners = listeners.len(), "auth event emitted");
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            debug!(subscription_id = id, "auth listener removed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered interest in auth state changes.
#[derive(Debug)]
pub struct AuthSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<AuthStateChange>,
    hub: Weak<AuthEventHub>,
}

impl AuthSubscription {
    /// Waits for the next change. Returns `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<AuthStateChange> {
        self.receiver.recv().await
    }

    /// Stops receiving changes.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}
