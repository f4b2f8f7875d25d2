//! Entity store: a single fold point over [`Action`]s.
//!
//! Producers (the sync loop, the mutation coordinator, the presentation layer)
//! only ever call [`StoreHandle::dispatch`]. Each dispatch folds one action
//! through [`reduce`] and publishes the resulting snapshot, so readers never
//! observe a half-applied event.

mod action;
mod state;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

pub use action::{Action, FailureEvent, ReadScope};
pub use state::{reduce, NotificationState, StoreMeta};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Cheaply clonable access to the shared notification state.
#[derive(Clone)]
pub struct StoreHandle {
    state: Arc<watch::Sender<Arc<NotificationState>>>,
    events: broadcast::Sender<Action>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::with_state(NotificationState::default())
    }

    /// Start from an already rehydrated state.
    pub fn with_state(state: NotificationState) -> Self {
        let (state, _) = watch::channel(Arc::new(state));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(state),
            events,
        }
    }

    /// Fold `action` into the store and notify observers.
    ///
    /// Dispatches are applied one at a time, in call order.
    pub fn dispatch(&self, action: Action) {
        tracing::trace!("Dispatching {}", action.name());
        if let Some(failure) = action.failure() {
            tracing::warn!("{} failed: {}", failure.operation, failure.message);
        }

        self.state.send_modify(|current| {
            let previous = std::mem::take(current);
            *current = Arc::new(reduce(Arc::unwrap_or_clone(previous), &action));
            // No subscribers is fine.
            let _ = self.events.send(action);
        });
    }

    /// Current state.
    pub fn snapshot(&self) -> Arc<NotificationState> {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    pub fn watch(&self) -> watch::Receiver<Arc<NotificationState>> {
        self.state.subscribe()
    }

    /// Stream of applied actions, failures included.
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.events.subscribe()
    }
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new()
    }
}
