//! Background notification polling.
//!
//! The orchestrator is one long-lived task:
//!
//! - waits for the session to be restored,
//! - fetches the full look-back window at startup and after every login or
//!   logout,
//! - then fetches incrementally (`If-Modified-Since`) once per cycle,
//! - and idles while no one is logged in.
//!
//! It never holds notification data. Fetch results go through the store like
//! every other event.

mod fetch;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::{FetchMode, FetchParams, RequestExecutor};
use crate::config::{SyncConfig, MAX_POLL_INTERVAL_SECS};
use crate::selectors;
use crate::session::SessionHandle;
use crate::store::{Action, StoreHandle};

pub use fetch::FetchCoordinator;

/// Where the polling loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    WaitingForSession,
    FullSync,
    IncrementalSync,
    Suspended,
    Stopped,
}

/// Handle to a running orchestrator.
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    mode: watch::Receiver<SyncMode>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn mode(&self) -> SyncMode {
        *self.mode.borrow()
    }

    pub fn mode_changes(&self) -> watch::Receiver<SyncMode> {
        self.mode.clone()
    }

    /// Stop the loop and wait for it to exit. In-flight fetches finish on
    /// their own tasks.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(error) = self.task.await {
            tracing::error!("Sync task ended abnormally: {}", error);
        }
    }
}

pub struct SyncOrchestrator<E> {
    fetcher: FetchCoordinator<E>,
    store: StoreHandle,
    session: SessionHandle,
    config: SyncConfig,
}

impl<E: RequestExecutor> SyncOrchestrator<E> {
    pub fn new(
        executor: Arc<E>,
        store: StoreHandle,
        session: SessionHandle,
        config: SyncConfig,
    ) -> Self {
        let fetcher = FetchCoordinator::new(
            executor,
            store.clone(),
            session.clone(),
            config.request_timeout(),
        );
        Self {
            fetcher,
            store,
            session,
            config,
        }
    }

    /// Start the polling task.
    pub fn spawn(self) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mode_tx, mode_rx) = watch::channel(SyncMode::WaitingForSession);
        let task = tokio::spawn(self.run(shutdown_rx, mode_tx));
        SyncHandle {
            shutdown: shutdown_tx,
            mode: mode_rx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>, mode: watch::Sender<SyncMode>) {
        let mut session = self.session.subscribe();

        set_mode(&mode, SyncMode::WaitingForSession);
        tokio::select! {
            restored = async { session.wait_for(|state| state.rehydrated).await.is_ok() } => {
                if !restored {
                    set_mode(&mode, SyncMode::Stopped);
                    return;
                }
            }
            () = shutdown_requested(&mut shutdown) => {
                set_mode(&mode, SyncMode::Stopped);
                return;
            }
        }
        self.store.dispatch(Action::SessionRestored);

        let mut generation = session.borrow_and_update().generation;
        let mut next = FetchMode::Full;

        loop {
            let current = session.borrow_and_update().clone();
            if current.generation != generation {
                tracing::info!(
                    "Session changed (logged_in={}), clearing notifications",
                    current.is_logged_in()
                );
                generation = current.generation;
                next = FetchMode::Full;
                // Nothing from the previous account survives, tombstones and
                // last modification included.
                self.store.dispatch(Action::SessionReset);
            }

            if !selectors::is_logged_in(&current) {
                set_mode(&mode, SyncMode::Suspended);
                tokio::select! {
                    () = tokio::time::sleep(self.config.suspended_recheck()) => continue,
                    () = shutdown_requested(&mut shutdown) => break,
                }
            }

            let params = fetch_params(
                &self.config,
                selectors::last_modified_at(&self.store.snapshot()),
                next,
                Utc::now(),
            );
            set_mode(
                &mode,
                match next {
                    FetchMode::Full => SyncMode::FullSync,
                    FetchMode::Incremental => SyncMode::IncrementalSync,
                },
            );
            tracing::debug!(
                "Sync tick: mode={:?}, if_modified_since={:?}",
                params.mode,
                params.if_modified_since
            );
            // Detached: the result lands in the store, not here, and only
            // while this session lasts.
            drop(self.fetcher.spawn_fetch(generation, params));

            let seen = generation;
            let started = Instant::now();
            tokio::select! {
                () = self.wait_for_next_cycle(started) => next = FetchMode::Incremental,
                alive = async { session.wait_for(|state| state.generation != seen).await.is_ok() } => {
                    if !alive {
                        break;
                    }
                }
                () = shutdown_requested(&mut shutdown) => break,
            }
        }

        set_mode(&mode, SyncMode::Stopped);
        tracing::info!("Notification sync stopped");
    }

    /// Sleeps out the configured period, then keeps sleeping if the fetch
    /// started at `started` came back with a longer `X-Poll-Interval`.
    async fn wait_for_next_cycle(&self, started: Instant) {
        let base = self.config.poll_interval();
        let mut deadline = cycle_deadline(started, base);
        loop {
            tokio::time::sleep_until(deadline).await;
            let period = cycle_period(base, self.store.snapshot().meta.poll_interval_secs);
            let stretched = cycle_deadline(started, period);
            if stretched <= deadline {
                break;
            }
            deadline = stretched;
        }
    }
}

/// Configured period, stretched to the server's `X-Poll-Interval` but never
/// past [`MAX_POLL_INTERVAL_SECS`].
fn cycle_period(configured: Duration, requested_secs: Option<u64>) -> Duration {
    let ceiling = Duration::from_secs(MAX_POLL_INTERVAL_SECS);
    let requested = requested_secs.map_or(Duration::ZERO, Duration::from_secs);
    configured.max(requested.min(ceiling))
}

fn cycle_deadline(started: Instant, period: Duration) -> Instant {
    started
        .checked_add(period)
        .or_else(|| started.checked_add(Duration::from_secs(MAX_POLL_INTERVAL_SECS)))
        .unwrap_or(started)
}

/// Parameters for a fetch at `now`. Incremental fetches never look further
/// back than the full window.
pub fn fetch_params(
    config: &SyncConfig,
    last_modified_at: Option<DateTime<Utc>>,
    mode: FetchMode,
    now: DateTime<Utc>,
) -> FetchParams {
    let floor = now - config.lookback();
    let if_modified_since = match mode {
        FetchMode::Full => None,
        FetchMode::Incremental => {
            Some(last_modified_at.map_or(floor, |modified| modified.max(floor)))
        }
    };
    FetchParams {
        mode,
        all: true,
        since: floor,
        if_modified_since,
        per_page: config.per_page,
        page: 1,
    }
}

fn set_mode(sender: &watch::Sender<SyncMode>, next: SyncMode) {
    sender.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        tracing::info!("Sync mode {:?} -> {:?}", current, next);
        *current = next;
        true
    });
}

/// Resolves once shutdown is requested or the handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // An error means the sender was dropped, which also stops the loop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
