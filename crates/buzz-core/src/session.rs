//! Session state fed by rehydration, login and logout signals.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::{Error, Result};

/// GitHub access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::InvalidInput(
                "GitHub token must not be empty".to_string(),
            ));
        }
        Ok(Self { token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Signals produced outside the sync core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// Persisted state finished loading
    Rehydrated,
    LoginSucceeded(Credential),
    Logout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub rehydrated: bool,
    pub credential: Option<Credential>,
    /// Bumped on every login or logout
    pub generation: u64,
}

impl SessionState {
    pub const fn is_logged_in(&self) -> bool {
        self.credential.is_some()
    }

    /// Credential for a remote call, or an authentication error.
    pub fn authenticate(&self) -> Result<Credential> {
        self.credential.clone().ok_or(Error::Authentication)
    }

    #[must_use]
    pub fn apply(mut self, signal: SessionSignal) -> Self {
        match signal {
            SessionSignal::Rehydrated => self.rehydrated = true,
            SessionSignal::LoginSucceeded(credential) => {
                self.credential = Some(credential);
                self.generation += 1;
            }
            SessionSignal::Logout => {
                self.credential = None;
                self.generation += 1;
            }
        }
        self
    }
}

/// Shared session publisher.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn signal(&self, signal: SessionSignal) {
        let name = match &signal {
            SessionSignal::Rehydrated => "rehydrated",
            SessionSignal::LoginSucceeded(_) => "login",
            SessionSignal::Logout => "logout",
        };
        tracing::info!("Session signal: {name}");
        self.state
            .send_modify(|state| *state = std::mem::take(state).apply(signal));
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Run `apply` only if the session is still at `generation`. Signals
    /// block until `apply` returns, so it cannot interleave with a login or
    /// logout.
    pub fn if_generation<T>(&self, generation: u64, apply: impl FnOnce() -> T) -> Option<T> {
        let state = self.state.borrow();
        (state.generation == generation).then(apply)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}
