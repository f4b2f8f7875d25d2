//! Events consumed by the notification reducer.

use chrono::{DateTime, Utc};

use crate::api::{FetchMode, ResponseMeta};
use crate::models::{NotificationId, RepositoryId};
use crate::normalize::NormalizedPage;
use crate::Error;

/// Which remote shape a mark-as-read request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    /// Per-thread calls for the listed ids
    Threads,
    /// Every notification of one repository
    Repository(RepositoryId),
    /// Every notification of the account
    All,
}

/// Failure report handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEvent {
    pub operation: &'static str,
    pub message: String,
    pub recoverable: bool,
}

impl FailureEvent {
    pub fn from_error(operation: &'static str, error: &Error) -> Self {
        Self {
            operation,
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        }
    }
}

/// Lifecycle event. Every store change is one of these.
///
/// Timestamps are captured when the event is built, so folding the same
/// sequence twice yields the same state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Persisted state has been rehydrated
    SessionRestored,
    /// The account changed; drop everything known about the previous one
    SessionReset,
    FetchRequested {
        mode: FetchMode,
        requested_at: DateTime<Utc>,
    },
    FetchSucceeded {
        mode: FetchMode,
        page: NormalizedPage,
        meta: ResponseMeta,
        received_at: DateTime<Utc>,
    },
    FetchFailed {
        mode: FetchMode,
        failure: FailureEvent,
    },
    /// Optimistic read (`beginMarkAsRead`)
    MarkAsReadRequested {
        ids: Vec<NotificationId>,
        scope: ReadScope,
        at: DateTime<Utc>,
    },
    /// Server confirmed (`confirmMarkAsRead`)
    MarkAsReadSucceeded { ids: Vec<NotificationId> },
    /// Server refused or timed out (`rollbackMarkAsRead`)
    MarkAsReadFailed {
        ids: Vec<NotificationId>,
        failure: FailureEvent,
    },
    /// Local-only unread marker (`beginMarkAsUnread`)
    MarkAsUnread {
        ids: Vec<NotificationId>,
        at: DateTime<Utc>,
    },
    /// Remove from the store (`applyArchive`)
    Archive {
        ids: Vec<NotificationId>,
        all: bool,
        at: DateTime<Utc>,
    },
}

impl Action {
    pub fn fetch_requested(mode: FetchMode) -> Self {
        Self::FetchRequested {
            mode,
            requested_at: Utc::now(),
        }
    }

    pub fn mark_as_read_requested(
        ids: Vec<NotificationId>,
        scope: ReadScope,
        at: Option<DateTime<Utc>>,
    ) -> Self {
        Self::MarkAsReadRequested {
            ids,
            scope,
            at: at.unwrap_or_else(Utc::now),
        }
    }

    pub fn mark_as_unread(ids: Vec<NotificationId>, at: Option<DateTime<Utc>>) -> Self {
        Self::MarkAsUnread {
            ids,
            at: at.unwrap_or_else(Utc::now),
        }
    }

    pub fn archive(ids: Vec<NotificationId>, all: bool) -> Self {
        Self::Archive {
            ids,
            all,
            at: Utc::now(),
        }
    }

    /// Failure carried by this event, if any.
    pub const fn failure(&self) -> Option<&FailureEvent> {
        match self {
            Self::FetchFailed { failure, .. } | Self::MarkAsReadFailed { failure, .. } => {
                Some(failure)
            }
            _ => None,
        }
    }

    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionRestored => "session_restored",
            Self::SessionReset => "session_reset",
            Self::FetchRequested { .. } => "fetch_requested",
            Self::FetchSucceeded { .. } => "fetch_succeeded",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::MarkAsReadRequested { .. } => "mark_as_read_requested",
            Self::MarkAsReadSucceeded { .. } => "mark_as_read_succeeded",
            Self::MarkAsReadFailed { .. } => "mark_as_read_failed",
            Self::MarkAsUnread { .. } => "mark_as_unread",
            Self::Archive { .. } => "archive",
        }
    }
}
