//! Request executor seam between the sync core and the GitHub REST API.
//!
//! Every remote interaction is one [`ApiRequest`], identified by its
//! [`Operation`] name. GitHub offers no "mark as unread" endpoint, so there is
//! deliberately no such operation here: unread is tracked locally only.

mod github;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::NotificationId;
use crate::session::Credential;
use crate::{Error, Result};

pub use github::{GithubExecutor, DEFAULT_API_BASE_URL};

/// Named remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchNotifications,
    MarkAllNotificationsAsRead,
    MarkAllNotificationsAsReadForRepo,
    MarkNotificationThreadAsRead,
}

impl Operation {
    pub const fn name(self) -> &'static str {
        match self {
            Self::FetchNotifications => "FETCH_NOTIFICATIONS",
            Self::MarkAllNotificationsAsRead => "MARK_ALL_NOTIFICATIONS_AS_READ",
            Self::MarkAllNotificationsAsReadForRepo => "MARK_ALL_NOTIFICATIONS_AS_READ_FOR_REPO",
            Self::MarkNotificationThreadAsRead => "MARK_NOTIFICATION_THREAD_AS_READ",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Full window fetch or conditional fetch since the last modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Full,
    Incremental,
}

/// Parameters of `FETCH_NOTIFICATIONS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    pub mode: FetchMode,
    /// Include read notifications too
    pub all: bool,
    /// Look-back floor
    pub since: DateTime<Utc>,
    /// Sent as `If-Modified-Since` for incremental fetches
    pub if_modified_since: Option<DateTime<Utc>>,
    pub per_page: u32,
    /// 1-based page number
    pub page: u32,
}

impl FetchParams {
    /// The same query, one page further.
    #[must_use]
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }
}

/// One remote call and its parameter object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    FetchNotifications(FetchParams),
    MarkAllNotificationsAsRead {
        last_read_at: DateTime<Utc>,
    },
    MarkAllNotificationsAsReadForRepo {
        owner: String,
        repo: String,
        last_read_at: DateTime<Utc>,
    },
    MarkNotificationThreadAsRead {
        thread_id: NotificationId,
    },
}

impl ApiRequest {
    pub const fn operation(&self) -> Operation {
        match self {
            Self::FetchNotifications(_) => Operation::FetchNotifications,
            Self::MarkAllNotificationsAsRead { .. } => Operation::MarkAllNotificationsAsRead,
            Self::MarkAllNotificationsAsReadForRepo { .. } => {
                Operation::MarkAllNotificationsAsReadForRepo
            }
            Self::MarkNotificationThreadAsRead { .. } => Operation::MarkNotificationThreadAsRead,
        }
    }
}

/// Response metadata lifted from status and headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    /// `Last-Modified`
    pub last_modified: Option<DateTime<Utc>>,
    /// `X-Poll-Interval`
    pub poll_interval_secs: Option<u64>,
    /// `304 Not Modified`
    pub not_modified: bool,
    /// `Link` header carries a `rel="next"` page
    pub has_next_page: bool,
}

/// `{data, meta}` as returned by an executor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub data: serde_json::Value,
    pub meta: ResponseMeta,
}

/// Executes named operations against the remote.
///
/// Implementations report rejected calls and network failures as
/// [`crate::Error::Transport`] (or [`crate::Error::Http`]); timeouts are
/// applied by the callers.
pub trait RequestExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        credential: &Credential,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse>> + Send;
}

/// Run `request` against `executor`, failing with [`Error::Timeout`] once
/// `budget` elapses. A late answer is dropped with the cancelled future.
pub async fn execute_with_timeout<E: RequestExecutor>(
    executor: &E,
    credential: &Credential,
    request: ApiRequest,
    budget: Duration,
) -> Result<ApiResponse> {
    let operation = request.operation();
    tokio::time::timeout(budget, executor.execute(credential, request))
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout {
                operation: operation.name(),
                after: budget,
            })
        })
}
