use std::str::FromStr;
use std::sync::Arc;

use buzz_core::api::{FetchMode, GithubExecutor};
use buzz_core::config::SyncConfig;
use buzz_core::models::RepositoryId;
use buzz_core::mutation::MutationCoordinator;
use buzz_core::session::{SessionHandle, SessionSignal};
use buzz_core::store::{Action, NotificationState, StoreHandle};
use buzz_core::sync::{fetch_params, FetchCoordinator};
use buzz_core::{selectors, Notification, NotificationId};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config_profiles::CliConfig;
use crate::error::CliError;

const TITLE_PREVIEW_CHARS: usize = 72;

/// Store, session and executor for one CLI invocation.
pub struct BuzzContext {
    pub store: StoreHandle,
    pub session: SessionHandle,
    pub executor: Arc<GithubExecutor>,
    pub sync: SyncConfig,
}

impl BuzzContext {
    /// Load the config, log in with the configured token and mark the
    /// (empty) session as restored.
    pub fn open(poll_interval_override: Option<u64>) -> Result<Self, CliError> {
        let config = CliConfig::load().map_err(CliError::Config)?;
        let mut sync = config.effective_sync().map_err(CliError::Config)?;
        if let Some(seconds) = poll_interval_override {
            sync.poll_interval_secs = seconds;
            sync.validate()?;
        }
        let credential = config.credential().ok_or(CliError::NotLoggedIn)?;
        let executor = Arc::new(GithubExecutor::new(sync.api_base_url.clone())?);

        let session = SessionHandle::new();
        session.signal(SessionSignal::Rehydrated);
        session.signal(SessionSignal::LoginSucceeded(credential));

        Ok(Self {
            store: StoreHandle::new(),
            session,
            executor,
            sync,
        })
    }

    pub fn fetcher(&self) -> FetchCoordinator<GithubExecutor> {
        FetchCoordinator::new(
            Arc::clone(&self.executor),
            self.store.clone(),
            self.session.clone(),
            self.sync.request_timeout(),
        )
    }

    pub fn mutations(&self) -> MutationCoordinator<GithubExecutor> {
        MutationCoordinator::new(
            Arc::clone(&self.executor),
            self.store.clone(),
            self.session.clone(),
            self.sync.request_timeout(),
        )
    }

    /// One full fetch of the look-back window into the store.
    pub async fn fetch_all(&self) -> Result<usize, CliError> {
        let params = fetch_params(&self.sync, None, FetchMode::Full, Utc::now());
        Ok(self.fetcher().fetch(params).await?)
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationListItem {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub repository: String,
    pub repository_id: u64,
    pub reason: String,
    pub unread: bool,
    pub updated_at: Option<String>,
    pub relative_time: Option<String>,
}

pub fn notification_to_list_item(
    notification: &Notification,
    now: DateTime<Utc>,
) -> NotificationListItem {
    NotificationListItem {
        id: notification.id.to_string(),
        title: notification.subject.title.clone(),
        kind: notification.subject.kind.clone(),
        repository: notification.repository.full_name.clone(),
        repository_id: notification.repository.id.0,
        reason: notification.reason.clone(),
        unread: notification.is_unread(),
        updated_at: notification.updated_at.map(|at| at.to_rfc3339()),
        relative_time: notification
            .updated_at
            .map(|at| format_relative_time(at, now)),
    }
}

/// Notifications in display order, optionally only the unread ones.
pub fn select_notifications(
    state: &NotificationState,
    limit: usize,
    unread_only: bool,
) -> Vec<&Notification> {
    state
        .by_id
        .values()
        .filter(|notification| !unread_only || notification.is_unread())
        .take(limit)
        .collect()
}

pub fn format_notification_lines(
    notifications: &[&Notification],
    now: DateTime<Utc>,
) -> Vec<String> {
    notifications
        .iter()
        .map(|notification| {
            let marker = if notification.is_unread() { '*' } else { ' ' };
            let age = notification.updated_at.map_or_else(String::new, |at| {
                format!(" ({})", format_relative_time(at, now))
            });
            format!(
                "{marker} {}  {}  {}{age}",
                notification.id,
                notification.repository.full_name,
                notification.title_preview(TITLE_PREVIEW_CHARS)
            )
        })
        .collect()
}

pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - at).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn parse_notification_ids(raw: &[String]) -> Result<Vec<NotificationId>, CliError> {
    raw.iter()
        .map(|value| NotificationId::from_str(value).map_err(|_| CliError::EmptyNotificationId))
        .collect()
}

/// Human readable line for a store event, `None` for the quiet ones.
pub fn describe_action(action: &Action, state: &NotificationState) -> Option<String> {
    match action {
        Action::FetchSucceeded { mode, page, meta, .. } => {
            if meta.not_modified || page.is_empty() {
                return None;
            }
            Some(format!(
                "Synced {} notifications ({}), {} unread",
                page.len(),
                match mode {
                    FetchMode::Full => "full",
                    FetchMode::Incremental => "incremental",
                },
                selectors::unread_count(state)
            ))
        }
        Action::FetchFailed { failure, .. } => Some(format!(
            "Sync failed: {}{}",
            failure.message,
            if failure.recoverable {
                " (will retry)"
            } else {
                ""
            }
        )),
        Action::MarkAsReadSucceeded { ids } => Some(format!("Marked read: {}", join_ids(ids))),
        Action::MarkAsReadFailed { ids, failure } => Some(format!(
            "Could not mark {} as read: {}",
            join_ids(ids),
            failure.message
        )),
        Action::MarkAsUnread { ids, .. } => {
            Some(format!("Marked unread on this device: {}", join_ids(ids)))
        }
        Action::Archive { ids, all, .. } => Some(if *all {
            "Archived everything".to_string()
        } else {
            format!("Archived: {}", join_ids(ids))
        }),
        Action::SessionReset => Some("Session changed, cleared local notifications".to_string()),
        Action::SessionRestored
        | Action::FetchRequested { .. }
        | Action::MarkAsReadRequested { .. } => None,
    }
}

pub fn repository_label(state: &NotificationState, id: RepositoryId) -> String {
    selectors::repository_by_id(state, id).map_or_else(
        || format!("repository {id}"),
        |repository| repository.full_name.clone(),
    )
}

fn join_ids(ids: &[NotificationId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
