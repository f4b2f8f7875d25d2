//! Normalized notification state and the reducer folding actions into it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::action::Action;
use crate::api::ResponseMeta;
use crate::models::{Notification, NotificationId};
use crate::normalize::NormalizedPage;

/// Freshness bookkeeping next to the entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMeta {
    pub loading: bool,
    pub last_error: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Latest modification observed on the server; drives `If-Modified-Since`
    pub last_modified_at: Option<DateTime<Utc>>,
    /// Server-requested minimum polling interval (`X-Poll-Interval`)
    pub poll_interval_secs: Option<u64>,
}

/// Everything the store knows, keyed by thread id in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    pub by_id: IndexMap<NotificationId, Notification>,
    /// Archive time per removed thread, kept outside the entity map
    pub archived: BTreeMap<NotificationId, DateTime<Utc>>,
    pub meta: StoreMeta,
}

impl NotificationState {
    /// Remove the listed threads. Absent ids are ignored.
    #[must_use]
    pub fn apply_archive(mut self, ids: &[NotificationId], archived_at: DateTime<Utc>) -> Self {
        for id in ids {
            if self.by_id.shift_remove(id).is_some() {
                self.archived.insert(id.clone(), archived_at);
            }
        }
        self
    }

    /// Optimistically mark as read and drop any stale unread marker.
    #[must_use]
    pub fn begin_mark_as_read(mut self, ids: &[NotificationId], at: DateTime<Utc>) -> Self {
        self.update_present(ids, |notification| {
            notification.last_read_at = Some(at);
            notification.last_unread_at = None;
        });
        self
    }

    /// Undo `begin_mark_as_read` after a failed confirmation.
    #[must_use]
    pub fn rollback_mark_as_read(mut self, ids: &[NotificationId]) -> Self {
        self.update_present(ids, |notification| notification.last_read_at = None);
        self
    }

    /// Clear the remote unread flag once the server accepted the read.
    #[must_use]
    pub fn confirm_mark_as_read(mut self, ids: &[NotificationId]) -> Self {
        self.update_present(ids, |notification| notification.unread = false);
        self
    }

    /// Record a local unread intent. `unread` itself is never set here.
    #[must_use]
    pub fn begin_mark_as_unread(mut self, ids: &[NotificationId], at: DateTime<Utc>) -> Self {
        self.update_present(ids, |notification| notification.last_unread_at = Some(at));
        self
    }

    /// Merge a normalized fetch page and advance freshness metadata.
    #[must_use]
    pub fn merge_page(
        mut self,
        page: &NormalizedPage,
        meta: &ResponseMeta,
        received_at: DateTime<Utc>,
    ) -> Self {
        for id in &page.result {
            let Some(remote) = page.entities.get(id) else {
                continue;
            };

            if let Some(archived_at) = self.archived.get(id).copied() {
                if remote.updated_at.is_some_and(|updated| updated > archived_at) {
                    self.archived.remove(id);
                } else {
                    continue;
                }
            }

            let merged = match self.by_id.get(id) {
                Some(existing) => existing.merged_with_remote(remote.clone()),
                None => remote.clone(),
            };
            self.by_id.insert(id.clone(), merged);
        }

        self.by_id
            .sort_by(|_, left, _, right| right.updated_at.cmp(&left.updated_at));

        // A 304 confirms what we have; its Last-Modified says nothing new.
        if !meta.not_modified {
            let observed = meta.last_modified.or_else(|| page.max_updated_at());
            self.meta.last_modified_at = self.meta.last_modified_at.max(observed);
        }
        if meta.poll_interval_secs.is_some() {
            self.meta.poll_interval_secs = meta.poll_interval_secs;
        }
        self.meta.last_fetched_at = Some(received_at);
        self.meta.last_error = None;
        self.meta.loading = false;
        self
    }

    fn update_present(&mut self, ids: &[NotificationId], mut apply: impl FnMut(&mut Notification)) {
        for id in ids {
            if let Some(notification) = self.by_id.get_mut(id) {
                apply(notification);
            }
        }
    }
}

/// Fold one action into the state.
pub fn reduce(state: NotificationState, action: &Action) -> NotificationState {
    match action {
        Action::SessionReset => NotificationState::default(),
        Action::FetchRequested { .. } => NotificationState {
            meta: StoreMeta {
                loading: true,
                ..state.meta
            },
            ..state
        },
        Action::FetchSucceeded {
            page,
            meta,
            received_at,
            ..
        } => state.merge_page(page, meta, *received_at),
        Action::FetchFailed { failure, .. } => NotificationState {
            meta: StoreMeta {
                loading: false,
                last_error: Some(failure.message.clone()),
                ..state.meta
            },
            ..state
        },
        Action::MarkAsReadRequested { ids, at, .. } => state.begin_mark_as_read(ids, *at),
        Action::MarkAsReadSucceeded { ids } => state.confirm_mark_as_read(ids),
        Action::MarkAsReadFailed { ids, failure } => {
            let mut state = state.rollback_mark_as_read(ids);
            state.meta.last_error = Some(failure.message.clone());
            state
        }
        Action::MarkAsUnread { ids, at } => state.begin_mark_as_unread(ids, *at),
        Action::Archive { ids, at, .. } => state.apply_archive(ids, *at),
        Action::SessionRestored => state,
    }
}
