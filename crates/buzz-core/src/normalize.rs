//! Flattening of raw GitHub notification payloads into store entities.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::models::{Notification, NotificationId, Repository, RepositoryId, Subject};
use crate::Result;

/// Normalized fetch result: entities keyed by id plus the response order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedPage {
    pub entities: IndexMap<NotificationId, Notification>,
    pub result: Vec<NotificationId>,
}

impl NormalizedPage {
    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }

    /// Append the following page. Ids already seen keep their position and
    /// take the later payload.
    pub fn append(&mut self, next: Self) {
        for (id, notification) in next.entities {
            if self.entities.insert(id.clone(), notification).is_none() {
                self.result.push(id);
            }
        }
    }

    /// Latest `updated_at` in the page.
    pub fn max_updated_at(&self) -> Option<DateTime<Utc>> {
        self.entities
            .values()
            .filter_map(|notification| notification.updated_at)
            .max()
    }
}

/// Normalize a `GET /notifications` body.
///
/// A `null` body (for example a `304 Not Modified`) yields an empty page.
/// Duplicate ids collapse onto their last occurrence, keeping first position.
pub fn normalize_notifications(data: &serde_json::Value) -> Result<NormalizedPage> {
    if data.is_null() {
        return Ok(NormalizedPage::default());
    }

    let raw: Vec<RawNotification> = serde_json::from_value(data.clone())?;
    let mut page = NormalizedPage::default();
    for item in raw {
        let notification = Notification::from(item);
        let id = notification.id.clone();
        if page.entities.insert(id.clone(), notification).is_none() {
            page.result.push(id);
        }
    }
    Ok(page)
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    id: String,
    unread: bool,
    #[serde(default)]
    reason: String,
    updated_at: Option<DateTime<Utc>>,
    last_read_at: Option<DateTime<Utc>>,
    subject: RawSubject,
    repository: RawRepository,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
    url: Option<String>,
    latest_comment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    full_name: String,
    owner: Option<RawOwner>,
    #[serde(default)]
    private: bool,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

impl From<RawNotification> for Notification {
    fn from(value: RawNotification) -> Self {
        // A thread GitHub still reports unread has no read marker locally,
        // whatever read time it carries from earlier activity.
        let last_read_at = if value.unread {
            None
        } else {
            value.last_read_at
        };

        Self {
            id: NotificationId::new(value.id),
            unread: value.unread,
            reason: value.reason,
            updated_at: value.updated_at,
            last_read_at,
            last_unread_at: None,
            subject: Subject {
                title: value.subject.title,
                kind: value.subject.kind,
                url: value.subject.url,
                latest_comment_url: value.subject.latest_comment_url,
            },
            repository: value.repository.into(),
            url: value.url,
        }
    }
}

impl From<RawRepository> for Repository {
    fn from(value: RawRepository) -> Self {
        Self {
            id: RepositoryId(value.id),
            name: value.name,
            full_name: value.full_name,
            owner: value.owner.map(|owner| owner.login).unwrap_or_default(),
            private: value.private,
            html_url: value.html_url,
        }
    }
}
