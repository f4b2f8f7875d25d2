//! Notification model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Repository;

/// Opaque GitHub thread identifier, stable across syncs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NotificationId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Notification id cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What the notification is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub title: String,
    /// `Issue`, `PullRequest`, `Release`, ...
    pub kind: String,
    pub url: Option<String>,
    pub latest_comment_url: Option<String>,
}

/// A notification thread as held in the entity store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    /// Remote unread flag. Cleared locally only after the server confirms a read.
    pub unread: bool,
    pub reason: String,
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic read marker, reset on rollback
    pub last_read_at: Option<DateTime<Utc>>,
    /// Local "mark as unread" intent. GitHub has no endpoint for it.
    pub last_unread_at: Option<DateTime<Utc>>,
    pub subject: Subject,
    pub repository: Repository,
    pub url: Option<String>,
}

impl Notification {
    /// Derived unread status.
    ///
    /// A local unread marker newer than the read marker wins; otherwise the
    /// thread is unread while the remote flag is set and no read has been
    /// issued for it.
    #[must_use]
    pub fn is_unread(&self) -> bool {
        let marked_unread = match (self.last_unread_at, self.last_read_at) {
            (Some(unread_at), Some(read_at)) => unread_at > read_at,
            (Some(_), None) => true,
            (None, _) => false,
        };
        marked_unread || (self.unread && self.last_read_at.is_none())
    }

    /// Merge a freshly fetched copy of this thread over the local one.
    ///
    /// Remote fields win. `last_unread_at` only exists locally and survives.
    /// A remote `unread = true` carries `last_read_at = None` out of the
    /// normalizer, which clears any optimistic read marker.
    #[must_use]
    pub fn merged_with_remote(&self, remote: Self) -> Self {
        let last_read_at = if remote.unread {
            remote.last_read_at
        } else {
            remote.last_read_at.max(self.last_read_at)
        };
        Self {
            last_read_at,
            last_unread_at: self.last_unread_at,
            ..remote
        }
    }

    /// Title truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.subject.title.chars().take(max_len).collect()
    }
}
