//! Data models for Buzz

mod notification;
mod repository;

#[cfg(test)]
pub(crate) use notification::fixtures;
pub use notification::{Notification, NotificationId, Subject};
pub use repository::{Repository, RepositoryId};
