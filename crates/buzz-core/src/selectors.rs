//! Read-only derivations over the store and session state.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;

use crate::models::{Notification, NotificationId, Repository, RepositoryId};
use crate::session::SessionState;
use crate::store::NotificationState;

pub fn notification<'a>(
    state: &'a NotificationState,
    id: &NotificationId,
) -> Option<&'a Notification> {
    state.by_id.get(id)
}

/// Repository of a single notification.
pub fn repository_for<'a>(
    state: &'a NotificationState,
    id: &NotificationId,
) -> Option<&'a Repository> {
    notification(state, id).map(|notification| &notification.repository)
}

/// Any known repository with the given id.
pub fn repository_by_id(state: &NotificationState, id: RepositoryId) -> Option<&Repository> {
    state
        .by_id
        .values()
        .map(|notification| &notification.repository)
        .find(|repository| repository.id == id)
}

pub fn read_ids(state: &NotificationState) -> BTreeSet<NotificationId> {
    state
        .by_id
        .values()
        .filter(|notification| !notification.is_unread())
        .map(|notification| notification.id.clone())
        .collect()
}

pub fn unread_ids(state: &NotificationState) -> BTreeSet<NotificationId> {
    state
        .by_id
        .values()
        .filter(|notification| notification.is_unread())
        .map(|notification| notification.id.clone())
        .collect()
}

pub fn archived_ids(state: &NotificationState) -> BTreeSet<NotificationId> {
    state.archived.keys().cloned().collect()
}

pub fn unread_count(state: &NotificationState) -> usize {
    state
        .by_id
        .values()
        .filter(|notification| notification.is_unread())
        .count()
}

/// Ids in display order.
pub fn visible_ids(state: &NotificationState) -> Vec<NotificationId> {
    state.by_id.keys().cloned().collect()
}

/// Notifications grouped by repository full name, groups in display order.
pub fn grouped_by_repository(state: &NotificationState) -> IndexMap<String, Vec<&Notification>> {
    let mut groups: IndexMap<String, Vec<&Notification>> = IndexMap::new();
    for notification in state.by_id.values() {
        groups
            .entry(notification.repository.full_name.clone())
            .or_default()
            .push(notification);
    }
    groups
}

pub const fn last_modified_at(state: &NotificationState) -> Option<DateTime<Utc>> {
    state.meta.last_modified_at
}

/// True when nothing was fetched yet or the last fetch is older than `max_age`.
pub fn is_stale(state: &NotificationState, now: DateTime<Utc>, max_age: TimeDelta) -> bool {
    state
        .meta
        .last_fetched_at
        .map_or(true, |fetched_at| now - fetched_at > max_age)
}

pub const fn is_logged_in(session: &SessionState) -> bool {
    session.is_logged_in()
}
