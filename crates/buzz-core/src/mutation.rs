//! User-initiated read state changes.
//!
//! Mark-as-read is optimistic: the store is updated first, then the server is
//! asked to confirm. A rejected or timed out call rolls the local change back
//! and reports a failure event. Mark-as-unread and archive never leave the
//! device, since GitHub has no endpoint for either.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::api::{execute_with_timeout, ApiRequest, Operation, RequestExecutor};
use crate::models::{NotificationId, RepositoryId};
use crate::selectors;
use crate::session::{Credential, SessionHandle};
use crate::store::{Action, FailureEvent, ReadScope, StoreHandle};
use crate::{Error, Result};

/// A mark-as-read request from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkAsReadRequest {
    pub ids: Vec<NotificationId>,
    pub scope: ReadScope,
    /// Effective read time, `now` when unset
    pub at: Option<DateTime<Utc>>,
}

impl MarkAsReadRequest {
    pub fn threads(ids: Vec<NotificationId>) -> Self {
        Self {
            ids,
            scope: ReadScope::Threads,
            at: None,
        }
    }

    pub fn repository(ids: Vec<NotificationId>, repository: RepositoryId) -> Self {
        Self {
            ids,
            scope: ReadScope::Repository(repository),
            at: None,
        }
    }

    pub fn all(ids: Vec<NotificationId>) -> Self {
        Self {
            ids,
            scope: ReadScope::All,
            at: None,
        }
    }

    #[must_use]
    pub const fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }
}

/// What happened to each id of a successful request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkAsReadOutcome {
    /// Confirmed by the server
    pub confirmed: Vec<NotificationId>,
    /// Already read remotely; confirmed without a call
    pub skipped: Vec<NotificationId>,
}

pub struct MutationCoordinator<E> {
    executor: Arc<E>,
    store: StoreHandle,
    session: SessionHandle,
    timeout: Duration,
}

impl<E> Clone for MutationCoordinator<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            store: self.store.clone(),
            session: self.session.clone(),
            timeout: self.timeout,
        }
    }
}

impl<E: RequestExecutor> MutationCoordinator<E> {
    pub const fn new(
        executor: Arc<E>,
        store: StoreHandle,
        session: SessionHandle,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            store,
            session,
            timeout,
        }
    }

    /// Mark threads as read, optimistically.
    ///
    /// `Ok` means every id ended up confirmed. On error the ids whose call
    /// failed have been rolled back and a `MarkAsReadFailed` event was
    /// dispatched for them; ids confirmed before the failure stay confirmed.
    pub async fn mark_as_read(&self, request: MarkAsReadRequest) -> Result<MarkAsReadOutcome> {
        let MarkAsReadRequest { ids, scope, at } = request;
        let at = at.unwrap_or_else(Utc::now);
        self.store
            .dispatch(Action::mark_as_read_requested(ids.clone(), scope, Some(at)));

        match scope {
            ReadScope::Threads => self.read_threads(ids).await,
            ReadScope::Repository(repository) => {
                let target = self.resolve_repository(repository);
                let outcome = match target {
                    Ok((owner, repo)) => {
                        self.read_in_one_call(
                            &ids,
                            ApiRequest::MarkAllNotificationsAsReadForRepo {
                                owner,
                                repo,
                                last_read_at: at,
                            },
                        )
                        .await
                    }
                    Err(error) => Err((
                        Operation::MarkAllNotificationsAsReadForRepo.name(),
                        error,
                    )),
                };
                self.settle_bulk(ids, outcome)
            }
            ReadScope::All => {
                let outcome = self
                    .read_in_one_call(
                        &ids,
                        ApiRequest::MarkAllNotificationsAsRead { last_read_at: at },
                    )
                    .await;
                self.settle_bulk(ids, outcome)
            }
        }
    }

    /// Run [`Self::mark_as_read`] on its own task.
    pub fn spawn_mark_as_read(
        &self,
        request: MarkAsReadRequest,
    ) -> JoinHandle<Result<MarkAsReadOutcome>> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.mark_as_read(request).await })
    }

    /// Flag threads unread on this device only.
    pub fn mark_as_unread(&self, ids: Vec<NotificationId>, at: Option<DateTime<Utc>>) {
        tracing::debug!("Marking {} notifications unread locally", ids.len());
        self.store.dispatch(Action::mark_as_unread(ids, at));
    }

    /// Remove threads from the store. Returns whether the whole visible list
    /// was archived.
    pub fn archive(&self, ids: Vec<NotificationId>, visible: &[NotificationId]) -> bool {
        let targets: BTreeSet<&NotificationId> = ids.iter().collect();
        let shown: BTreeSet<&NotificationId> = visible.iter().collect();
        let all = !targets.is_empty() && targets == shown;
        tracing::debug!("Archiving {} notifications (all={all})", ids.len());
        self.store.dispatch(Action::archive(ids, all));
        all
    }

    async fn read_threads(&self, ids: Vec<NotificationId>) -> Result<MarkAsReadOutcome> {
        let snapshot = self.store.snapshot();
        let (skipped, pending): (Vec<_>, Vec<_>) = ids.into_iter().partition(|id| {
            selectors::notification(&snapshot, id).is_some_and(|notification| !notification.unread)
        });

        let mut outcome = MarkAsReadOutcome {
            skipped,
            ..MarkAsReadOutcome::default()
        };
        if !outcome.skipped.is_empty() {
            tracing::debug!(
                "{} notifications already read remotely, skipping calls",
                outcome.skipped.len()
            );
            self.store.dispatch(Action::MarkAsReadSucceeded {
                ids: outcome.skipped.clone(),
            });
        }
        if pending.is_empty() {
            return Ok(outcome);
        }

        let credential = match self.session.current().authenticate() {
            Ok(credential) => credential,
            Err(error) => {
                self.fail(
                    pending,
                    Operation::MarkNotificationThreadAsRead.name(),
                    &error,
                );
                return Err(error);
            }
        };

        let mut first_error = None;
        for id in pending {
            let request = ApiRequest::MarkNotificationThreadAsRead {
                thread_id: id.clone(),
            };
            let operation = request.operation().name();
            match self.call(&credential, request).await {
                Ok(()) => {
                    self.store.dispatch(Action::MarkAsReadSucceeded {
                        ids: vec![id.clone()],
                    });
                    outcome.confirmed.push(id);
                }
                Err(error) => {
                    self.fail(vec![id], operation, &error);
                    first_error.get_or_insert(error);
                }
            }
        }

        first_error.map_or(Ok(outcome), Err)
    }

    fn resolve_repository(&self, repository: RepositoryId) -> Result<(String, String)> {
        let snapshot = self.store.snapshot();
        selectors::repository_by_id(&snapshot, repository)
            .and_then(|repository| repository.owner_and_name())
            .map(|(owner, name)| (owner.to_string(), name.to_string()))
            .ok_or_else(|| Error::NotFound(format!("Repository {repository} is not in the store")))
    }

    /// One bulk call covering every id. Failures are reported by the caller.
    async fn read_in_one_call(
        &self,
        ids: &[NotificationId],
        request: ApiRequest,
    ) -> std::result::Result<(), (&'static str, Error)> {
        let operation = request.operation().name();
        tracing::debug!("{} covering {} notifications", operation, ids.len());
        let credential = self
            .session
            .current()
            .authenticate()
            .map_err(|error| (operation, error))?;
        self.call(&credential, request)
            .await
            .map_err(|error| (operation, error))
    }

    fn settle_bulk(
        &self,
        ids: Vec<NotificationId>,
        result: std::result::Result<(), (&'static str, Error)>,
    ) -> Result<MarkAsReadOutcome> {
        match result {
            Ok(()) => {
                self.store
                    .dispatch(Action::MarkAsReadSucceeded { ids: ids.clone() });
                Ok(MarkAsReadOutcome {
                    confirmed: ids,
                    skipped: Vec::new(),
                })
            }
            Err((operation, error)) => {
                self.fail(ids, operation, &error);
                Err(error)
            }
        }
    }

    async fn call(&self, credential: &Credential, request: ApiRequest) -> Result<()> {
        execute_with_timeout(self.executor.as_ref(), credential, request, self.timeout)
            .await
            .map(|_| ())
    }

    fn fail(&self, ids: Vec<NotificationId>, operation: &'static str, error: &Error) {
        self.store.dispatch(Action::MarkAsReadFailed {
            ids,
            failure: FailureEvent::from_error(operation, error),
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::fixtures::{at, notification, repository};
    use crate::store::NotificationState;
    use crate::testing::{logged_in_session, no_content, Reply, ScriptedExecutor};

    fn id(value: &str) -> NotificationId {
        NotificationId::new(value)
    }

    fn seeded_store() -> StoreHandle {
        let mut state = NotificationState::default();
        let mut read = notification("read");
        read.unread = false;
        let mut elsewhere = notification("elsewhere");
        elsewhere.repository = repository(7, "octo/world");
        for item in [notification("A"), notification("B"), read, elsewhere] {
            state.by_id.insert(item.id.clone(), item);
        }
        StoreHandle::with_state(state)
    }

    fn coordinator(
        executor: &ScriptedExecutor,
        session: SessionHandle,
    ) -> (MutationCoordinator<ScriptedExecutor>, StoreHandle) {
        let store = seeded_store();
        let mutations = MutationCoordinator::new(
            Arc::new(executor.clone()),
            store.clone(),
            session,
            Duration::from_secs(10),
        );
        (mutations, store)
    }

    #[tokio::test]
    async fn thread_read_is_confirmed_by_server() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Ok(no_content()));
        let (mutations, store) = coordinator(&executor, logged_in_session());

        let outcome = mutations
            .mark_as_read(MarkAsReadRequest::threads(vec![id("A")]).at(at(1)))
            .await
            .unwrap();
        assert_eq!(outcome.confirmed, vec![id("A")]);
        assert_eq!(
            executor.requests(),
            vec![ApiRequest::MarkNotificationThreadAsRead { thread_id: id("A") }]
        );

        let item = &store.snapshot().by_id[&id("A")];
        assert!(!item.unread);
        assert_eq!(item.last_read_at, Some(at(1)));
        assert_eq!(item.last_unread_at, None);
    }

    #[tokio::test]
    async fn already_read_thread_skips_remote_call() {
        let executor = ScriptedExecutor::new();
        let (mutations, store) = coordinator(&executor, SessionHandle::new());
        let mut events = store.subscribe();

        let outcome = mutations
            .mark_as_read(MarkAsReadRequest::threads(vec![id("read")]).at(at(2)))
            .await
            .unwrap();
        assert_eq!(outcome.skipped, vec![id("read")]);
        assert!(outcome.confirmed.is_empty());
        assert!(executor.requests().is_empty());

        assert_eq!(events.recv().await.unwrap().name(), "mark_as_read_requested");
        assert_eq!(events.recv().await.unwrap().name(), "mark_as_read_succeeded");
        let item = &store.snapshot().by_id[&id("read")];
        assert_eq!(item.last_read_at, Some(at(2)));
        assert!(!item.is_unread());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_thread_read_rolls_back() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Hang(Duration::from_secs(30)));
        let (mutations, store) = coordinator(&executor, logged_in_session());
        let before = store.snapshot();

        let error = mutations
            .mark_as_read(MarkAsReadRequest::threads(vec![id("A")]))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Timeout { .. }));

        let after = store.snapshot();
        assert_eq!(after.by_id, before.by_id);
        assert!(after.by_id[&id("A")].is_unread());
        assert!(after.meta.last_error.is_some());
    }

    #[tokio::test]
    async fn fan_out_settles_each_thread_on_its_own() {
        let executor = ScriptedExecutor::new();
        executor
            .push(Reply::Ok(no_content()))
            .push(Reply::Fail("Not Found (404)".to_string()));
        let (mutations, store) = coordinator(&executor, logged_in_session());
        let mut events = store.subscribe();

        let error = mutations
            .mark_as_read(MarkAsReadRequest::threads(vec![id("A"), id("B")]))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Transport(_)));
        assert_eq!(executor.requests().len(), 2);

        let state = store.snapshot();
        assert!(!state.by_id[&id("A")].unread);
        assert!(!state.by_id[&id("A")].is_unread());
        assert_eq!(state.by_id[&id("B")].last_read_at, None);
        assert!(state.by_id[&id("B")].is_unread());

        let names: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|action| action.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "mark_as_read_requested",
                "mark_as_read_succeeded",
                "mark_as_read_failed"
            ]
        );
    }

    #[tokio::test]
    async fn missing_credential_rolls_back_without_calling() {
        let executor = ScriptedExecutor::new();
        let (mutations, store) = coordinator(&executor, SessionHandle::new());

        let error = mutations
            .mark_as_read(MarkAsReadRequest::threads(vec![id("A")]))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Authentication));
        assert!(executor.requests().is_empty());
        assert_eq!(store.snapshot().by_id[&id("A")].last_read_at, None);
    }

    #[tokio::test]
    async fn repository_scope_resolves_owner_and_name() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Ok(no_content()));
        let (mutations, store) = coordinator(&executor, logged_in_session());

        let outcome = mutations
            .mark_as_read(
                MarkAsReadRequest::repository(vec![id("elsewhere")], RepositoryId(7)).at(at(3)),
            )
            .await
            .unwrap();
        assert_eq!(outcome.confirmed, vec![id("elsewhere")]);
        assert_eq!(
            executor.requests(),
            vec![ApiRequest::MarkAllNotificationsAsReadForRepo {
                owner: "octo".to_string(),
                repo: "world".to_string(),
                last_read_at: at(3),
            }]
        );
        assert!(!store.snapshot().by_id[&id("elsewhere")].unread);
    }

    #[tokio::test]
    async fn unknown_repository_rolls_back() {
        let executor = ScriptedExecutor::new();
        let (mutations, store) = coordinator(&executor, logged_in_session());

        let error = mutations
            .mark_as_read(MarkAsReadRequest::repository(vec![id("A")], RepositoryId(99)))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
        assert!(executor.requests().is_empty());
        assert!(store.snapshot().by_id[&id("A")].is_unread());
    }

    #[tokio::test]
    async fn all_scope_uses_global_endpoint() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Ok(no_content()));
        let (mutations, store) = coordinator(&executor, logged_in_session());

        mutations
            .spawn_mark_as_read(MarkAsReadRequest::all(vec![id("A"), id("B")]).at(at(4)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            executor.requests(),
            vec![ApiRequest::MarkAllNotificationsAsRead {
                last_read_at: at(4)
            }]
        );
        assert_eq!(selectors::unread_count(&store.snapshot()), 1);
    }

    #[tokio::test]
    async fn failed_bulk_read_rolls_back_every_id() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Fail("Server Error (500)".to_string()));
        let (mutations, store) = coordinator(&executor, logged_in_session());
        let before = store.snapshot();

        assert!(mutations
            .mark_as_read(MarkAsReadRequest::all(vec![id("A"), id("B")]))
            .await
            .is_err());
        let after = store.snapshot();
        assert_eq!(after.by_id, before.by_id);
        assert_eq!(
            after.meta.last_error.as_deref(),
            Some("Transport error: Server Error (500)")
        );
    }

    #[test]
    fn mark_as_unread_is_local_only() {
        let executor = ScriptedExecutor::new();
        let (mutations, store) = coordinator(&executor, logged_in_session());

        mutations.mark_as_unread(vec![id("read")], Some(at(5)));
        let item = &store.snapshot().by_id[&id("read")];
        assert!(!item.unread);
        assert!(item.is_unread());
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn archive_reports_whether_everything_visible_went() {
        let executor = ScriptedExecutor::new();
        let (mutations, store) = coordinator(&executor, logged_in_session());
        let visible = selectors::visible_ids(&store.snapshot());

        assert!(!mutations.archive(vec![id("A")], &visible));
        assert_eq!(store.snapshot().by_id.len(), 3);

        let remaining = selectors::visible_ids(&store.snapshot());
        assert!(mutations.archive(remaining.clone(), &remaining));
        assert!(store.snapshot().by_id.is_empty());
        assert_eq!(selectors::archived_ids(&store.snapshot()).len(), 4);
        assert!(executor.requests().is_empty());
    }
}
