//! One fetch: authenticate, call each page with a timeout, normalize, merge.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::api::{
    execute_with_timeout, ApiRequest, FetchMode, FetchParams, Operation, RequestExecutor,
    ResponseMeta,
};
use crate::normalize::{normalize_notifications, NormalizedPage};
use crate::session::{Credential, SessionHandle};
use crate::store::{Action, FailureEvent, StoreHandle};
use crate::{Error, Result};

/// Upper bound on pages followed in one fetch.
const MAX_PAGES: u32 = 10;

pub struct FetchCoordinator<E> {
    executor: Arc<E>,
    store: StoreHandle,
    session: SessionHandle,
    timeout: Duration,
}

impl<E> Clone for FetchCoordinator<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            store: self.store.clone(),
            session: self.session.clone(),
            timeout: self.timeout,
        }
    }
}

impl<E: RequestExecutor> FetchCoordinator<E> {
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

    /// Fetch and merge the window, following `Link: rel="next"` up to
    /// [`MAX_PAGES`]. Returns how many threads came back.
    ///
    /// Failures are dispatched as `FetchFailed` before being returned. If the
    /// session changes while the request is in flight nothing is dispatched
    /// and [`Error::SessionChanged`] is returned.
    pub async fn fetch(&self, params: FetchParams) -> Result<usize> {
        let generation = self.session.current().generation;
        self.fetch_for(generation, params).await
    }

    /// Run a fetch on its own task. Its result only lands while the session
    /// is still at `generation`.
    pub fn spawn_fetch(&self, generation: u64, params: FetchParams) -> JoinHandle<Result<usize>> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.fetch_for(generation, params).await })
    }

    async fn fetch_for(&self, generation: u64, params: FetchParams) -> Result<usize> {
        let mode = params.mode;
        let requested = self.session.if_generation(generation, || {
            self.store.dispatch(Action::fetch_requested(mode));
        });
        if requested.is_none() {
            return Err(session_changed());
        }

        let outcome = self.request_pages(params).await;
        self.session
            .if_generation(generation, || self.settle(mode, outcome))
            .unwrap_or_else(|| {
                tracing::debug!("Dropping {mode:?} fetch result from a previous session");
                Err(session_changed())
            })
    }

    fn settle(
        &self,
        mode: FetchMode,
        outcome: Result<(NormalizedPage, ResponseMeta)>,
    ) -> Result<usize> {
        match outcome {
            Ok((page, meta)) => {
                let count = page.len();
                tracing::debug!(
                    "Fetched {count} notifications ({mode:?}, status {}, not_modified={})",
                    meta.status,
                    meta.not_modified
                );
                self.store.dispatch(Action::FetchSucceeded {
                    mode,
                    page,
                    meta,
                    received_at: Utc::now(),
                });
                Ok(count)
            }
            Err(error) => {
                self.store.dispatch(Action::FetchFailed {
                    mode,
                    failure: FailureEvent::from_error(
                        Operation::FetchNotifications.name(),
                        &error,
                    ),
                });
                Err(error)
            }
        }
    }

    async fn request_pages(&self, params: FetchParams) -> Result<(NormalizedPage, ResponseMeta)> {
        let credential = self.session.current().authenticate()?;
        let (mut page, mut meta) = self.request_page(&credential, params.clone()).await?;

        let mut next = params;
        while meta.has_next_page {
            if next.page >= MAX_PAGES {
                tracing::warn!("Stopped after {MAX_PAGES} pages of notifications");
                break;
            }
            next = next.next_page();
            let (more, more_meta) = self.request_page(&credential, next.clone()).await?;
            page.append(more);
            meta.has_next_page = more_meta.has_next_page;
        }
        Ok((page, meta))
    }

    async fn request_page(
        &self,
        credential: &Credential,
        params: FetchParams,
    ) -> Result<(NormalizedPage, ResponseMeta)> {
        let response = execute_with_timeout(
            self.executor.as_ref(),
            credential,
            ApiRequest::FetchNotifications(params),
            self.timeout,
        )
        .await?;
        let page = normalize_notifications(&response.data)?;
        Ok((page, response.meta))
    }
}

const fn session_changed() -> Error {
    Error::SessionChanged {
        operation: Operation::FetchNotifications.name(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::ApiResponse;
    use crate::models::NotificationId;
    use crate::session::SessionSignal;
    use crate::testing::{
        list_response, logged_in_session, raw_notification, Reply, ScriptedExecutor,
    };

    fn params() -> FetchParams {
        FetchParams {
            mode: FetchMode::Full,
            all: true,
            since: Utc::now() - TimeDelta::days(30),
            if_modified_since: None,
            per_page: 50,
            page: 1,
        }
    }

    fn pages_requested(executor: &ScriptedExecutor) -> Vec<u32> {
        executor
            .requests()
            .into_iter()
            .filter_map(|request| match request {
                ApiRequest::FetchNotifications(params) => Some(params.page),
                _ => None,
            })
            .collect()
    }

    fn coordinator(
        executor: &ScriptedExecutor,
        session: SessionHandle,
    ) -> (FetchCoordinator<ScriptedExecutor>, StoreHandle) {
        let store = StoreHandle::new();
        let fetcher = FetchCoordinator::new(
            Arc::new(executor.clone()),
            store.clone(),
            session,
            Duration::from_secs(10),
        );
        (fetcher, store)
    }

    #[tokio::test]
    async fn successful_fetch_merges_into_store() {
        let executor = ScriptedExecutor::new();
        let updated_at = Utc::now() - TimeDelta::hours(1);
        executor.push(Reply::Ok(list_response(vec![
            raw_notification("1", true, updated_at),
            raw_notification("2", false, updated_at),
        ])));
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        assert_eq!(fetcher.fetch(params()).await.unwrap(), 2);

        let state = store.snapshot();
        assert_eq!(state.by_id.len(), 2);
        assert!(state.by_id[&NotificationId::new("1")].unread);
        assert!(!state.meta.loading);
        assert!(state.meta.last_fetched_at.is_some());
        assert_eq!(
            state.meta.last_modified_at.map(|at| at.timestamp()),
            Some(updated_at.timestamp())
        );
    }

    #[tokio::test]
    async fn missing_credential_fails_fast() {
        let executor = ScriptedExecutor::new();
        let (fetcher, store) = coordinator(&executor, SessionHandle::new());
        let mut events = store.subscribe();

        let error = fetcher.fetch(params()).await.unwrap_err();
        assert!(matches!(error, Error::Authentication));
        assert!(executor.requests().is_empty());

        assert_eq!(events.recv().await.unwrap().name(), "fetch_requested");
        let failed = events.recv().await.unwrap();
        let failure = failed.failure().unwrap();
        assert_eq!(failure.operation, "FETCH_NOTIFICATIONS");
        assert!(!failure.recoverable);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_without_touching_entities() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Hang(Duration::from_secs(30)));
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        let error = fetcher.fetch(params()).await.unwrap_err();
        assert!(matches!(error, Error::Timeout { .. }));

        let state = store.snapshot();
        assert!(state.by_id.is_empty());
        assert!(state.meta.last_modified_at.is_none());
        assert!(state
            .meta
            .last_error
            .as_deref()
            .is_some_and(|message| message.contains("timed out")));
    }

    #[tokio::test]
    async fn transport_error_is_reported() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Fail("Bad credentials (401)".to_string()));
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        assert!(fetcher.fetch(params()).await.is_err());
        assert_eq!(
            store.snapshot().meta.last_error.as_deref(),
            Some("Transport error: Bad credentials (401)")
        );
    }

    #[tokio::test]
    async fn not_modified_only_touches_fetch_time() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Ok(ApiResponse {
            data: serde_json::Value::Null,
            meta: ResponseMeta {
                status: 304,
                not_modified: true,
                ..ResponseMeta::default()
            },
        }));
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        assert_eq!(fetcher.spawn_fetch(1, params()).await.unwrap().unwrap(), 0);
        let state = store.snapshot();
        assert!(state.by_id.is_empty());
        assert!(state.meta.last_modified_at.is_none());
        assert!(state.meta.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn follows_next_page_links() {
        let executor = ScriptedExecutor::new();
        let updated_at = Utc::now() - TimeDelta::hours(1);
        let mut first = list_response(vec![
            raw_notification("1", true, updated_at),
            raw_notification("2", true, updated_at),
        ]);
        first.meta.has_next_page = true;
        executor
            .push(Reply::Ok(first))
            .push(Reply::Ok(list_response(vec![raw_notification(
                "3",
                false,
                updated_at - TimeDelta::hours(1),
            )])));
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        assert_eq!(fetcher.fetch(params()).await.unwrap(), 3);
        assert_eq!(pages_requested(&executor), vec![1, 2]);
        assert_eq!(store.snapshot().by_id.len(), 3);
    }

    #[tokio::test]
    async fn page_following_is_capped() {
        let executor = ScriptedExecutor::new();
        let updated_at = Utc::now() - TimeDelta::hours(1);
        for index in 0..=MAX_PAGES {
            let mut page = list_response(vec![raw_notification(
                &index.to_string(),
                true,
                updated_at,
            )]);
            page.meta.has_next_page = true;
            executor.push(Reply::Ok(page));
        }
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        assert_eq!(fetcher.fetch(params()).await.unwrap(), 10);
        assert_eq!(pages_requested(&executor), (1..=MAX_PAGES).collect::<Vec<_>>());
        assert_eq!(store.snapshot().by_id.len(), 10);
    }

    #[tokio::test]
    async fn failing_later_page_discards_the_whole_fetch() {
        let executor = ScriptedExecutor::new();
        let mut first = list_response(vec![raw_notification(
            "1",
            true,
            Utc::now() - TimeDelta::hours(1),
        )]);
        first.meta.has_next_page = true;
        executor
            .push(Reply::Ok(first))
            .push(Reply::Fail("Server Error (502)".to_string()));
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        assert!(fetcher.fetch(params()).await.is_err());
        let state = store.snapshot();
        assert!(state.by_id.is_empty());
        assert!(state.meta.last_modified_at.is_none());
        assert!(state.meta.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn result_from_previous_session_is_dropped() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Late(
            Duration::from_secs(3),
            list_response(vec![raw_notification(
                "old-account",
                true,
                Utc::now() - TimeDelta::hours(1),
            )]),
        ));
        let session = logged_in_session();
        let (fetcher, store) = coordinator(&executor, session.clone());

        let generation = session.current().generation;
        let task = fetcher.spawn_fetch(generation, params());
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.signal(SessionSignal::Logout);

        let error = task.await.unwrap().unwrap_err();
        assert!(matches!(error, Error::SessionChanged { .. }));
        let state = store.snapshot();
        assert!(state.by_id.is_empty());
        assert!(state.meta.last_fetched_at.is_none());
        assert!(state.meta.last_modified_at.is_none());
    }

    #[tokio::test]
    async fn fetch_bound_to_an_older_session_never_starts() {
        let executor = ScriptedExecutor::new();
        let session = logged_in_session();
        let (fetcher, store) = coordinator(&executor, session.clone());
        let mut events = store.subscribe();

        let stale = session.current().generation;
        session.signal(SessionSignal::LoginSucceeded(
            Credential::new("ghp_other").unwrap(),
        ));

        let error = fetcher.spawn_fetch(stale, params()).await.unwrap().unwrap_err();
        assert!(matches!(error, Error::SessionChanged { .. }));
        assert!(executor.requests().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn not_modified_with_last_modified_header_keeps_watermark() {
        let executor = ScriptedExecutor::new();
        executor.push(Reply::Ok(ApiResponse {
            data: serde_json::Value::Null,
            meta: ResponseMeta {
                status: 304,
                not_modified: true,
                last_modified: Some(Utc::now()),
                ..ResponseMeta::default()
            },
        }));
        let (fetcher, store) = coordinator(&executor, logged_in_session());

        assert_eq!(fetcher.fetch(params()).await.unwrap(), 0);
        let state = store.snapshot();
        assert!(state.meta.last_modified_at.is_none());
        assert!(state.meta.last_fetched_at.is_some());
    }
}
