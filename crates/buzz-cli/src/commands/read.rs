use buzz_core::models::RepositoryId;
use buzz_core::mutation::{MarkAsReadOutcome, MarkAsReadRequest};
use buzz_core::store::NotificationState;
use buzz_core::{selectors, NotificationId};

use crate::commands::common::{parse_notification_ids, repository_label, BuzzContext};
use crate::error::CliError;

pub async fn run_read(
    raw_ids: &[String],
    repository: Option<u64>,
    all: bool,
) -> Result<(), CliError> {
    let ids = parse_notification_ids(raw_ids)?;
    if ids.is_empty() && repository.is_none() && !all {
        return Err(CliError::NothingToRead);
    }

    let context = BuzzContext::open(None)?;
    // Skipping already-read threads and resolving repositories both need
    // the current remote state.
    context.fetch_all().await?;
    let state = context.store.snapshot();

    let request = build_read_request(&state, ids, repository.map(RepositoryId), all);
    if let Some(repository) = repository {
        println!(
            "Marking {} as read",
            repository_label(&state, RepositoryId(repository))
        );
    }

    let outcome = context.mutations().mark_as_read(request).await?;
    for line in format_read_outcome(&outcome) {
        println!("{line}");
    }
    Ok(())
}

/// Fill in the target ids of bulk requests from the store when none were
/// given explicitly.
pub fn build_read_request(
    state: &NotificationState,
    ids: Vec<NotificationId>,
    repository: Option<RepositoryId>,
    all: bool,
) -> MarkAsReadRequest {
    match (repository, all) {
        (Some(repository), _) => {
            let ids = if ids.is_empty() {
                state
                    .by_id
                    .values()
                    .filter(|notification| notification.repository.id == repository)
                    .map(|notification| notification.id.clone())
                    .collect()
            } else {
                ids
            };
            MarkAsReadRequest::repository(ids, repository)
        }
        (None, true) => {
            let ids = if ids.is_empty() {
                selectors::visible_ids(state)
            } else {
                ids
            };
            MarkAsReadRequest::all(ids)
        }
        (None, false) => MarkAsReadRequest::threads(ids),
    }
}

pub fn format_read_outcome(outcome: &MarkAsReadOutcome) -> Vec<String> {
    let mut lines = outcome
        .confirmed
        .iter()
        .map(|id| format!("{id} marked as read"))
        .collect::<Vec<_>>();
    lines.extend(
        outcome
            .skipped
            .iter()
            .map(|id| format!("{id} was already read")),
    );
    if lines.is_empty() {
        lines.push("Nothing to mark as read".to_string());
    }
    lines
}
