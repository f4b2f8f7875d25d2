use std::sync::Arc;

use buzz_core::api::GithubExecutor;
use buzz_core::models::RepositoryId;
use buzz_core::mutation::MutationCoordinator;
use buzz_core::selectors;
use buzz_core::sync::{SyncHandle, SyncOrchestrator};
use buzz_core::NotificationId;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{
    describe_action, format_notification_lines, parse_notification_ids, select_notifications,
    BuzzContext,
};
use crate::commands::read::build_read_request;
use crate::error::CliError;

const LIST_LIMIT: usize = 20;

const HELP: &str = "\
Commands:
  list                  show recent notifications
  read <id>...          mark threads as read on GitHub
  read --repo <id>      mark a repository as read
  read --all            mark everything as read
  unread <id>...        mark threads unread on this device
  archive <id>...       hide threads until they get new activity
  archive --all         hide everything currently listed
  status                show sync status
  quit                  stop watching";

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    List,
    Read(Vec<NotificationId>),
    ReadRepository(RepositoryId),
    ReadAll,
    Unread(Vec<NotificationId>),
    Archive(Vec<NotificationId>),
    ArchiveAll,
    Status,
    Help,
    Quit,
}

pub async fn run_watch(poll_interval: Option<u64>) -> Result<(), CliError> {
    let context = BuzzContext::open(poll_interval)?;
    let mut events = context.store.subscribe();
    let handle = SyncOrchestrator::new(
        Arc::clone(&context.executor),
        context.store.clone(),
        context.session.clone(),
        context.sync.clone(),
    )
    .spawn();
    let mutations = context.mutations();

    println!("Watching GitHub notifications. Type `help` for commands, Ctrl-C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(action) => {
                    if let Some(line) = describe_action(&action, &context.store.snapshot()) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {skipped} store events");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match parse_watch_command(&line) {
                    Ok(Some(WatchCommand::Quit)) => break,
                    Ok(Some(command)) => execute(&context, &mutations, &handle, command),
                    Ok(None) => {}
                    Err(error) => eprintln!("{error}"),
                },
                // Keep syncing without input, e.g. when stdin is /dev/null.
                None => stdin_open = false,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

pub fn parse_watch_command(line: &str) -> Result<Option<WatchCommand>, CliError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args = words.map(ToString::to_string).collect::<Vec<_>>();

    let command = match (name, args.as_slice()) {
        ("list" | "ls", []) => WatchCommand::List,
        ("read", [flag]) if flag == "--all" => WatchCommand::ReadAll,
        ("read", [flag, id]) if flag == "--repo" => WatchCommand::ReadRepository(RepositoryId(
            id.parse()
                .map_err(|_| CliError::UnknownCommand(line.trim().to_string()))?,
        )),
        ("read", []) => return Err(CliError::NothingToRead),
        ("read", ids) => WatchCommand::Read(parse_notification_ids(ids)?),
        ("unread", []) | ("archive", []) => return Err(CliError::EmptyNotificationId),
        ("unread", ids) => WatchCommand::Unread(parse_notification_ids(ids)?),
        ("archive", [flag]) if flag == "--all" => WatchCommand::ArchiveAll,
        ("archive", ids) => WatchCommand::Archive(parse_notification_ids(ids)?),
        ("status", []) => WatchCommand::Status,
        ("help" | "?", []) => WatchCommand::Help,
        ("quit" | "exit" | "q", []) => WatchCommand::Quit,
        _ => return Err(CliError::UnknownCommand(line.trim().to_string())),
    };
    Ok(Some(command))
}

fn execute(
    context: &BuzzContext,
    mutations: &MutationCoordinator<GithubExecutor>,
    handle: &SyncHandle,
    command: WatchCommand,
) {
    let state = context.store.snapshot();
    match command {
        WatchCommand::List => {
            let notifications = select_notifications(&state, LIST_LIMIT, false);
            if notifications.is_empty() {
                println!("Inbox zero.");
            }
            for line in format_notification_lines(&notifications, Utc::now()) {
                println!("{line}");
            }
        }
        WatchCommand::Read(ids) => {
            // Outcomes arrive as store events.
            drop(mutations.spawn_mark_as_read(build_read_request(&state, ids, None, false)));
        }
        WatchCommand::ReadRepository(repository) => {
            drop(mutations.spawn_mark_as_read(build_read_request(
                &state,
                Vec::new(),
                Some(repository),
                false,
            )));
        }
        WatchCommand::ReadAll => {
            drop(mutations.spawn_mark_as_read(build_read_request(&state, Vec::new(), None, true)));
        }
        WatchCommand::Unread(ids) => mutations.mark_as_unread(ids, None),
        WatchCommand::Archive(ids) => {
            mutations.archive(ids, &selectors::visible_ids(&state));
        }
        WatchCommand::ArchiveAll => {
            let visible = selectors::visible_ids(&state);
            mutations.archive(visible.clone(), &visible);
        }
        WatchCommand::Status => {
            println!("Mode: {:?}", handle.mode());
            println!(
                "Notifications: {} ({} unread, {} archived)",
                state.by_id.len(),
                selectors::unread_count(&state),
                state.archived.len()
            );
            if let Some(fetched_at) = state.meta.last_fetched_at {
                println!("Last sync: {}", fetched_at.to_rfc3339());
            }
            if let Some(error) = &state.meta.last_error {
                println!("Last error: {error}");
            }
        }
        WatchCommand::Help => println!("{HELP}"),
        WatchCommand::Quit => {}
    }
}
