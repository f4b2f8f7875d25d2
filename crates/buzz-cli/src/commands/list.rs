use chrono::Utc;

use crate::commands::common::{
    format_notification_lines, notification_to_list_item, select_notifications, BuzzContext,
    NotificationListItem,
};
use crate::error::CliError;

pub async fn run_list(limit: usize, unread_only: bool, as_json: bool) -> Result<(), CliError> {
    let context = BuzzContext::open(None)?;
    context.fetch_all().await?;

    let state = context.store.snapshot();
    let notifications = select_notifications(&state, limit, unread_only);
    let now = Utc::now();

    if as_json {
        let json_items = notifications
            .iter()
            .map(|notification| notification_to_list_item(notification, now))
            .collect::<Vec<NotificationListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if notifications.is_empty() {
        println!("Inbox zero.");
        return Ok(());
    }

    for line in format_notification_lines(&notifications, now) {
        println!("{line}");
    }
    Ok(())
}
