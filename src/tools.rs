//! Conversational tool layer: the functions the agent exposes to the model.
//! They validate input, wrap commands with the redelivery marker, and answer
//! with plain strings the assistant relays to the user.

use std::sync::Arc;
use std::time::Duration;

use crate::reentry;
use crate::scheduling::{CommandDelivery, DelayedCommandScheduler, FireTime, TargetId};

pub const MAX_DELAY_SECONDS: u64 = 86400 * 7;

/// Per-conversation context the agent's tool calls carry.
#[derive(Clone)]
pub struct ToolContext {
    pub target: TargetId,
    pub delivery: Arc<dyn CommandDelivery>,
}

pub async fn send_delayed_message(
    scheduler: &DelayedCommandScheduler,
    ctx: &ToolContext,
    message: &str,
    hours: i64,
    minutes: i64,
    seconds: i64,
) -> String {
    let delay_seconds = match validate_delay_components(hours, minutes, seconds) {
        Ok(total) => total,
        Err(message) => return message,
    };

    scheduler
        .schedule_after(
            reentry::mark_delayed(message),
            ctx.target,
            Duration::from_secs(delay_seconds),
            Arc::clone(&ctx.delivery),
        )
        .await;

    format!("Scheduled to send '{message}'")
}

pub async fn schedule_message_at(
    scheduler: &DelayedCommandScheduler,
    ctx: &ToolContext,
    message: &str,
    fire_time: impl Into<FireTime>,
) -> String {
    let result = scheduler
        .schedule_at(
            reentry::mark_delayed(message),
            ctx.target,
            fire_time,
            Arc::clone(&ctx.delivery),
        )
        .await;

    match result {
        Ok(_) => format!("Scheduled to send '{message}'"),
        Err(err) => format!("Error scheduling message: {err}"),
    }
}

pub async fn list_scheduled_messages(scheduler: &DelayedCommandScheduler) -> String {
    let pending = scheduler.list_pending().await;
    if pending.is_empty() {
        return "No scheduled messages pending.".to_string();
    }

    let mut result = vec![format!("Found {} scheduled message(s):\n", pending.len())];
    for command in pending {
        let message = command
            .command
            .strip_prefix(reentry::DELAYED_COMMAND_MARKER)
            .unwrap_or(&command.command);

        result.push(format!("- ID: {}", command.id));
        result.push(format!(
            "  Time: {}",
            command.fire_at.format("%Y-%m-%d %H:%M:%S %Z")
        ));
        result.push(format!("  Message: {message}"));
        result.push(String::new());
    }

    result.join("\n")
}

pub async fn cancel_scheduled_message(
    scheduler: &DelayedCommandScheduler,
    message_id: &str,
) -> String {
    if scheduler.cancel(message_id).await {
        format!("Successfully cancelled scheduled message: {message_id}")
    } else {
        format!(
            "Could not find scheduled message with ID: {message_id}. \
             Use list_scheduled_messages to see available IDs."
        )
    }
}

fn validate_delay_components(hours: i64, minutes: i64, seconds: i64) -> Result<u64, String> {
    if !(0..=168).contains(&hours) {
        return Err("Error: Hours must be between 0 and 168".to_string());
    }
    if !(0..=59).contains(&minutes) {
        return Err("Error: Minutes must be between 0 and 59".to_string());
    }
    if !(0..=59).contains(&seconds) {
        return Err("Error: Seconds must be between 0 and 59".to_string());
    }

    let delay_seconds = (hours * 3600 + minutes * 60 + seconds) as u64;
    if delay_seconds < 1 {
        return Err(
            "Error: Delay must be at least 1 second (all time parameters cannot be zero)"
                .to_string(),
        );
    }
    if delay_seconds > MAX_DELAY_SECONDS {
        return Err(format!(
            "Error: Maximum delay is 7 days ({MAX_DELAY_SECONDS} seconds)"
        ));
    }

    Ok(delay_seconds)
}
