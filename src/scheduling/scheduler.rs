use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{
    CommandDelivery, CommandId, FireTime, InvalidScheduleError, PendingCommand, TargetId,
};

pub const DEFAULT_TIMEZONE: Tz = Tz::Europe__Warsaw;

struct CommandEntry {
    command: String,
    target: TargetId,
    fire_at: DateTime<Tz>,
    seq: u64,
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    entries: HashMap<CommandId, CommandEntry>,
    delayed_seq: u64,
    scheduled_seq: u64,
    insert_seq: u64,
}

/// Tracks pending timed commands and fires each at most once.
///
/// All state is in-memory and scoped to the process; a restart drops every
/// pending command.
pub struct DelayedCommandScheduler {
    state: Arc<Mutex<SchedulerState>>,
    timezone: Tz,
}

impl DelayedCommandScheduler {
    pub fn new(timezone: Tz) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::default())),
            timezone,
        }
    }

    /// The zone naive fire times are resolved in.
    pub fn default_timezone(&self) -> Tz {
        self.timezone
    }

    /// Schedule `command` to be delivered to `target` after `delay` has
    /// elapsed. Returns the new id immediately, without waiting for
    /// delivery. Any non-negative delay is accepted here; the conversational
    /// tool layer enforces its own bounds.
    pub async fn schedule_after(
        &self,
        command: impl Into<String>,
        target: TargetId,
        delay: Duration,
        delivery: Arc<dyn CommandDelivery>,
    ) -> CommandId {
        let now = Utc::now().with_timezone(&self.timezone);
        let fire_at = add_delay(now, delay);

        let mut state = self.state.lock().await;
        state.delayed_seq += 1;
        let id = format!("delayed_{}", state.delayed_seq);
        self.insert_entry(
            &mut state,
            id.clone(),
            command.into(),
            target,
            fire_at,
            delay,
            delivery,
        );

        log::info!(
            "Scheduled command {id} for target {target} to be delivered in {} seconds",
            delay.as_secs()
        );
        id
    }

    /// Schedule `command` for an absolute point in time. Naive times are
    /// resolved in the configured default zone before validation; times not
    /// strictly in the future are rejected without creating an entry.
    pub async fn schedule_at(
        &self,
        command: impl Into<String>,
        target: TargetId,
        fire_time: impl Into<FireTime>,
        delivery: Arc<dyn CommandDelivery>,
    ) -> Result<CommandId, InvalidScheduleError> {
        let fire_at = fire_time.into().resolve(self.timezone)?;
        let now = Utc::now().with_timezone(&self.timezone);
        if fire_at <= now {
            return Err(InvalidScheduleError::NotInFuture);
        }
        let delay = (fire_at - now)
            .to_std()
            .expect("The delay is positive after the future check.");

        let mut state = self.state.lock().await;
        state.scheduled_seq += 1;
        let id = format!("scheduled_{}", state.scheduled_seq);
        self.insert_entry(
            &mut state,
            id.clone(),
            command.into(),
            target,
            fire_at,
            delay,
            delivery,
        );

        log::info!("Scheduled command {id} for target {target} to be delivered at {fire_at}");
        Ok(id)
    }

    /// Cancel a pending command. By the time this returns `true` the timer
    /// task has unwound and the delivery callback is guaranteed not to run.
    /// Unknown, already-delivered, and already-cancelled ids return `false`.
    pub async fn cancel(&self, id: &str) -> bool {
        let entry = self.state.lock().await.entries.remove(id);
        let Some(entry) = entry else {
            return false;
        };

        entry.cancellation_token.cancel();
        let _ = entry.task.await;
        log::info!("Cancelled delayed command {id}");
        true
    }

    /// Snapshot of all pending entries, in insertion order.
    pub async fn list_pending(&self) -> Vec<PendingCommand> {
        let state = self.state.lock().await;
        let mut entries: Vec<_> = state.entries.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(id, entry)| PendingCommand {
                id: id.clone(),
                command: entry.command.clone(),
                target: entry.target,
                fire_at: entry.fire_at,
            })
            .collect()
    }

    /// Best-effort teardown: cancels every pending entry without delivering.
    pub async fn shutdown(&self) {
        let entries: Vec<_> = {
            let mut state = self.state.lock().await;
            state.entries.drain().collect()
        };
        for (id, entry) in entries {
            entry.cancellation_token.cancel();
            let _ = entry.task.await;
            log::info!("Dropped pending command {id} on shutdown");
        }
    }

    fn insert_entry(
        &self,
        state: &mut SchedulerState,
        id: CommandId,
        command: String,
        target: TargetId,
        fire_at: DateTime<Tz>,
        delay: Duration,
        delivery: Arc<dyn CommandDelivery>,
    ) {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.child_token();
        let task_state = Arc::clone(&self.state);
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            run_command_timer(task_state, task_id, delay, task_token, delivery).await;
        });

        state.insert_seq += 1;
        let entry = CommandEntry {
            command,
            target,
            fire_at,
            seq: state.insert_seq,
            cancellation_token,
            task,
        };
        state.entries.insert(id, entry);
    }
}

impl Default for DelayedCommandScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

async fn run_command_timer(
    state: Arc<Mutex<SchedulerState>>,
    id: CommandId,
    delay: Duration,
    cancellation_token: CancellationToken,
    delivery: Arc<dyn CommandDelivery>,
) {
    tokio::select! {
        _ = cancellation_token.cancelled() => {
            log::info!("Delayed command {id} was cancelled");
        }
        _ = tokio::time::sleep(delay) => {
            // Removing the entry doubles as the existence check: a concurrent
            // cancel that won the lock leaves nothing to deliver.
            let entry = state.lock().await.entries.remove(&id);
            let Some(entry) = entry else {
                log::warn!("Command {id} not found in scheduler");
                return;
            };

            log::info!("Delivering delayed command {id} to target {}", entry.target);
            if let Err(err) = delivery.deliver_command(&entry.command, entry.target).await {
                log::error!("Error delivering delayed command {id}: {err:#}");
            }
        }
    }
}

fn add_delay(now: DateTime<Tz>, delay: Duration) -> DateTime<Tz> {
    // fire_at is kept for display; absurd delays are clamped rather than
    // rejected, since the wait itself runs on the std duration.
    let clamp = TimeDelta::days(36500);
    let delta = TimeDelta::from_std(delay).unwrap_or(clamp).min(clamp);
    now.checked_add_signed(delta).unwrap_or(now + clamp)
}

#[cfg(test)]
mod tests;
