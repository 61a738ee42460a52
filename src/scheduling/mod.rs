mod scheduler;

pub use scheduler::{DEFAULT_TIMEZONE, DelayedCommandScheduler};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Opaque handle for the conversation/thread a redelivered command goes to.
/// The scheduler never interprets it.
pub type TargetId = i64;

pub type CommandId = String;

/// Delivery hook invoked when a scheduled command fires. Supplied by the
/// caller at schedule time; errors are logged and swallowed at the scheduler
/// boundary, so failures a callback wants surfaced must go through its own
/// side channel before returning.
#[async_trait]
pub trait CommandDelivery: Send + Sync + 'static {
    async fn deliver_command(&self, command: &str, target: TargetId) -> anyhow::Result<()>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidScheduleError {
    #[error("Scheduled time must be in the future")]
    NotInFuture,

    #[error("Local time {0} does not exist in timezone {1}")]
    NonexistentLocalTime(NaiveDateTime, Tz),
}

/// A requested fire time. Naive times carry no zone and are resolved in the
/// scheduler's configured default zone, not the host's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireTime {
    Zoned(DateTime<Utc>),
    Local(NaiveDateTime),
}

impl FireTime {
    pub(crate) fn resolve(self, timezone: Tz) -> Result<DateTime<Tz>, InvalidScheduleError> {
        match self {
            FireTime::Zoned(fire_at) => Ok(fire_at.with_timezone(&timezone)),
            FireTime::Local(naive) => timezone
                .from_local_datetime(&naive)
                .earliest()
                .ok_or(InvalidScheduleError::NonexistentLocalTime(naive, timezone)),
        }
    }
}

impl<T: TimeZone> From<DateTime<T>> for FireTime {
    fn from(value: DateTime<T>) -> Self {
        FireTime::Zoned(value.with_timezone(&Utc))
    }
}

impl From<NaiveDateTime> for FireTime {
    fn from(value: NaiveDateTime) -> Self {
        FireTime::Local(value)
    }
}

/// Point-in-time snapshot of a pending entry, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub id: CommandId,
    pub command: String,
    pub target: TargetId,
    pub fire_at: DateTime<Tz>,
}
