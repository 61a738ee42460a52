use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Utc};

use super::*;

type RecordedDeliveries = Arc<Mutex<Vec<(String, TargetId)>>>;

struct RecordingDelivery {
    deliveries: RecordedDeliveries,
}

#[async_trait]
impl CommandDelivery for RecordingDelivery {
    async fn deliver_command(&self, command: &str, target: TargetId) -> anyhow::Result<()> {
        self.deliveries
            .lock()
            .unwrap()
            .push((command.to_string(), target));
        Ok(())
    }
}

struct FailingDelivery;

#[async_trait]
impl CommandDelivery for FailingDelivery {
    async fn deliver_command(&self, _command: &str, _target: TargetId) -> anyhow::Result<()> {
        anyhow::bail!("target thread is gone")
    }
}

fn recording() -> (RecordedDeliveries, Arc<RecordingDelivery>) {
    let deliveries: RecordedDeliveries = Arc::new(Mutex::new(vec![]));
    let delivery = Arc::new(RecordingDelivery {
        deliveries: Arc::clone(&deliveries),
    });
    (deliveries, delivery)
}

fn scheduler() -> DelayedCommandScheduler {
    DelayedCommandScheduler::new(DEFAULT_TIMEZONE)
}

#[tokio::test(start_paused = true)]
async fn delivers_once_after_relative_delay() {
    let (deliveries, delivery) = recording();
    let scheduler = scheduler();

    scheduler
        .schedule_after("water the plants", 42, Duration::from_secs(1), delivery)
        .await;

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let recorded = deliveries.lock().unwrap();
    assert_eq!(*recorded, vec![("water the plants".to_string(), 42)]);
    drop(recorded);
    assert!(scheduler.list_pending().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_prevents_delivery() {
    let (deliveries, delivery) = recording();
    let scheduler = scheduler();

    let id = scheduler
        .schedule_after("turn off the lights", 1, Duration::from_secs(2), delivery)
        .await;

    assert!(scheduler.cancel(&id).await);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(deliveries.lock().unwrap().is_empty());
    assert!(scheduler.list_pending().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_unknown_id_returns_false() {
    let scheduler = scheduler();
    assert!(!scheduler.cancel("nonexistent_id").await);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_delivery_returns_false() {
    let (_, delivery) = recording();
    let scheduler = scheduler();

    let id = scheduler
        .schedule_after("feed the cat", 7, Duration::from_secs(1), delivery)
        .await;

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(!scheduler.cancel(&id).await);
}

#[tokio::test(start_paused = true)]
async fn concurrent_commands_deliver_independently() {
    let (deliveries, delivery) = recording();
    let scheduler = scheduler();

    let first = scheduler
        .schedule_after(
            "first command",
            1,
            Duration::from_secs(1),
            Arc::clone(&delivery) as Arc<dyn CommandDelivery>,
        )
        .await;
    let second = scheduler
        .schedule_after("second command", 2, Duration::from_secs(2), delivery)
        .await;

    assert_ne!(first, second);
    assert_eq!(scheduler.list_pending().await.len(), 2);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(scheduler.list_pending().await.len(), 1);
    assert_eq!(
        *deliveries.lock().unwrap(),
        vec![("first command".to_string(), 1)]
    );

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(scheduler.list_pending().await.is_empty());
    assert_eq!(
        *deliveries.lock().unwrap(),
        vec![
            ("first command".to_string(), 1),
            ("second command".to_string(), 2)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn past_fire_time_is_rejected_without_creating_an_entry() {
    let (deliveries, delivery) = recording();
    let scheduler = scheduler();

    let fire_at = Utc::now() - TimeDelta::seconds(10);
    let result = scheduler
        .schedule_at("too late", 3, fire_at, delivery)
        .await;

    let err = result.unwrap_err();
    assert_eq!(err, InvalidScheduleError::NotInFuture);
    assert!(err.to_string().contains("future"));
    assert!(scheduler.list_pending().await.is_empty());
    assert!(deliveries.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn ids_are_namespaced_by_scheduling_mode() {
    let (_, delivery) = recording();
    let scheduler = scheduler();

    let relative = scheduler
        .schedule_after(
            "relative",
            1,
            Duration::from_secs(60),
            Arc::clone(&delivery) as Arc<dyn CommandDelivery>,
        )
        .await;
    let absolute = scheduler
        .schedule_at(
            "absolute",
            1,
            Utc::now() + TimeDelta::seconds(60),
            delivery,
        )
        .await
        .unwrap();

    assert!(relative.starts_with("delayed_"));
    assert!(absolute.starts_with("scheduled_"));
    assert_ne!(relative, absolute);

    let pending = scheduler.list_pending().await;
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, relative);
    assert_eq!(pending[1].id, absolute);

    scheduler.shutdown().await;
    assert!(scheduler.list_pending().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ids_are_not_reused_after_cancellation() {
    let (_, delivery) = recording();
    let scheduler = scheduler();

    let first = scheduler
        .schedule_after(
            "a",
            1,
            Duration::from_secs(60),
            Arc::clone(&delivery) as Arc<dyn CommandDelivery>,
        )
        .await;
    assert!(scheduler.cancel(&first).await);

    let second = scheduler
        .schedule_after("b", 1, Duration::from_secs(60), delivery)
        .await;

    assert_ne!(first, second);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn naive_fire_time_resolves_in_the_default_zone() {
    let (deliveries, delivery) = recording();
    let scheduler = scheduler();

    let fire_aware = Utc::now().with_timezone(&DEFAULT_TIMEZONE) + TimeDelta::seconds(60);
    let fire_naive = fire_aware.naive_local();

    scheduler
        .schedule_at(
            "aware",
            1,
            fire_aware,
            Arc::clone(&delivery) as Arc<dyn CommandDelivery>,
        )
        .await
        .unwrap();
    scheduler
        .schedule_at("naive", 1, fire_naive, delivery)
        .await
        .unwrap();

    let pending = scheduler.list_pending().await;
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].fire_at, pending[1].fire_at);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(deliveries.lock().unwrap().len(), 2);
    assert!(scheduler.list_pending().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn naive_time_in_a_dst_gap_is_rejected() {
    let (deliveries, delivery) = recording();
    let scheduler = scheduler();

    // Europe/Warsaw jumps 02:00 -> 03:00 on 2027-03-28; 02:30 never exists.
    let gap = NaiveDate::from_ymd_opt(2027, 3, 28)
        .unwrap()
        .and_hms_opt(2, 30, 0)
        .unwrap();
    let result = scheduler
        .schedule_at("spring forward", 3, gap, delivery)
        .await;

    assert!(matches!(
        result.unwrap_err(),
        InvalidScheduleError::NonexistentLocalTime(..)
    ));
    assert!(scheduler.list_pending().await.is_empty());
    assert!(deliveries.lock().unwrap().is_empty());
}

#[test]
fn ambiguous_fall_back_time_resolves_to_the_earlier_instant() {
    // Clocks roll back 03:00 -> 02:00 on 2026-10-25; 02:30 happens twice.
    // The earlier occurrence is still on summer time (UTC+2).
    let ambiguous = NaiveDate::from_ymd_opt(2026, 10, 25)
        .unwrap()
        .and_hms_opt(2, 30, 0)
        .unwrap();

    let resolved = FireTime::Local(ambiguous).resolve(DEFAULT_TIMEZONE).unwrap();

    assert_eq!(resolved.naive_local(), ambiguous);
    assert_eq!(resolved.naive_utc(), ambiguous - TimeDelta::hours(2));
}

#[tokio::test(start_paused = true)]
async fn enumeration_tracks_cancellations() {
    let (_, delivery) = recording();
    let scheduler = scheduler();

    let mut ids = Vec::new();
    for n in 0..4 {
        let id = scheduler
            .schedule_after(
                format!("command {n}"),
                n,
                Duration::from_secs(600),
                Arc::clone(&delivery) as Arc<dyn CommandDelivery>,
            )
            .await;
        ids.push(id);
    }

    assert!(scheduler.cancel(&ids[1]).await);
    assert!(scheduler.cancel(&ids[3]).await);

    let pending = scheduler.list_pending().await;
    let surviving: Vec<_> = pending.iter().map(|entry| entry.id.as_str()).collect();
    assert_eq!(surviving, vec![ids[0].as_str(), ids[2].as_str()]);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn delivery_failure_still_removes_the_entry() {
    let scheduler = scheduler();

    scheduler
        .schedule_after(
            "doomed",
            9,
            Duration::from_secs(1),
            Arc::new(FailingDelivery),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(scheduler.list_pending().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn pending_snapshot_carries_command_and_target() {
    let (_, delivery) = recording();
    let scheduler = scheduler();

    let id = scheduler
        .schedule_after("buy milk", 1234, Duration::from_secs(30), delivery)
        .await;

    let pending = scheduler.list_pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].command, "buy milk");
    assert_eq!(pending[0].target, 1234);

    scheduler.shutdown().await;
}
