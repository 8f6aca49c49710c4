mod common;

use common::{retention, text, FlakyMessageStore, Harness, SlowMessageStore};
use messaging_service::config::ScheduleConfig;
use messaging_service::jobs::{RetentionScheduler, SweepTrigger, TriggerOutcome};
use messaging_service::models::ConversationKey;
use messaging_service::store::MessageStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn schedule(run_budget: Duration) -> ScheduleConfig {
    ScheduleConfig {
        run_budget,
        ..ScheduleConfig::default()
    }
}

#[tokio::test]
async fn same_trigger_never_overlaps() {
    let h = Harness::with_store(SlowMessageStore::new(Duration::from_millis(300)), retention(1, true));
    let scheduler = Arc::new(RetentionScheduler::new(h.engine.clone(), schedule(Duration::from_secs(10))));

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_trigger(SweepTrigger::Daily).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(scheduler.is_running(SweepTrigger::Daily));

    assert_eq!(
        scheduler.run_trigger(SweepTrigger::Daily).await,
        TriggerOutcome::AlreadyRunning
    );
    // other triggers have their own guard
    assert!(matches!(
        scheduler.run_trigger(SweepTrigger::Hourly).await,
        TriggerOutcome::Completed(_)
    ));

    assert!(matches!(first.await.unwrap(), TriggerOutcome::Completed(_)));
    assert!(!scheduler.is_running(SweepTrigger::Daily));
}

#[tokio::test]
async fn run_over_budget_is_abandoned_and_retried() {
    let h = Harness::with_store(SlowMessageStore::new(Duration::from_millis(400)), retention(1, true));
    let scheduler = RetentionScheduler::new(h.engine.clone(), schedule(Duration::from_millis(100)));

    assert_eq!(scheduler.run_trigger(SweepTrigger::Weekly).await, TriggerOutcome::Abandoned);
    // guard released so the next tick can try again
    assert!(!scheduler.is_running(SweepTrigger::Weekly));
    assert_eq!(scheduler.run_trigger(SweepTrigger::Weekly).await, TriggerOutcome::Abandoned);
}

#[tokio::test]
async fn failing_pair_is_reported_not_raised() {
    let h = Harness::with_store(FlakyMessageStore::default(), retention(1, true));
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    for _ in 0..3 {
        h.messages.insert(text(a, b, "m")).await.unwrap();
        h.messages.insert(text(a, c, "m")).await.unwrap();
    }
    let broken = ConversationKey::new(a, c).unwrap();
    h.messages.fail_pair(broken);

    let scheduler = RetentionScheduler::new(h.engine.clone(), ScheduleConfig::default());
    for trigger in [SweepTrigger::Hourly, SweepTrigger::Daily] {
        match scheduler.run_trigger(trigger).await {
            TriggerOutcome::Completed(report) => {
                assert_eq!(report.conversations, 2);
                assert_eq!(report.failures.len(), 1);
                assert_eq!(report.failures[0].conversation, broken);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(h.messages.inner.len(), 4);
}

#[tokio::test]
async fn disabling_retention_stops_scheduled_runs() {
    let h = common::harness(retention(1, true));
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    for _ in 0..3 {
        h.messages.insert(text(a, b, "m")).await.unwrap();
    }
    h.config.set(1, false).unwrap();

    let scheduler = RetentionScheduler::new(h.engine.clone(), ScheduleConfig::default());
    assert_eq!(scheduler.run_trigger(SweepTrigger::Hourly).await, TriggerOutcome::Disabled);
    assert_eq!(h.messages.len(), 3);

    h.config.set(1, true).unwrap();
    assert!(matches!(
        scheduler.run_trigger(SweepTrigger::Hourly).await,
        TriggerOutcome::Completed(_)
    ));
    assert_eq!(h.messages.len(), 1);
}
