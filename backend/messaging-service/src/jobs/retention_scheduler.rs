//! Background retention sweeps.
//!
//! Three independent triggers drive the retention engine:
//! - hourly: light pass, enumerates pairs and enforces each one in turn
//! - daily (02:00 UTC by default): full concurrent sweep
//! - weekly (Sunday 03:00 UTC by default): full sweep plus a budget re-check
//!
//! A trigger never overlaps with itself; a run past the wall-clock budget is
//! dropped and picked up again on the next tick.

use crate::config::ScheduleConfig;
use crate::error::AppResult;
use crate::metrics;
use crate::services::retention::{RetentionPolicyEngine, SweepReport};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, TimeZone, Utc, Weekday};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepTrigger {
    Hourly,
    Daily,
    Weekly,
}

impl SweepTrigger {
    pub const ALL: [SweepTrigger; 3] = [SweepTrigger::Hourly, SweepTrigger::Daily, SweepTrigger::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepTrigger::Hourly => "hourly",
            SweepTrigger::Daily => "daily",
            SweepTrigger::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Disabled,
    AlreadyRunning,
    Completed(SweepReport),
    Failed(String),
    Abandoned,
}

/// Holds a trigger's running flag; released on drop, including when the run
/// future is cancelled by the budget timeout.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RetentionScheduler {
    engine: RetentionPolicyEngine,
    schedule: ScheduleConfig,
    hourly_running: AtomicBool,
    daily_running: AtomicBool,
    weekly_running: AtomicBool,
}

impl RetentionScheduler {
    pub fn new(engine: RetentionPolicyEngine, schedule: ScheduleConfig) -> Self {
        Self {
            engine,
            schedule,
            hourly_running: AtomicBool::new(false),
            daily_running: AtomicBool::new(false),
            weekly_running: AtomicBool::new(false),
        }
    }

    fn flag(&self, trigger: SweepTrigger) -> &AtomicBool {
        match trigger {
            SweepTrigger::Hourly => &self.hourly_running,
            SweepTrigger::Daily => &self.daily_running,
            SweepTrigger::Weekly => &self.weekly_running,
        }
    }

    pub fn is_running(&self, trigger: SweepTrigger) -> bool {
        self.flag(trigger).load(Ordering::Acquire)
    }

    /// One guarded pass of `trigger`. Never returns an error: failures are
    /// logged, counted and reported in the outcome.
    pub async fn run_trigger(&self, trigger: SweepTrigger) -> TriggerOutcome {
        let name = trigger.as_str();

        if !self.engine.config().get().enabled {
            metrics::record_sweep_run(name, "skipped");
            return TriggerOutcome::Disabled;
        }

        let Some(_guard) = RunGuard::try_acquire(self.flag(trigger)) else {
            warn!(trigger = name, "previous run still in progress, skipping");
            metrics::record_sweep_run(name, "skipped");
            return TriggerOutcome::AlreadyRunning;
        };

        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.schedule.run_budget, self.execute(trigger)).await {
            Ok(Ok(report)) => {
                info!(
                    trigger = name,
                    conversations = report.conversations,
                    enforced = report.enforced,
                    deleted = report.deleted,
                    failures = report.failures.len(),
                    still_over_budget = ?report.still_over_budget,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "retention sweep completed"
                );
                for failure in &report.failures {
                    warn!(trigger = name, conversation = %failure.conversation, error = %failure.error, "conversation skipped by sweep");
                }
                metrics::record_sweep_run(name, "success");
                metrics::set_sweep_conversations(report.conversations as i64);
                TriggerOutcome::Completed(report)
            }
            Ok(Err(e)) => {
                error!(trigger = name, error = %e, "retention sweep failed");
                metrics::record_sweep_run(name, "error");
                TriggerOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    trigger = name,
                    budget_secs = self.schedule.run_budget.as_secs(),
                    "retention sweep exceeded its budget, abandoned until next tick"
                );
                metrics::record_sweep_run(name, "abandoned");
                TriggerOutcome::Abandoned
            }
        };
        metrics::record_sweep_duration(name, start.elapsed());
        outcome
    }

    async fn execute(&self, trigger: SweepTrigger) -> AppResult<SweepReport> {
        match trigger {
            SweepTrigger::Hourly => self.light_pass().await,
            SweepTrigger::Daily => self.engine.sweep_all().await,
            SweepTrigger::Weekly => self.engine.deep_sweep().await,
        }
    }

    async fn light_pass(&self) -> AppResult<SweepReport> {
        let pairs = self.engine.conversations().await?;
        let mut report = SweepReport {
            conversations: pairs.len(),
            ..SweepReport::default()
        };
        for key in pairs {
            let outcome = self.engine.enforce_key(&key).await;
            report.absorb(key, outcome);
        }
        Ok(report)
    }

    /// Spawn the three trigger loops. They stop when `shutdown` fires.
    pub fn start(self: &Arc<Self>, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        info!(
            hourly_interval_secs = self.schedule.hourly_interval.as_secs(),
            daily_hour_utc = self.schedule.daily_hour_utc,
            weekly_hour_utc = self.schedule.weekly_hour_utc,
            "starting retention scheduler"
        );
        SweepTrigger::ALL
            .into_iter()
            .map(|trigger| {
                let scheduler = Arc::clone(self);
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move { scheduler.run_loop(trigger, shutdown_rx).await })
            })
            .collect()
    }

    async fn run_loop(self: Arc<Self>, trigger: SweepTrigger, mut shutdown: broadcast::Receiver<()>) {
        let name = trigger.as_str();
        let mut interval = tokio::time::interval(self.schedule.hourly_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wait = match trigger {
                SweepTrigger::Hourly => None,
                SweepTrigger::Daily => Some(until(next_daily_run(Utc::now(), self.schedule.daily_hour_utc))),
                SweepTrigger::Weekly => Some(until(next_weekly_run(
                    Utc::now(),
                    Weekday::Sun,
                    self.schedule.weekly_hour_utc,
                ))),
            };

            tokio::select! {
                _ = async {
                    match wait {
                        Some(wait) => tokio::time::sleep(wait).await,
                        None => {
                            interval.tick().await;
                        }
                    }
                } => {
                    self.run_trigger(trigger).await;
                }
                _ = shutdown.recv() => {
                    info!(trigger = name, "received shutdown signal, stopping retention loop");
                    break;
                }
            }
        }
    }
}

fn until(at: DateTime<Utc>) -> Duration {
    (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Next `hour:00` UTC strictly after `now`
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default();
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Next `weekday hour:00` UTC strictly after `now`
pub fn next_weekly_run(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default();
    let days_ahead = (7 + weekday.num_days_from_monday() - now.weekday().num_days_from_monday()) % 7;
    let date = now.date_naive() + ChronoDuration::days(i64::from(days_ahead));
    let candidate = Utc.from_utc_datetime(&date.and_time(at));
    if candidate > now {
        candidate
    } else {
        candidate + ChronoDuration::days(7)
    }
}
