//! Background jobs owned by the service process.

pub mod retention_scheduler;

pub use retention_scheduler::{
    next_daily_run, next_weekly_run, RetentionScheduler, SweepTrigger, TriggerOutcome,
};
