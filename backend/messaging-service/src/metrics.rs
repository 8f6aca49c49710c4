//! Prometheus metrics for retention enforcement and the sweep scheduler

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Duration;

/// Per-conversation enforcement calls (success/error)
static ENFORCEMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "retention_enforcements_total",
        "Total retention enforcement calls per conversation (success/error)",
        &["status"]
    )
    .expect("failed to register retention_enforcements_total")
});

static MESSAGES_DELETED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "retention_messages_deleted_total",
        "Total messages removed by the retention policy"
    )
    .expect("failed to register retention_messages_deleted_total")
});

/// Media blobs that could not be removed; the message record was deleted anyway
static MEDIA_DELETE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "retention_media_delete_failures_total",
        "Media blobs left behind because deletion failed"
    )
    .expect("failed to register retention_media_delete_failures_total")
});

static SWEEP_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "retention_sweep_runs_total",
        "Scheduled retention sweeps by trigger and outcome",
        &["trigger", "status"]
    )
    .expect("failed to register retention_sweep_runs_total")
});

static SWEEP_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "retention_sweep_duration_seconds",
        "Duration of scheduled retention sweeps",
        &["trigger"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    )
    .expect("failed to register retention_sweep_duration_seconds")
});

/// Conversations visited by the most recent sweep
static SWEEP_CONVERSATIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "retention_sweep_conversations",
        "Number of conversations visited in the last retention sweep"
    )
    .expect("failed to register retention_sweep_conversations")
});

pub fn record_enforcement(status: &str) {
    ENFORCEMENTS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_messages_deleted(count: u64) {
    if count > 0 {
        MESSAGES_DELETED_TOTAL.inc_by(count);
    }
}

pub fn record_media_delete_failure() {
    MEDIA_DELETE_FAILURES_TOTAL.inc();
}

pub fn record_sweep_run(trigger: &str, status: &str) {
    SWEEP_RUNS_TOTAL.with_label_values(&[trigger, status]).inc();
}

pub fn record_sweep_duration(trigger: &str, duration: Duration) {
    SWEEP_DURATION_SECONDS
        .with_label_values(&[trigger])
        .observe(duration.as_secs_f64());
}

pub fn set_sweep_conversations(count: i64) {
    SWEEP_CONVERSATIONS.set(count);
}

/// Text exposition of the default registry for `GET /metrics`
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
