use crate::error::{AppError, AppResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MIN_RETENTION_COUNT: u32 = 1;
pub const MAX_RETENTION_COUNT: u32 = 100;

/// Snapshot of the retention policy. Always read and written as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSettings {
    pub count: u32,
    pub enabled: bool,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            count: 3,
            enabled: true,
        }
    }
}

/// Process-wide retention policy shared by the send path and the scheduler.
///
/// Cloning yields another handle onto the same settings. A change applies to
/// enforcement calls that start after `set` returns.
#[derive(Debug, Clone, Default)]
pub struct RetentionConfig {
    inner: Arc<RwLock<RetentionSettings>>,
}

impl RetentionConfig {
    pub fn new(initial: RetentionSettings) -> AppResult<Self> {
        validate_count(initial.count)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(initial)),
        })
    }

    pub fn get(&self) -> RetentionSettings {
        *self.inner.read()
    }

    pub fn set(&self, count: u32, enabled: bool) -> AppResult<RetentionSettings> {
        validate_count(count)?;
        let updated = RetentionSettings { count, enabled };
        *self.inner.write() = updated;
        tracing::info!(count, enabled, "retention config updated");
        Ok(updated)
    }
}

fn validate_count(count: u32) -> AppResult<()> {
    if (MIN_RETENTION_COUNT..=MAX_RETENTION_COUNT).contains(&count) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "retention count must be between {MIN_RETENTION_COUNT} and {MAX_RETENTION_COUNT}, got {count}"
        )))
    }
}
