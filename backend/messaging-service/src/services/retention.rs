//! Keep-last-N retention per conversation.
//!
//! The oldest messages beyond the configured count are deleted one at a time,
//! media first (best-effort) and then the record. Deletes are idempotent, so
//! an inline enforcement racing a scheduled sweep on the same pair is harmless.

use crate::error::AppResult;
use crate::metrics;
use crate::models::ConversationKey;
use crate::services::retention_config::RetentionConfig;
use crate::store::{bounded, MediaStore, MessageStore, SortOrder};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnforcementResult {
    pub deleted: usize,
    pub remaining: usize,
    /// Messages in the deletion set whose removal failed; retried next pass
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionStats {
    pub total_messages: usize,
    pub retention_count: u32,
    pub messages_to_delete: usize,
}

impl RetentionStats {
    pub fn needs_cleanup(&self) -> bool {
        self.messages_to_delete > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub conversation: ConversationKey,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub conversations: usize,
    pub enforced: usize,
    pub deleted: usize,
    pub failures: Vec<SweepFailure>,
    /// Only filled by a deep sweep: conversations still above the budget afterwards
    pub still_over_budget: Option<usize>,
}

impl SweepReport {
    pub(crate) fn absorb(&mut self, key: ConversationKey, outcome: AppResult<EnforcementResult>) {
        match outcome {
            Ok(result) => {
                self.enforced += 1;
                self.deleted += result.deleted;
            }
            Err(e) => self.failures.push(SweepFailure {
                conversation: key,
                error: e.to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct RetentionPolicyEngine {
    messages: Arc<dyn MessageStore>,
    media: Arc<dyn MediaStore>,
    config: RetentionConfig,
    store_timeout: Duration,
    sweep_concurrency: usize,
}

impl RetentionPolicyEngine {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        media: Arc<dyn MediaStore>,
        config: RetentionConfig,
        store_timeout: Duration,
        sweep_concurrency: usize,
    ) -> Self {
        Self {
            messages,
            media,
            config,
            store_timeout,
            sweep_concurrency: sweep_concurrency.max(1),
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    pub async fn enforce(&self, user_a: Uuid, user_b: Uuid) -> AppResult<EnforcementResult> {
        let key = ConversationKey::new(user_a, user_b)?;
        self.enforce_key(&key).await
    }

    pub async fn enforce_key(&self, key: &ConversationKey) -> AppResult<EnforcementResult> {
        let outcome = self.enforce_inner(key).await;
        match &outcome {
            Ok(result) => {
                metrics::record_enforcement("success");
                metrics::record_messages_deleted(result.deleted as u64);
            }
            Err(e) => {
                metrics::record_enforcement("error");
                tracing::warn!(conversation = %key, error = %e, "retention enforcement failed");
            }
        }
        outcome
    }

    async fn enforce_inner(&self, key: &ConversationKey) -> AppResult<EnforcementResult> {
        // One snapshot of the settings for the whole call
        let settings = self.config.get();

        let ids = bounded(
            self.store_timeout,
            self.messages.find_ids_between(key, SortOrder::Asc),
        )
        .await?;

        if !settings.enabled {
            return Ok(EnforcementResult {
                deleted: 0,
                remaining: ids.len(),
                failed: 0,
            });
        }

        let keep = settings.count as usize;
        if ids.len() <= keep {
            return Ok(EnforcementResult {
                deleted: 0,
                remaining: ids.len(),
                failed: 0,
            });
        }

        let excess = ids.len() - keep;
        let mut deleted = 0;
        let mut failed = 0;

        for &id in &ids[..excess] {
            match self.delete_message_and_media(id).await {
                Ok(true) => deleted += 1,
                // Someone else removed it first
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    tracing::warn!(conversation = %key, message_id = id, error = %e, "failed to delete expired message");
                }
            }
        }

        let result = EnforcementResult {
            deleted,
            remaining: keep + failed,
            failed,
        };
        if deleted > 0 {
            tracing::info!(
                conversation = %key,
                deleted = result.deleted,
                remaining = result.remaining,
                "retention policy enforced"
            );
        }
        Ok(result)
    }

    /// Removes media (best-effort) and then the record. `Ok(false)` if the
    /// message was already gone.
    pub async fn delete_message_and_media(&self, id: i64) -> AppResult<bool> {
        let Some(message) = bounded(self.store_timeout, self.messages.find_by_id(id)).await? else {
            return Ok(false);
        };

        if let Some(path) = message.media_path.as_deref() {
            self.delete_media(id, path).await;
        }

        bounded(self.store_timeout, self.messages.delete_by_id(id)).await
    }

    /// Never fails: an orphaned blob is preferable to a row pointing at nothing
    pub(crate) async fn delete_media(&self, message_id: i64, path: &str) {
        match tokio::time::timeout(self.store_timeout, self.media.delete(path)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                metrics::record_media_delete_failure();
                tracing::warn!(message_id, path, error = %e, "media deletion failed, continuing");
            }
            Err(_) => {
                metrics::record_media_delete_failure();
                tracing::warn!(message_id, path, "media deletion timed out, continuing");
            }
        }
    }

    /// Read-only preview of what enforcement would remove right now.
    pub async fn stats(&self, user_a: Uuid, user_b: Uuid) -> AppResult<RetentionStats> {
        let key = ConversationKey::new(user_a, user_b)?;
        self.stats_key(&key).await
    }

    async fn stats_key(&self, key: &ConversationKey) -> AppResult<RetentionStats> {
        let total = bounded(
            self.store_timeout,
            self.messages.find_ids_between(key, SortOrder::Asc),
        )
        .await?
        .len();
        let retention_count = self.config.get().count;
        Ok(RetentionStats {
            total_messages: total,
            retention_count,
            messages_to_delete: total.saturating_sub(retention_count as usize),
        })
    }

    /// Every conversation that has ever exchanged a message.
    pub async fn conversations(&self) -> AppResult<Vec<ConversationKey>> {
        bounded(self.store_timeout, self.messages.distinct_pairs()).await
    }

    /// Enforce on every known conversation. Per-pair failures are collected in
    /// the report; only failing to list the pairs is an error.
    pub async fn sweep_all(&self) -> AppResult<SweepReport> {
        if !self.config.get().enabled {
            return Ok(SweepReport::default());
        }

        let pairs = self.conversations().await?;
        let mut report = SweepReport {
            conversations: pairs.len(),
            ..SweepReport::default()
        };

        let mut outcomes = stream::iter(pairs)
            .map(|key| async move { (key, self.enforce_key(&key).await) })
            .buffer_unordered(self.sweep_concurrency);

        while let Some((key, outcome)) = outcomes.next().await {
            report.absorb(key, outcome);
        }

        Ok(report)
    }

    /// Full sweep followed by a stats pass that counts conversations still
    /// over budget (failed deletes, or sends that raced the sweep).
    pub async fn deep_sweep(&self) -> AppResult<SweepReport> {
        let mut report = self.sweep_all().await?;
        if !self.config.get().enabled {
            return Ok(report);
        }

        let pairs = self.conversations().await?;
        let mut over_budget = 0;
        for key in &pairs {
            match self.stats_key(key).await {
                Ok(stats) if stats.needs_cleanup() => {
                    over_budget += 1;
                    tracing::info!(
                        conversation = %key,
                        total = stats.total_messages,
                        to_delete = stats.messages_to_delete,
                        "conversation still over retention budget"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(conversation = %key, error = %e, "stats check failed during deep sweep");
                }
            }
        }
        report.still_over_budget = Some(over_budget);
        Ok(report)
    }
}
