//! Single entry point for callers: send, read and delete messages, and the
//! retention administration operations.

use crate::error::{AppError, AppResult};
use crate::models::{ConversationKey, MediaUpload, Message, MessageType, SendMessageRequest};
use crate::services::communication_gate::{CommunicationGate, GateDecision};
use crate::services::retention::{EnforcementResult, RetentionPolicyEngine, RetentionStats, SweepReport};
use crate::services::retention_config::RetentionSettings;
use crate::store::{bounded, MediaKind, MediaStore, MessageStore, SortOrder};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct MessagingFacade {
    messages: Arc<dyn MessageStore>,
    media: Arc<dyn MediaStore>,
    gate: CommunicationGate,
    engine: RetentionPolicyEngine,
    store_timeout: Duration,
}

impl MessagingFacade {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        media: Arc<dyn MediaStore>,
        gate: CommunicationGate,
        engine: RetentionPolicyEngine,
        store_timeout: Duration,
    ) -> Self {
        Self {
            messages,
            media,
            gate,
            engine,
            store_timeout,
        }
    }

    pub fn gate(&self) -> &CommunicationGate {
        &self.gate
    }

    pub fn engine(&self) -> &RetentionPolicyEngine {
        &self.engine
    }

    /// Media messages are refused here: their path must come from
    /// [`send_with_media`](Self::send_with_media), never from the caller.
    pub async fn send(&self, sender_id: Uuid, request: SendMessageRequest) -> AppResult<Message> {
        if request.message_type.carries_media() || request.media_path.is_some() {
            return Err(AppError::BadRequest(
                "IMAGE and VOICE messages must be sent with a media upload".into(),
            ));
        }
        self.deliver(sender_id, request).await
    }

    async fn deliver(&self, sender_id: Uuid, request: SendMessageRequest) -> AppResult<Message> {
        request.validate(sender_id)?;
        let receiver_id = request.receiver_id;

        let decision = self.gate.check_or_establish(sender_id, receiver_id).await?;
        if !decision.is_permitted() {
            return Err(AppError::CommunicationNotPermitted);
        }

        let message = bounded(
            self.store_timeout,
            self.messages.insert(request.into_new_message(sender_id)),
        )
        .await?;

        // The message is durable from here on; later failures are logged only
        if decision != GateDecision::Permitted {
            if let Err(e) = self.gate.establish(sender_id, receiver_id).await {
                tracing::error!(message_id = message.id, error = %e, "failed to establish communication relation");
            }
        }

        if let Err(e) = self.engine.enforce(sender_id, receiver_id).await {
            tracing::warn!(message_id = message.id, error = %e, "inline retention enforcement failed");
        }

        tracing::debug!(
            message_id = message.id,
            sender = %sender_id,
            receiver = %receiver_id,
            message_type = message.message_type.as_str(),
            "message sent"
        );
        Ok(message)
    }

    /// Store the upload first, then send a message pointing at it. The blob is
    /// removed again if the send is rejected, but kept when the insert timed out.
    pub async fn send_with_media(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        message_type: MessageType,
        text_content: Option<String>,
        upload: Option<MediaUpload>,
    ) -> AppResult<Message> {
        let upload = upload.filter(|u| !u.is_empty());

        let media_path = match upload {
            Some(upload) => {
                let kind = MediaKind::for_message_type(message_type).ok_or_else(|| {
                    AppError::BadRequest("media upload is only valid for IMAGE or VOICE messages".into())
                })?;
                if receiver_id == sender_id {
                    return Err(AppError::InvalidPair);
                }
                let ext = upload.extension();
                let path = self
                    .media
                    .save(kind, &ext, upload.bytes)
                    .await
                    .map_err(|e| AppError::Media(e.to_string()))?;
                Some(path)
            }
            None => None,
        };

        let request = SendMessageRequest {
            receiver_id,
            message_type,
            text_content,
            media_path: media_path.clone(),
        };

        match self.deliver(sender_id, request).await {
            Ok(message) => Ok(message),
            // Outcome unknown: the insert may have committed
            Err(e @ AppError::StoreTimeout(_)) => {
                tracing::warn!(path = ?media_path, error = %e, "send outcome unknown, keeping uploaded media");
                Err(e)
            }
            Err(e) => {
                if let Some(path) = media_path.as_deref() {
                    if let Err(cleanup) = self.media.delete(path).await {
                        tracing::warn!(path, error = %cleanup, "failed to remove media of rejected send");
                    }
                }
                Err(e)
            }
        }
    }

    /// Newest first. Capped at the retention count while retention is enabled.
    pub async fn get_conversation(&self, user_id: Uuid, other_user_id: Uuid) -> AppResult<Vec<Message>> {
        let key = ConversationKey::new(user_id, other_user_id)?;
        let settings = self.engine.config().get();
        let limit = settings.enabled.then_some(settings.count as usize);

        bounded(
            self.store_timeout,
            self.messages.find_messages_between(&key, SortOrder::Desc, limit),
        )
        .await
    }

    /// Only the sender may delete a message.
    pub async fn delete_message(&self, message_id: i64, requester_id: Uuid) -> AppResult<()> {
        let message = bounded(self.store_timeout, self.messages.find_by_id(message_id))
            .await?
            .ok_or(AppError::NotFound)?;

        if message.sender_id != requester_id {
            return Err(AppError::Forbidden);
        }

        if let Some(path) = message.media_path.as_deref() {
            self.engine.delete_media(message.id, path).await;
        }

        bounded(self.store_timeout, self.messages.delete_by_id(message.id)).await?;
        tracing::info!(message_id, requester = %requester_id, "message deleted by sender");
        Ok(())
    }

    pub async fn get_retention_stats(&self, user_a: Uuid, user_b: Uuid) -> AppResult<RetentionStats> {
        self.engine.stats(user_a, user_b).await
    }

    pub async fn trigger_cleanup(&self, user_a: Uuid, user_b: Uuid) -> AppResult<EnforcementResult> {
        self.engine.enforce(user_a, user_b).await
    }

    pub async fn trigger_cleanup_all(&self) -> AppResult<SweepReport> {
        self.engine.sweep_all().await
    }

    pub fn get_retention_config(&self) -> RetentionSettings {
        self.engine.config().get()
    }

    pub fn update_retention_config(&self, count: u32, enabled: bool) -> AppResult<RetentionSettings> {
        self.engine.config().set(count, enabled)
    }
}
