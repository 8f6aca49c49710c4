use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Image,
    Voice,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::Image => "IMAGE",
            MessageType::Voice => "VOICE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TEXT" => Some(MessageType::Text),
            "IMAGE" => Some(MessageType::Image),
            "VOICE" => Some(MessageType::Voice),
            _ => None,
        }
    }

    pub fn carries_media(&self) -> bool {
        !matches!(self, MessageType::Text)
    }
}

/// A stored message. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message_type: MessageType,
    pub text_content: Option<String>,
    pub media_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload handed to the message store; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message_type: MessageType,
    pub text_content: Option<String>,
    pub media_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub message_type: MessageType,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub media_path: Option<String>,
}

impl SendMessageRequest {
    pub fn text(receiver_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            receiver_id,
            message_type: MessageType::Text,
            text_content: Some(text.into()),
            media_path: None,
        }
    }

    /// Checks the receiver and that the payload matches the message type
    pub fn validate(&self, sender_id: Uuid) -> Result<(), AppError> {
        if self.receiver_id == sender_id {
            return Err(AppError::InvalidPair);
        }

        match self.message_type {
            MessageType::Text => {
                let has_text = self
                    .text_content
                    .as_deref()
                    .map(|t| !t.trim().is_empty())
                    .unwrap_or(false);
                if !has_text {
                    return Err(AppError::BadRequest(
                        "text message requires non-empty text_content".into(),
                    ));
                }
            }
            MessageType::Image | MessageType::Voice => {
                let has_media = self
                    .media_path
                    .as_deref()
                    .map(|p| !p.trim().is_empty())
                    .unwrap_or(false);
                if !has_media {
                    return Err(AppError::BadRequest(format!(
                        "{} message requires media_path",
                        self.message_type.as_str()
                    )));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn into_new_message(self, sender_id: Uuid) -> NewMessage {
        // Only the payload that belongs to the type is kept; a caption on media is fine.
        let media_path = if self.message_type.carries_media() {
            self.media_path
        } else {
            None
        };
        NewMessage {
            sender_id,
            receiver_id: self.receiver_id,
            message_type: self.message_type,
            text_content: self.text_content,
            media_path,
        }
    }
}

/// Raw media attached to a send request before it reaches the media store
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl MediaUpload {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension including the leading dot, taken from the original name
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| name.rfind('.').map(|idx| &name[idx..]))
            .filter(|ext| ext.len() > 1 && ext.len() <= 10 && ext[1..].chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }
}
