use super::ConversationKey;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Durable record that two users may keep exchanging messages.
/// At most one exists per normalized key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunicationRelation {
    pub key: ConversationKey,
    pub can_communicate: bool,
    pub established_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommunicationRelation {
    pub fn established(key: ConversationKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            can_communicate: true,
            established_at: now,
            updated_at: now,
        }
    }
}
