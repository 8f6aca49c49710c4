//! Persistence seams for the messaging core.
//!
//! The services only talk to these traits. Postgres and S3/local-disk
//! implementations back the running service; the in-memory ones back local
//! development and the test suite.

pub mod media;
pub mod memory;
pub mod postgres;

use crate::error::{AppError, AppResult};
use crate::models::{CommunicationRelation, ConversationKey, Message, MessageType, NewMessage};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

pub use media::{LocalMediaStore, MediaError, S3MediaStore};
pub use memory::{InMemoryMediaStore, InMemoryMessageStore, InMemoryRelationStore};
pub use postgres::{PgMessageStore, PgRelationStore};

/// Creation-time ordering. Ties on `created_at` are always broken by id in the
/// same direction, so the order is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message; the store assigns the id and creation timestamp.
    async fn insert(&self, message: NewMessage) -> AppResult<Message>;

    /// Delete by id. Returns `false` when the id is already gone; that is not an error.
    async fn delete_by_id(&self, id: i64) -> AppResult<bool>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Message>>;

    /// Ids of every message in the conversation ordered by `(created_at, id)`.
    async fn find_ids_between(&self, key: &ConversationKey, order: SortOrder) -> AppResult<Vec<i64>>;

    async fn find_messages_between(
        &self,
        key: &ConversationKey,
        order: SortOrder,
        limit: Option<usize>,
    ) -> AppResult<Vec<Message>>;

    async fn find_last_between(&self, key: &ConversationKey) -> AppResult<Option<Message>>;

    /// Directional count: messages sent by `sender_id` to `receiver_id` only.
    async fn count_from_to(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<u64>;

    /// Every conversation that has ever exchanged a message.
    async fn distinct_pairs(&self) -> AppResult<Vec<ConversationKey>>;
}

#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn find(&self, key: &ConversationKey) -> AppResult<Option<CommunicationRelation>>;

    /// Insert or update the single relation row for `relation.key`.
    /// `established_at` of an existing row is preserved.
    async fn upsert(&self, relation: &CommunicationRelation) -> AppResult<()>;
}

/// Where a blob lives inside the media store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Voice,
}

impl MediaKind {
    pub fn for_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::Image => Some(MediaKind::Image),
            MessageType::Voice => Some(MediaKind::Voice),
            MessageType::Text => None,
        }
    }

    pub fn directory(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Voice => "voice-messages",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Voice => "voice",
        }
    }

    /// `images/image_<uuid>.jpg` style object name
    pub fn object_name(&self, extension: &str) -> String {
        format!(
            "{}/{}_{}{}",
            self.directory(),
            self.file_prefix(),
            Uuid::new_v4(),
            extension
        )
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store a blob and return the path to record on the message.
    async fn save(&self, kind: MediaKind, extension: &str, bytes: Vec<u8>) -> Result<String, MediaError>;

    /// Best-effort removal. `Ok(false)` means there was nothing to delete.
    async fn delete(&self, path: &str) -> Result<bool, MediaError>;
}

/// Run a store call under the configured bound, failing with `StoreTimeout`.
pub async fn bounded<F, T>(limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StoreTimeout(limit)),
    }
}
