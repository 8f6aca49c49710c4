#![allow(dead_code)]

use async_trait::async_trait;
use messaging_service::error::{AppError, AppResult};
use messaging_service::models::{ConversationKey, Message, MessageType, NewMessage};
use messaging_service::services::{
    CommunicationGate, MessagingFacade, RetentionConfig, RetentionPolicyEngine, RetentionSettings,
};
use messaging_service::store::{
    InMemoryMediaStore, InMemoryMessageStore, InMemoryRelationStore, MessageStore, SortOrder,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Message store that fails lookups for chosen conversations
#[derive(Default)]
pub struct FlakyMessageStore {
    pub inner: InMemoryMessageStore,
    failing: Mutex<HashSet<ConversationKey>>,
}

impl FlakyMessageStore {
    pub fn fail_pair(&self, key: ConversationKey) {
        self.failing.lock().insert(key);
    }

    fn check(&self, key: &ConversationKey) -> AppResult<()> {
        if self.failing.lock().contains(key) {
            Err(AppError::StoreUnavailable(format!("injected failure for {key}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageStore for FlakyMessageStore {
    async fn insert(&self, message: NewMessage) -> AppResult<Message> {
        self.inner.insert(message).await
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        self.inner.delete_by_id(id).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Message>> {
        self.inner.find_by_id(id).await
    }

    async fn find_ids_between(&self, key: &ConversationKey, order: SortOrder) -> AppResult<Vec<i64>> {
        self.check(key)?;
        self.inner.find_ids_between(key, order).await
    }

    async fn find_messages_between(
        &self,
        key: &ConversationKey,
        order: SortOrder,
        limit: Option<usize>,
    ) -> AppResult<Vec<Message>> {
        self.check(key)?;
        self.inner.find_messages_between(key, order, limit).await
    }

    async fn find_last_between(&self, key: &ConversationKey) -> AppResult<Option<Message>> {
        self.check(key)?;
        self.inner.find_last_between(key).await
    }

    async fn count_from_to(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<u64> {
        self.inner.count_from_to(sender_id, receiver_id).await
    }

    async fn distinct_pairs(&self) -> AppResult<Vec<ConversationKey>> {
        self.inner.distinct_pairs().await
    }
}

/// Message store whose pair listing takes `delay`, for overlap and budget tests.
/// Inserts can be slowed too; the row still lands once the delay has passed.
pub struct SlowMessageStore {
    pub inner: InMemoryMessageStore,
    pub delay: Duration,
    pub insert_delay: Duration,
}

impl SlowMessageStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryMessageStore::new(),
            delay,
            insert_delay: Duration::ZERO,
        }
    }

    pub fn with_insert_delay(insert_delay: Duration) -> Self {
        Self {
            insert_delay,
            ..Self::new(Duration::ZERO)
        }
    }
}

#[async_trait]
impl MessageStore for SlowMessageStore {
    async fn insert(&self, message: NewMessage) -> AppResult<Message> {
        if !self.insert_delay.is_zero() {
            tokio::time::sleep(self.insert_delay).await;
        }
        self.inner.insert(message).await
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        self.inner.delete_by_id(id).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Message>> {
        self.inner.find_by_id(id).await
    }

    async fn find_ids_between(&self, key: &ConversationKey, order: SortOrder) -> AppResult<Vec<i64>> {
        self.inner.find_ids_between(key, order).await
    }

    async fn find_messages_between(
        &self,
        key: &ConversationKey,
        order: SortOrder,
        limit: Option<usize>,
    ) -> AppResult<Vec<Message>> {
        self.inner.find_messages_between(key, order, limit).await
    }

    async fn find_last_between(&self, key: &ConversationKey) -> AppResult<Option<Message>> {
        self.inner.find_last_between(key).await
    }

    async fn count_from_to(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<u64> {
        self.inner.count_from_to(sender_id, receiver_id).await
    }

    async fn distinct_pairs(&self) -> AppResult<Vec<ConversationKey>> {
        tokio::time::sleep(self.delay).await;
        self.inner.distinct_pairs().await
    }
}

/// Every collaborator of the facade wired against in-memory stores
pub struct Harness<S: MessageStore + 'static> {
    pub messages: Arc<S>,
    pub media: Arc<InMemoryMediaStore>,
    pub relations: Arc<InMemoryRelationStore>,
    pub config: RetentionConfig,
    pub engine: RetentionPolicyEngine,
    pub facade: MessagingFacade,
}

impl<S: MessageStore + 'static> Harness<S> {
    pub fn with_store(messages: S, settings: RetentionSettings) -> Self {
        let messages = Arc::new(messages);
        let media = Arc::new(InMemoryMediaStore::new());
        let relations = Arc::new(InMemoryRelationStore::new());
        let config = RetentionConfig::new(settings).expect("valid retention settings");
        let engine = RetentionPolicyEngine::new(
            messages.clone(),
            media.clone(),
            config.clone(),
            STORE_TIMEOUT,
            4,
        );
        let gate = CommunicationGate::new(messages.clone(), relations.clone(), STORE_TIMEOUT);
        let facade = MessagingFacade::new(
            messages.clone(),
            media.clone(),
            gate,
            engine.clone(),
            STORE_TIMEOUT,
        );
        Self {
            messages,
            media,
            relations,
            config,
            engine,
            facade,
        }
    }
}

pub fn harness(settings: RetentionSettings) -> Harness<InMemoryMessageStore> {
    Harness::with_store(InMemoryMessageStore::new(), settings)
}

pub fn text(sender: Uuid, receiver: Uuid, body: &str) -> NewMessage {
    NewMessage {
        sender_id: sender,
        receiver_id: receiver,
        message_type: MessageType::Text,
        text_content: Some(body.to_string()),
        media_path: None,
    }
}

pub fn media(sender: Uuid, receiver: Uuid, message_type: MessageType, path: &str) -> NewMessage {
    NewMessage {
        sender_id: sender,
        receiver_id: receiver,
        message_type,
        text_content: None,
        media_path: Some(path.to_string()),
    }
}

pub fn retention(count: u32, enabled: bool) -> RetentionSettings {
    RetentionSettings { count, enabled }
}
