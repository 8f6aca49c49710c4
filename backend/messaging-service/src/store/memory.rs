//! In-process stores used by `MESSAGE_STORE=memory` and by tests.

use super::{MediaError, MediaKind, MediaStore, MessageStore, RelationStore, SortOrder};
use crate::error::AppResult;
use crate::models::{CommunicationRelation, ConversationKey, Message, NewMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct MessageTable {
    next_id: i64,
    rows: BTreeMap<i64, Message>,
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    table: Mutex<MessageTable>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit creation time (seeding, clock-skew scenarios)
    pub fn insert_at(&self, message: NewMessage, created_at: DateTime<Utc>) -> Message {
        let mut table = self.table.lock();
        table.next_id += 1;
        let stored = Message {
            id: table.next_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message_type: message.message_type,
            text_content: message.text_content,
            media_path: message.media_path,
            created_at,
        };
        table.rows.insert(stored.id, stored.clone());
        stored
    }

    pub fn len(&self) -> usize {
        self.table.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn between(&self, key: &ConversationKey, order: SortOrder) -> Vec<Message> {
        let table = self.table.lock();
        let mut messages: Vec<Message> = table
            .rows
            .values()
            .filter(|m| {
                ConversationKey::new(m.sender_id, m.receiver_id)
                    .map(|k| k == *key)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if order == SortOrder::Desc {
            messages.reverse();
        }
        messages
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: NewMessage) -> AppResult<Message> {
        Ok(self.insert_at(message, Utc::now()))
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        Ok(self.table.lock().rows.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Message>> {
        Ok(self.table.lock().rows.get(&id).cloned())
    }

    async fn find_ids_between(&self, key: &ConversationKey, order: SortOrder) -> AppResult<Vec<i64>> {
        Ok(self.between(key, order).into_iter().map(|m| m.id).collect())
    }

    async fn find_messages_between(
        &self,
        key: &ConversationKey,
        order: SortOrder,
        limit: Option<usize>,
    ) -> AppResult<Vec<Message>> {
        let mut messages = self.between(key, order);
        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        Ok(messages)
    }

    async fn find_last_between(&self, key: &ConversationKey) -> AppResult<Option<Message>> {
        Ok(self.between(key, SortOrder::Desc).into_iter().next())
    }

    async fn count_from_to(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<u64> {
        let table = self.table.lock();
        let count = table
            .rows
            .values()
            .filter(|m| m.sender_id == sender_id && m.receiver_id == receiver_id)
            .count();
        Ok(count as u64)
    }

    async fn distinct_pairs(&self) -> AppResult<Vec<ConversationKey>> {
        let table = self.table.lock();
        let pairs: BTreeSet<ConversationKey> = table
            .rows
            .values()
            .filter_map(|m| ConversationKey::new(m.sender_id, m.receiver_id).ok())
            .collect();
        Ok(pairs.into_iter().collect())
    }
}

#[derive(Default)]
pub struct InMemoryRelationStore {
    relations: Mutex<HashMap<ConversationKey, CommunicationRelation>>,
}

impl InMemoryRelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.relations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RelationStore for InMemoryRelationStore {
    async fn find(&self, key: &ConversationKey) -> AppResult<Option<CommunicationRelation>> {
        Ok(self.relations.lock().get(key).cloned())
    }

    async fn upsert(&self, relation: &CommunicationRelation) -> AppResult<()> {
        let mut relations = self.relations.lock();
        relations
            .entry(relation.key)
            .and_modify(|existing| {
                existing.can_communicate = relation.can_communicate;
                existing.updated_at = relation.updated_at;
            })
            .or_insert_with(|| relation.clone());
        Ok(())
    }
}

/// Media store that keeps only blob names and counts calls
#[derive(Default)]
pub struct InMemoryMediaStore {
    blobs: Mutex<HashSet<String>>,
    delete_calls: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>) {
        self.blobs.lock().insert(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().contains(path)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent delete fail, to exercise the best-effort path
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn save(&self, kind: MediaKind, extension: &str, bytes: Vec<u8>) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        let path = format!("mem://{}", kind.object_name(extension));
        self.blobs.lock().insert(path.clone());
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<bool, MediaError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MediaError::Backend(format!("simulated failure deleting {path}")));
        }
        Ok(self.blobs.lock().remove(path))
    }
}
