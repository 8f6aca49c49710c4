//! Decides whether a sender may message a receiver, and records the
//! symmetric "can communicate" relation once a send has been persisted.

use crate::error::AppResult;
use crate::models::{CommunicationRelation, ConversationKey};
use crate::store::{bounded, MessageStore, RelationStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A relation exists and allows communication
    Permitted,
    /// No relation yet, but the sender has never messaged this receiver
    FirstContact,
    NotPermitted,
}

impl GateDecision {
    pub fn is_permitted(&self) -> bool {
        !matches!(self, GateDecision::NotPermitted)
    }
}

#[derive(Clone)]
pub struct CommunicationGate {
    messages: Arc<dyn MessageStore>,
    relations: Arc<dyn RelationStore>,
    store_timeout: Duration,
}

impl CommunicationGate {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        relations: Arc<dyn RelationStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            messages,
            relations,
            store_timeout,
        }
    }

    /// Pure decision; nothing is written. The caller establishes the relation
    /// after the message is durably stored.
    pub async fn check_or_establish(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<GateDecision> {
        let key = ConversationKey::new(sender_id, receiver_id)?;

        let relation = bounded(self.store_timeout, self.relations.find(&key)).await?;
        if relation.map(|r| r.can_communicate).unwrap_or(false) {
            return Ok(GateDecision::Permitted);
        }

        // Only messages in this direction consume the first-contact allowance
        let prior = bounded(
            self.store_timeout,
            self.messages.count_from_to(sender_id, receiver_id),
        )
        .await?;

        if prior == 0 {
            tracing::debug!(conversation = %key, sender = %sender_id, "first contact permitted");
            Ok(GateDecision::FirstContact)
        } else {
            tracing::debug!(conversation = %key, sender = %sender_id, prior, "no relation after first contact");
            Ok(GateDecision::NotPermitted)
        }
    }

    /// Idempotent: an existing relation for the pair is left untouched,
    /// including a disabled one.
    pub async fn establish(&self, user_a: Uuid, user_b: Uuid) -> AppResult<CommunicationRelation> {
        let key = ConversationKey::new(user_a, user_b)?;

        if let Some(existing) = bounded(self.store_timeout, self.relations.find(&key)).await? {
            return Ok(existing);
        }

        let relation = CommunicationRelation::established(key);
        bounded(self.store_timeout, self.relations.upsert(&relation)).await?;
        tracing::info!(conversation = %key, "communication relation established");

        // Re-read so a concurrent establish that won the insert is reflected
        Ok(bounded(self.store_timeout, self.relations.find(&key))
            .await?
            .unwrap_or(relation))
    }

    pub async fn relation(&self, user_a: Uuid, user_b: Uuid) -> AppResult<Option<CommunicationRelation>> {
        let key = ConversationKey::new(user_a, user_b)?;
        bounded(self.store_timeout, self.relations.find(&key)).await
    }
}
