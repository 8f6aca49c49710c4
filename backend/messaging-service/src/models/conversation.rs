use crate::error::AppError;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Unordered pair of users exchanging messages.
///
/// Always stored as `(low, high)` so that `(a, b)` and `(b, a)` resolve to the
/// same key. Every lookup into messages, relations and sweeps goes through
/// this type; never build one by hand from a sender/receiver tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConversationKey {
    low: Uuid,
    high: Uuid,
}

impl ConversationKey {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, AppError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(AppError::InvalidPair),
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}
