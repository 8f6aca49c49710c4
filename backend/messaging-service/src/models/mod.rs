pub mod conversation;
pub mod message;
pub mod relation;

// Re-export for convenience
pub use conversation::ConversationKey;
pub use message::{MediaUpload, Message, MessageType, NewMessage, SendMessageRequest};
pub use relation::CommunicationRelation;
