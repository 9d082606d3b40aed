use crate::domain::conversation::ConversationId;
use crate::domain::message::{Message, MessageBody, MessageId};
use crate::error::Result;
use async_trait::async_trait;

/// REST surface the engine drives. The embedding app implements this against
/// its HTTP client; tests substitute a scripted fake.
///
/// Send returns the authoritative message (server id, normalized fields).
/// Structured rejections surface as `ChatError::Rejection`; connectivity
/// failures as `ChatError::Transport`.
#[async_trait]
pub trait ChatTransport: Send + Sync + std::fmt::Debug {
    async fn send_message(&self, conversation: ConversationId, body: MessageBody) -> Result<Message>;

    async fn edit_message(&self, conversation: ConversationId, id: &MessageId, new_text: &str) -> Result<Message>;

    async fn delete_message(&self, conversation: ConversationId, id: &MessageId) -> Result<()>;

    /// Best-effort read receipt. Callers swallow failures.
    async fn mark_seen(&self, conversation: ConversationId) -> Result<()>;

    async fn fetch_history(&self, conversation: ConversationId, limit: usize) -> Result<Vec<Message>>;
}

/// Outgoing presence signals. Best-effort; the debouncer logs failures and
/// never surfaces them.
#[async_trait]
pub trait PresenceTransport: Send + Sync + std::fmt::Debug {
    async fn typing_started(&self, conversation: ConversationId) -> Result<()>;

    async fn typing_stopped(&self, conversation: ConversationId) -> Result<()>;
}
