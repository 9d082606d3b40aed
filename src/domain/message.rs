use crate::domain::participant::Participant;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Write-path clock noise between the two timestamps that still counts as
/// "never edited". Comparison is strictly greater-than.
const EDIT_TOLERANCE: Duration = Duration::seconds(1);

/// A message id is in exactly one identity class at any time. `Local` ids are
/// generated client-side and live only until the server confirms the send;
/// once replaced they are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    Local(Uuid),
    Persisted(String),
}

impl MessageId {
    #[must_use]
    pub fn fresh_local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(id) => write!(f, "local:{id}"),
            Self::Persisted(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentSource {
    /// Server-hosted file of a persisted message.
    Remote { url: String },
    /// Self-describing data string of a not-yet-confirmed upload, usable for
    /// transmission and for preview without a network round trip.
    Inline { data_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: AttachmentSource,
}

/// Message payload. The two shapes are mutually exclusive by construction:
/// a message carries text or attachments, never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum MessageBody {
    Text { content: String },
    Attachments { caption: Option<String>, items: Vec<AttachmentRef> },
}

impl MessageBody {
    /// Text shown in conversation previews and notifications.
    #[must_use]
    pub fn preview_text(&self) -> &str {
        match self {
            Self::Text { content } => content,
            Self::Attachments { caption, .. } => caption.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Participant,
    /// Present in direct chats, absent in advert group chats.
    pub recipient: Option<Participant>,
    pub body: MessageBody,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.id.is_local()
    }

    /// A message counts as edited only when the update stamp trails creation
    /// by more than the tolerance. Exact equality is never "edited".
    #[must_use]
    pub fn is_edited(&self) -> bool {
        self.updated_at - self.created_at > EDIT_TOLERANCE
    }

    /// Gates the edit/delete affordances shown by the view layer.
    #[must_use]
    pub fn authored_by(&self, user_id: Uuid) -> bool {
        self.sender.id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_stamps(created: OffsetDateTime, updated: OffsetDateTime) -> Message {
        Message {
            id: MessageId::Persisted("m-1".into()),
            sender: Participant::new(Uuid::new_v4(), "Ayşe"),
            recipient: None,
            body: MessageBody::Text { content: "Selam".into() },
            created_at: created,
            updated_at: updated,
        }
    }

    #[test]
    fn equal_stamps_are_not_edited() {
        let now = OffsetDateTime::now_utc();
        assert!(!message_with_stamps(now, now).is_edited());
    }

    #[test]
    fn sub_second_drift_is_not_edited() {
        let now = OffsetDateTime::now_utc();
        assert!(!message_with_stamps(now, now + Duration::milliseconds(900)).is_edited());
        assert!(!message_with_stamps(now, now + Duration::seconds(1)).is_edited());
    }

    #[test]
    fn later_update_is_edited() {
        let now = OffsetDateTime::now_utc();
        assert!(message_with_stamps(now, now + Duration::seconds(2)).is_edited());
    }

    #[test]
    fn local_ids_are_temporary() {
        let id = MessageId::fresh_local();
        assert!(id.is_local());
        assert!(!MessageId::Persisted("m-2".into()).is_local());
    }
}
