use crate::domain::event::EventOrigin;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of the conversation a view has open. Direct chats are identified by
/// the counterpart user, advert group chats by the advert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ConversationId {
    Direct(Uuid),
    Advert(Uuid),
}

impl ConversationId {
    /// Whether an event originating elsewhere belongs to this conversation.
    /// The same live channel carries events for every conversation the user
    /// participates in, so this check gates every remote mutation.
    #[must_use]
    pub fn accepts(&self, origin: &EventOrigin) -> bool {
        match (self, origin.advert_id) {
            (Self::Advert(advert), Some(origin_advert)) => *advert == origin_advert,
            (Self::Direct(peer), None) => *peer == origin.sender_id,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(peer) => write!(f, "direct:{peer}"),
            Self::Advert(advert) => write!(f, "advert:{advert}"),
        }
    }
}
