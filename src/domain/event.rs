use crate::domain::message::{Message, MessageBody, MessageId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Where a push event came from. Direct-chat events carry only the acting
/// user; advert group events additionally name the advert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOrigin {
    pub sender_id: Uuid,
    pub advert_id: Option<Uuid>,
}

/// Named event categories carried by the live channel. Subscriptions are
/// taken out per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTopic {
    MessageCreated,
    MessageUpdated,
    MessageDeleted,
    TypingStarted,
    TypingStopped,
}

impl EventTopic {
    pub const ALL: [Self; 5] =
        [Self::MessageCreated, Self::MessageUpdated, Self::MessageDeleted, Self::TypingStarted, Self::TypingStopped];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    MessageCreated {
        origin: EventOrigin,
        message: Message,
    },
    MessageUpdated {
        origin: EventOrigin,
        id: MessageId,
        body: MessageBody,
        #[serde(with = "time::serde::rfc3339")]
        updated_at: OffsetDateTime,
    },
    MessageDeleted {
        origin: EventOrigin,
        id: MessageId,
    },
    TypingStarted {
        origin: EventOrigin,
    },
    TypingStopped {
        origin: EventOrigin,
    },
}

impl PushEvent {
    #[must_use]
    pub const fn topic(&self) -> EventTopic {
        match self {
            Self::MessageCreated { .. } => EventTopic::MessageCreated,
            Self::MessageUpdated { .. } => EventTopic::MessageUpdated,
            Self::MessageDeleted { .. } => EventTopic::MessageDeleted,
            Self::TypingStarted { .. } => EventTopic::TypingStarted,
            Self::TypingStopped { .. } => EventTopic::TypingStopped,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> &EventOrigin {
        match self {
            Self::MessageCreated { origin, .. }
            | Self::MessageUpdated { origin, .. }
            | Self::MessageDeleted { origin, .. }
            | Self::TypingStarted { origin }
            | Self::TypingStopped { origin } => origin,
        }
    }
}
