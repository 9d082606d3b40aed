pub mod conversation;
pub mod event;
pub mod message;
pub mod participant;

pub use conversation::ConversationId;
pub use event::{EventOrigin, EventTopic, PushEvent};
pub use message::{AttachmentRef, AttachmentSource, Message, MessageBody, MessageId};
pub use participant::Participant;
