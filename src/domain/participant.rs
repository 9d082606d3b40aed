use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity snapshot attached to a message at creation time. Display fields
/// are copied, not joined, so later profile changes do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Participant {
    #[must_use]
    pub fn new(id: Uuid, display_name: impl Into<String>) -> Self {
        Self { id, display_name: display_name.into(), avatar_url: None }
    }
}
