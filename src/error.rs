use thiserror::Error;

/// Local validation failures raised by the attachment pipeline and the send
/// classifier. These never involve the network and are always recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cannot attach more than {limit} files ({staged} staged, {incoming} selected)")]
    TooManyAttachments { staged: usize, incoming: usize, limit: usize },
    #[error("File type {mime_type} is not supported: {name}")]
    UnsupportedMediaType { name: String, mime_type: String },
    #[error("File exceeds the {limit_bytes} byte limit: {name}")]
    FileTooLarge { name: String, size: u64, limit_bytes: u64 },
    #[error("Message has no text and no attachments")]
    EmptyMessage,
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("A send is already in flight for this conversation")]
    SendInFlight,
    #[error("Network transport failed: {0}")]
    Transport(String),
    #[error("Server rejected the request ({status}): {code}")]
    Rejection { status: u16, code: String },
    #[error("Malformed server response: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Failure class used by the view layer when naming the error to the user.
    #[must_use]
    pub const fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::SendInFlight => "busy",
            Self::Transport(_) => "transport",
            Self::Rejection { .. } => "rejection",
            Self::Protocol(_) => "protocol",
        }
    }
}
