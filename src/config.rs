use clap::{Args, Parser};

#[derive(Clone, Debug, Default, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub attachments: AttachmentConfig,

    #[command(flatten)]
    pub typing: TypingConfig,

    #[command(flatten)]
    pub channel: ChannelConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,
}

#[derive(Clone, Debug, Args)]
pub struct AttachmentConfig {
    /// Maximum number of files that may be staged on a single message
    #[arg(long, env = "PITCHSIDE_MAX_STAGED_FILES", default_value_t = 3)]
    pub max_staged_files: usize,

    /// Maximum size of a single attachment in bytes (Default: 100 MiB)
    #[arg(long, env = "PITCHSIDE_MAX_FILE_SIZE_BYTES", default_value_t = 104_857_600)]
    pub max_file_size_bytes: u64,
}

#[derive(Clone, Debug, Args)]
pub struct TypingConfig {
    /// Inactivity interval after which a typing burst is considered over
    #[arg(long, env = "PITCHSIDE_TYPING_IDLE_TIMEOUT_MS", default_value_t = 3000)]
    pub idle_timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ChannelConfig {
    /// Buffer size of each per-topic push event subscription
    #[arg(long, env = "PITCHSIDE_EVENT_BUFFER_SIZE", default_value_t = 64)]
    pub event_buffer_size: usize,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Number of messages fetched when a conversation is opened
    #[arg(long, env = "PITCHSIDE_HISTORY_PAGE_SIZE", default_value_t = 50)]
    pub history_page_size: usize,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self { max_staged_files: 3, max_file_size_bytes: 104_857_600 }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { idle_timeout_ms: 3000 }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { event_buffer_size: 64 }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self { history_page_size: 50 }
    }
}

