use crate::config::Config;
use crate::domain::conversation::ConversationId;
use crate::domain::message::Message;
use crate::domain::participant::Participant;
use crate::error::Result;
use crate::services::attachment_pipeline::{AttachmentPipeline, BatchOutcome, SelectedFile};
use crate::services::event_router::EventRouter;
use crate::services::message_service::MessageService;
use crate::services::push::PushHub;
use crate::services::staging::AttachmentStaging;
use crate::services::transport::{ChatTransport, PresenceTransport};
use crate::services::typing::TypingDebouncer;
use crate::store::ConversationStore;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Everything a conversation view needs injected. The live channel and the
/// transports are app-wide; the rest is created per session.
#[derive(Debug)]
pub struct SessionParams {
    pub conversation: ConversationId,
    pub me: Participant,
    /// Counterpart identity snapshot for direct chats; `None` for advert
    /// group chats.
    pub counterpart: Option<Participant>,
    pub transport: Arc<dyn ChatTransport>,
    pub presence: Arc<dyn PresenceTransport>,
    pub hub: Arc<PushHub>,
    pub config: Config,
}

/// One open conversation: store, send path, remote routing and presence wired
/// together with a single open/close lifecycle.
#[derive(Debug)]
pub struct ConversationSession {
    store: Arc<ConversationStore>,
    staging: Arc<AttachmentStaging>,
    pipeline: AttachmentPipeline,
    typing: Arc<TypingDebouncer>,
    messages: MessageService,
    router: EventRouter,
}

impl ConversationSession {
    /// Opens the conversation: fetches initial history, starts routing push
    /// events, and fires a best-effort read receipt.
    ///
    /// # Errors
    /// Returns the transport failure when the history fetch fails; nothing is
    /// subscribed in that case.
    #[tracing::instrument(err(level = "warn"), skip(params), fields(conversation = %params.conversation))]
    pub async fn open(params: SessionParams) -> Result<Self> {
        let store = Arc::new(ConversationStore::new());

        // Seeded through the idempotent remote path, so a push that races the
        // fetch cannot double-insert.
        let history =
            params.transport.fetch_history(params.conversation, params.config.messaging.history_page_size).await?;
        tracing::debug!(count = history.len(), "Conversation history loaded");
        for message in history {
            store.apply_remote_insert(message);
        }

        let staging = Arc::new(AttachmentStaging::new());
        let pipeline = AttachmentPipeline::new(params.config.attachments.clone());
        let typing = Arc::new(TypingDebouncer::new(
            params.conversation,
            Arc::clone(&params.presence),
            params.config.typing.idle_timeout_ms,
        ));
        let messages = MessageService::new(
            params.conversation,
            params.me,
            params.counterpart,
            Arc::clone(&store),
            Arc::clone(&params.transport),
            Arc::clone(&typing),
            Arc::clone(&staging),
        );
        let router = EventRouter::new(params.conversation, Arc::clone(&store), Arc::clone(&params.hub));
        router.start();

        let session = Self { store, staging, pipeline, typing, messages, router };
        session.messages.mark_seen().await;
        Ok(session)
    }

    /// Closes the view: outgoing presence stops first, then routing tears
    /// down so no further event reaches the store.
    pub async fn close(&self) {
        self.typing.shutdown();
        self.router.stop().await;
    }

    /// Ordered message list for rendering.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    #[must_use]
    pub fn staging(&self) -> &Arc<AttachmentStaging> {
        &self.staging
    }

    #[must_use]
    pub const fn messages(&self) -> &MessageService {
        &self.messages
    }

    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.messages.is_sending()
    }

    #[must_use]
    pub fn typing_indicator(&self) -> watch::Receiver<Option<Uuid>> {
        self.router.typing_indicator()
    }

    /// Forwarded to the debouncer on every composer change.
    pub fn input_changed(&self, text: &str) {
        self.typing.input_changed(text);
    }

    /// Validates and stages newly selected files against the current staging
    /// count, appending what survives.
    ///
    /// # Errors
    /// Returns `ChatError::Validation` when the batch violates the count
    /// rule; staging is unchanged in that case.
    pub async fn stage_files(&self, files: Vec<SelectedFile>) -> Result<BatchOutcome> {
        let outcome = self.pipeline.process(self.staging.count(), files).await?;
        self.staging.append(outcome.accepted.clone());
        Ok(outcome)
    }

    /// Sends the composer state. See [`MessageService::send`].
    ///
    /// # Errors
    /// Propagates the send failure after the optimistic rollback.
    pub async fn send(&self, text: &str) -> Result<Message> {
        self.messages.send(text).await
    }
}
