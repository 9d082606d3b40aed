use crate::domain::conversation::ConversationId;
use crate::domain::message::{Message, MessageBody, MessageId};
use crate::domain::participant::Participant;
use crate::error::{ChatError, Result, ValidationError};
use crate::services::attachment_pipeline::AttachmentCandidate;
use crate::services::staging::AttachmentStaging;
use crate::services::transport::ChatTransport;
use crate::services::typing::TypingDebouncer;
use crate::store::ConversationStore;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    edits_total: Counter<u64>,
    deletes_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("pitchside-chat");
        Self {
            sent_total: meter
                .u64_counter("chat_messages_sent_total")
                .with_description("Total send attempts by outcome")
                .build(),
            edits_total: meter
                .u64_counter("chat_messages_edited_total")
                .with_description("Total edit attempts by outcome")
                .build(),
            deletes_total: meter
                .u64_counter("chat_messages_deleted_total")
                .with_description("Total delete attempts by outcome")
                .build(),
        }
    }
}

/// Runs every mutation of the open conversation that involves the network:
/// optimistic sends, confirm-then-apply edits and deletes, best-effort read
/// receipts.
///
/// At most one send per conversation is in flight at a time; a concurrent
/// attempt is rejected, not queued.
#[derive(Debug)]
pub struct MessageService {
    conversation: ConversationId,
    me: Participant,
    counterpart: Option<Participant>,
    store: Arc<ConversationStore>,
    transport: Arc<dyn ChatTransport>,
    typing: Arc<TypingDebouncer>,
    staging: Arc<AttachmentStaging>,
    sending: AtomicBool,
    metrics: Metrics,
}

/// Clears the busy flag and the staged attachments on every exit path of a
/// send, so no branch can forget either.
struct SendCleanup<'a> {
    sending: &'a AtomicBool,
    staging: &'a AttachmentStaging,
}

impl Drop for SendCleanup<'_> {
    fn drop(&mut self) {
        self.staging.clear();
        self.sending.store(false, Ordering::Release);
    }
}

impl MessageService {
    #[must_use]
    pub fn new(
        conversation: ConversationId,
        me: Participant,
        counterpart: Option<Participant>,
        store: Arc<ConversationStore>,
        transport: Arc<dyn ChatTransport>,
        typing: Arc<TypingDebouncer>,
        staging: Arc<AttachmentStaging>,
    ) -> Self {
        Self {
            conversation,
            me,
            counterpart,
            store,
            transport,
            typing,
            staging,
            sending: AtomicBool::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Whether a send is currently in flight. Exposed so the composer can
    /// disable its send affordance.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Drives one send end-to-end: classify, insert optimistically, call the
    /// network, reconcile.
    ///
    /// # Errors
    /// `ChatError::Validation` when there is nothing to send,
    /// `ChatError::SendInFlight` when another send is outstanding, and the
    /// transport's failure otherwise — in which case the optimistic entry has
    /// already been rolled back. Never retries.
    #[tracing::instrument(err(level = "warn"), skip(self, text), fields(conversation = %self.conversation))]
    pub async fn send(&self, text: &str) -> Result<Message> {
        let candidates = self.staging.snapshot();
        let body = Self::classify(text, &candidates)?;

        if self.sending.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(ChatError::SendInFlight);
        }
        let _cleanup = SendCleanup { sending: &self.sending, staging: &self.staging };

        let temp_id = MessageId::fresh_local();
        let now = OffsetDateTime::now_utc();
        self.store.insert_optimistic(Message {
            id: temp_id.clone(),
            sender: self.me.clone(),
            recipient: self.counterpart.clone(),
            body: body.clone(),
            created_at: now,
            updated_at: now,
        });

        // The user committed to sending; presence must not linger on Typing
        // until the confirmation lands.
        self.typing.message_sent();

        match self.transport.send_message(self.conversation, body).await {
            Ok(confirmed) => {
                self.store.replace_optimistic(&temp_id, confirmed.clone());
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                Ok(confirmed)
            }
            Err(e) => {
                self.store.rollback_optimistic(&temp_id);
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Rewrites a message after the server confirms. Unlike send there is no
    /// optimistic step: a stale edit box is an acceptable wait, a vanished
    /// message is not.
    ///
    /// # Errors
    /// Propagates the transport failure; the store is untouched on failure.
    #[tracing::instrument(err(level = "warn"), skip(self, new_text), fields(message_id = %id))]
    pub async fn edit(&self, id: &MessageId, new_text: &str) -> Result<Message> {
        match self.transport.edit_message(self.conversation, id, new_text.trim()).await {
            Ok(updated) => {
                self.store.apply_remote_edit(id, updated.body.clone(), updated.updated_at);
                self.metrics.edits_total.add(1, &[KeyValue::new("status", "success")]);
                Ok(updated)
            }
            Err(e) => {
                self.metrics.edits_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Removes a message after the server confirms. No optimistic removal.
    ///
    /// # Errors
    /// Propagates the transport failure; the store is untouched on failure.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(message_id = %id))]
    pub async fn delete(&self, id: &MessageId) -> Result<()> {
        match self.transport.delete_message(self.conversation, id).await {
            Ok(()) => {
                self.store.apply_remote_delete(id);
                self.metrics.deletes_total.add(1, &[KeyValue::new("status", "success")]);
                Ok(())
            }
            Err(e) => {
                self.metrics.deletes_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Fire-and-forget read receipt. Failures are logged and swallowed.
    #[tracing::instrument(skip(self), fields(conversation = %self.conversation))]
    pub async fn mark_seen(&self) {
        if let Err(e) = self.transport.mark_seen(self.conversation).await {
            tracing::debug!(error = %e, "Failed to mark conversation as seen");
        }
    }

    /// Maps a send intent onto exactly one of the three payload shapes:
    /// text-only, attachments-only, attachments-with-caption.
    fn classify(text: &str, candidates: &[AttachmentCandidate]) -> Result<MessageBody> {
        let trimmed = text.trim();
        match (trimmed.is_empty(), candidates.is_empty()) {
            (true, true) => Err(ChatError::Validation(ValidationError::EmptyMessage)),
            (false, true) => Ok(MessageBody::Text { content: trimmed.to_owned() }),
            (empty_text, false) => Ok(MessageBody::Attachments {
                caption: (!empty_text).then(|| trimmed.to_owned()),
                items: candidates.iter().map(AttachmentCandidate::to_attachment_ref).collect(),
            }),
        }
    }
}
