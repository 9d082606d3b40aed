use crate::domain::message::{Message, MessageBody, MessageId};
use opentelemetry::{global, metrics::Counter};
use std::sync::Mutex;
use time::{Date, OffsetDateTime};

#[derive(Clone, Debug)]
struct Metrics {
    optimistic_inserted_total: Counter<u64>,
    replaced_total: Counter<u64>,
    rolled_back_total: Counter<u64>,
    remote_applied_total: Counter<u64>,
    duplicate_remote_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("pitchside-chat");
        Self {
            optimistic_inserted_total: meter
                .u64_counter("chat_store_optimistic_inserted_total")
                .with_description("Total optimistic messages inserted")
                .build(),
            replaced_total: meter
                .u64_counter("chat_store_replaced_total")
                .with_description("Total optimistic messages replaced by their confirmed counterpart")
                .build(),
            rolled_back_total: meter
                .u64_counter("chat_store_rolled_back_total")
                .with_description("Total optimistic messages rolled back after a failed send")
                .build(),
            remote_applied_total: meter
                .u64_counter("chat_store_remote_applied_total")
                .with_description("Total remote events applied to the message list")
                .build(),
            duplicate_remote_total: meter
                .u64_counter("chat_store_duplicate_remote_total")
                .with_description("Remote inserts ignored because the id was already present")
                .build(),
        }
    }
}

/// Ordered, id-unique message list for the one conversation a view has open.
///
/// This is the single source of truth for rendering. Three independent input
/// channels converge here (local sends, their confirmations, remote push
/// events); each mutation runs under the internal lock, so interleavings
/// between suspension points cannot tear the list.
#[derive(Debug)]
pub struct ConversationStore {
    messages: Mutex<Vec<Message>>,
    metrics: Metrics,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self { messages: Mutex::new(Vec::new()), metrics: Metrics::new() }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.messages.lock().expect("message list mutex poisoned")
    }

    /// Appends a not-yet-confirmed message so it renders before the network
    /// round trip resolves. Ids come from `MessageId::fresh_local`, so a
    /// duplicate here is a caller bug; it is dropped to keep ids unique.
    pub fn insert_optimistic(&self, message: Message) {
        let mut messages = self.lock();
        if messages.iter().any(|m| m.id == message.id) {
            tracing::warn!(id = %message.id, "Duplicate optimistic insert dropped");
            return;
        }
        tracing::debug!(id = %message.id, "Optimistic message inserted");
        messages.push(message);
        self.metrics.optimistic_inserted_total.add(1, &[]);
    }

    /// Swaps a temporary message for its server-confirmed counterpart at the
    /// same position, so the list never shows a duplicate or a reorder flash.
    pub fn replace_optimistic(&self, temp_id: &MessageId, confirmed: Message) {
        let mut messages = self.lock();
        let confirmed_already_present = messages.iter().any(|m| m.id == confirmed.id);

        if let Some(index) = messages.iter().position(|m| &m.id == temp_id) {
            if confirmed_already_present {
                // The confirmed copy arrived through another path first; keep
                // the single existing copy and drop the temporary one.
                tracing::debug!(temp_id = %temp_id, id = %confirmed.id, "Confirmed message already present, dropping temporary");
                messages.remove(index);
            } else {
                tracing::debug!(temp_id = %temp_id, id = %confirmed.id, "Optimistic message confirmed");
                messages[index] = confirmed;
            }
            self.metrics.replaced_total.add(1, &[]);
        } else if !confirmed_already_present {
            // The temporary entry is gone but the confirmation is
            // authoritative, so it must not be lost.
            tracing::warn!(temp_id = %temp_id, id = %confirmed.id, "Replace target missing, appending confirmed message");
            messages.push(confirmed);
            self.metrics.replaced_total.add(1, &[]);
        }
    }

    /// Removes a temporary message after a failed send. No trace remains.
    pub fn rollback_optimistic(&self, temp_id: &MessageId) {
        let mut messages = self.lock();
        let before = messages.len();
        messages.retain(|m| &m.id != temp_id);
        if messages.len() < before {
            tracing::debug!(temp_id = %temp_id, "Optimistic message rolled back");
            self.metrics.rolled_back_total.add(1, &[]);
        }
    }

    /// Appends a message that originated with another participant. A
    /// redundant delivery of an id already present is silently ignored.
    pub fn apply_remote_insert(&self, message: Message) {
        let mut messages = self.lock();
        if messages.iter().any(|m| m.id == message.id) {
            tracing::debug!(id = %message.id, "Duplicate remote insert ignored");
            self.metrics.duplicate_remote_total.add(1, &[]);
            return;
        }
        tracing::debug!(id = %message.id, "Remote message inserted");
        messages.push(message);
        self.metrics.remote_applied_total.add(1, &[]);
    }

    /// Rewrites a message body in place. An absent id is a benign race (the
    /// edit may outrun its insert), not a fault.
    pub fn apply_remote_edit(&self, id: &MessageId, body: MessageBody, updated_at: OffsetDateTime) {
        let mut messages = self.lock();
        match messages.iter_mut().find(|m| &m.id == id) {
            Some(message) => {
                message.body = body;
                message.updated_at = updated_at;
                tracing::debug!(id = %id, "Remote edit applied");
                self.metrics.remote_applied_total.add(1, &[]);
            }
            None => tracing::trace!(id = %id, "Remote edit for unknown id ignored"),
        }
    }

    /// Removes a message by id. An absent id is a benign race, not a fault.
    pub fn apply_remote_delete(&self, id: &MessageId) {
        let mut messages = self.lock();
        let before = messages.len();
        messages.retain(|m| &m.id != id);
        if messages.len() < before {
            tracing::debug!(id = %id, "Remote delete applied");
            self.metrics.remote_applied_total.add(1, &[]);
        } else {
            tracing::trace!(id = %id, "Remote delete for unknown id ignored");
        }
    }

    /// Ordered copy of the current list for rendering.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.lock().iter().any(|m| &m.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Calendar-day grouping for rendering day separators. Derived on demand
    /// from the snapshot; nothing is stored.
    #[must_use]
    pub fn grouped_by_day(&self) -> Vec<DayGroup> {
        let mut groups: Vec<DayGroup> = Vec::new();
        for message in self.lock().iter() {
            let date = message.created_at.date();
            match groups.last_mut() {
                Some(group) if group.date == date => group.messages.push(message.clone()),
                _ => groups.push(DayGroup { date, messages: vec![message.clone()] }),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub date: Date,
    pub messages: Vec<Message>,
}
