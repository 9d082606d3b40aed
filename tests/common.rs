use async_trait::async_trait;
use pitchside_chat::config::Config;
use pitchside_chat::domain::{ConversationId, EventOrigin, Message, MessageBody, MessageId, Participant, PushEvent};
use pitchside_chat::error::{ChatError, Result};
use pitchside_chat::services::transport::{ChatTransport, PresenceTransport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};
use time::OffsetDateTime;
use tokio::sync::oneshot;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("pitchside_chat=debug".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

#[allow(dead_code)]
pub fn participant(name: &str) -> Participant {
    Participant::new(Uuid::new_v4(), name)
}

#[allow(dead_code)]
pub fn text_message(id: MessageId, sender: Participant, content: &str) -> Message {
    let now = OffsetDateTime::now_utc();
    Message { id, sender, recipient: None, body: MessageBody::Text { content: content.into() }, created_at: now, updated_at: now }
}

#[allow(dead_code)]
pub fn direct_origin(sender_id: Uuid) -> EventOrigin {
    EventOrigin { sender_id, advert_id: None }
}

#[allow(dead_code)]
pub fn advert_origin(sender_id: Uuid, advert_id: Uuid) -> EventOrigin {
    EventOrigin { sender_id, advert_id: Some(advert_id) }
}

#[allow(dead_code)]
pub fn created_event(origin: EventOrigin, message: Message) -> PushEvent {
    PushEvent::MessageCreated { origin, message }
}

/// Transport fake with scripted outcomes. With nothing scripted, sends
/// confirm with a fabricated server id and the echoed body.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    send_outcomes: Mutex<VecDeque<Result<Message>>>,
    send_gate: Mutex<Option<oneshot::Receiver<()>>>,
    edit_outcomes: Mutex<VecDeque<Result<Message>>>,
    delete_outcomes: Mutex<VecDeque<Result<()>>>,
    history: Mutex<Vec<Message>>,
    pub fail_mark_seen: std::sync::atomic::AtomicBool,
    pub fail_history: std::sync::atomic::AtomicBool,
    next_server_id: AtomicU64,
    pub sent_bodies: Mutex<Vec<MessageBody>>,
    pub seen_calls: AtomicU64,
    pub deleted_ids: Mutex<Vec<MessageId>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_send(&self, outcome: Result<Message>) {
        self.send_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn script_edit(&self, outcome: Result<Message>) {
        self.edit_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn script_delete(&self, outcome: Result<()>) {
        self.delete_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn seed_history(&self, messages: Vec<Message>) {
        *self.history.lock().unwrap() = messages;
    }

    /// Holds the next send until the returned sender fires, so tests can
    /// observe the optimistic state mid-flight.
    pub fn gate_next_send(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.send_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn confirm(&self, body: MessageBody) -> Message {
        let id = self.next_server_id.fetch_add(1, Ordering::Relaxed);
        let now = OffsetDateTime::now_utc();
        Message {
            id: MessageId::Persisted(format!("srv-{id}")),
            sender: Participant::new(Uuid::new_v4(), "server-echo"),
            recipient: None,
            body,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send_message(&self, _conversation: ConversationId, body: MessageBody) -> Result<Message> {
        let gate = self.send_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.sent_bodies.lock().unwrap().push(body.clone());
        match self.send_outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.confirm(body)),
        }
    }

    async fn edit_message(&self, _conversation: ConversationId, id: &MessageId, new_text: &str) -> Result<Message> {
        match self.edit_outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => {
                let now = OffsetDateTime::now_utc();
                Ok(Message {
                    id: id.clone(),
                    sender: Participant::new(Uuid::new_v4(), "server-echo"),
                    recipient: None,
                    body: MessageBody::Text { content: new_text.into() },
                    created_at: now - time::Duration::minutes(5),
                    updated_at: now,
                })
            }
        }
    }

    async fn delete_message(&self, _conversation: ConversationId, id: &MessageId) -> Result<()> {
        let outcome = self.delete_outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.deleted_ids.lock().unwrap().push(id.clone());
        }
        outcome
    }

    async fn mark_seen(&self, _conversation: ConversationId) -> Result<()> {
        self.seen_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_mark_seen.load(Ordering::Relaxed) {
            return Err(ChatError::Transport("connection reset".into()));
        }
        Ok(())
    }

    async fn fetch_history(&self, _conversation: ConversationId, limit: usize) -> Result<Vec<Message>> {
        if self.fail_history.load(Ordering::Relaxed) {
            return Err(ChatError::Transport("connection refused".into()));
        }
        let history = self.history.lock().unwrap();
        Ok(history.iter().take(limit).cloned().collect())
    }
}

/// Presence fake recording start/stop signals in order.
#[derive(Debug, Default)]
pub struct RecordingPresence {
    pub signals: Mutex<Vec<&'static str>>,
}

#[allow(dead_code)]
impl RecordingPresence {
    pub fn signals(&self) -> Vec<&'static str> {
        self.signals.lock().unwrap().clone()
    }
}

#[async_trait]
impl PresenceTransport for RecordingPresence {
    async fn typing_started(&self, _conversation: ConversationId) -> Result<()> {
        self.signals.lock().unwrap().push("start");
        Ok(())
    }

    async fn typing_stopped(&self, _conversation: ConversationId) -> Result<()> {
        self.signals.lock().unwrap().push("stop");
        Ok(())
    }
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config::default()
}

/// Lets spawned tasks (router loops, signal emissions) run before asserting.
#[allow(dead_code)]
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
}
