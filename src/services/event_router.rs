use crate::domain::conversation::ConversationId;
use crate::domain::event::{EventTopic, PushEvent};
use crate::services::push::{EventSubscription, PushHub};
use crate::store::ConversationStore;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    routed_total: Counter<u64>,
    discarded_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("pitchside-chat");
        Self {
            routed_total: meter
                .u64_counter("chat_events_routed_total")
                .with_description("Push events applied to the open conversation")
                .build(),
            discarded_total: meter
                .u64_counter("chat_events_discarded_total")
                .with_description("Push events discarded because they belong to another conversation")
                .build(),
        }
    }
}

/// Applies push events from the live channel to the open conversation.
///
/// The same connection carries events for every conversation the user is in,
/// so each event is filtered by conversation identity before any mutation.
/// Matching message events forward verbatim to the store primitives; matching
/// presence events drive the typing indicator watched by the view.
#[derive(Debug)]
pub struct EventRouter {
    conversation: ConversationId,
    store: Arc<ConversationStore>,
    hub: Arc<PushHub>,
    typing_tx: watch::Sender<Option<Uuid>>,
    typing_rx: watch::Receiver<Option<Uuid>>,
    task: Mutex<Option<JoinHandle<()>>>,
    metrics: Metrics,
}

impl EventRouter {
    #[must_use]
    pub fn new(conversation: ConversationId, store: Arc<ConversationStore>, hub: Arc<PushHub>) -> Self {
        let (typing_tx, typing_rx) = watch::channel(None);
        Self { conversation, store, hub, typing_tx, typing_rx, task: Mutex::new(None), metrics: Metrics::new() }
    }

    /// Which participant is currently typing in this conversation, if any.
    #[must_use]
    pub fn typing_indicator(&self) -> watch::Receiver<Option<Uuid>> {
        self.typing_rx.clone()
    }

    /// Subscribes to all five event categories and starts routing. The
    /// subscriptions live inside the routing task, so stopping the task
    /// releases every handle this router created.
    pub fn start(&self) {
        let mut task = self.task.lock().expect("router task mutex poisoned");
        if task.is_some() {
            tracing::warn!(conversation = %self.conversation, "Event router already started");
            return;
        }

        let subscriptions: Vec<EventSubscription> =
            EventTopic::ALL.iter().map(|topic| PushHub::subscribe(&self.hub, *topic)).collect();

        let conversation = self.conversation;
        let store = Arc::clone(&self.store);
        let typing_tx = self.typing_tx.clone();
        let metrics = self.metrics.clone();

        *task = Some(tokio::spawn(
            async move {
                Self::run(conversation, store, typing_tx, metrics, subscriptions).await;
            }
            .instrument(tracing::info_span!("event_router", conversation = %self.conversation)),
        ));
    }

    /// Tears the router down: the routing task is aborted and awaited, which
    /// drops its subscriptions, so no event can leak into a closed view.
    pub async fn stop(&self) {
        let task = self.task.lock().expect("router task mutex poisoned").take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        // A lingering indicator would otherwise outlive the view.
        self.typing_tx.send_replace(None);
        tracing::debug!(conversation = %self.conversation, "Event router stopped");
    }

    async fn run(
        conversation: ConversationId,
        store: Arc<ConversationStore>,
        typing_tx: watch::Sender<Option<Uuid>>,
        metrics: Metrics,
        subscriptions: Vec<EventSubscription>,
    ) {
        let mut subscriptions = subscriptions;
        let mut created = subscriptions.remove(0);
        let mut updated = subscriptions.remove(0);
        let mut deleted = subscriptions.remove(0);
        let mut typing_started = subscriptions.remove(0);
        let mut typing_stopped = subscriptions.remove(0);

        loop {
            let event = tokio::select! {
                e = created.recv() => e,
                e = updated.recv() => e,
                e = deleted.recv() => e,
                e = typing_started.recv() => e,
                e = typing_stopped.recv() => e,
            };

            match event {
                Some(event) => Self::route(conversation, &store, &typing_tx, &metrics, event),
                // The hub is gone; nothing further can arrive.
                None => break,
            }
        }
    }

    fn route(
        conversation: ConversationId,
        store: &ConversationStore,
        typing_tx: &watch::Sender<Option<Uuid>>,
        metrics: &Metrics,
        event: PushEvent,
    ) {
        if !conversation.accepts(event.origin()) {
            tracing::trace!(topic = ?event.topic(), "Event for another conversation discarded");
            metrics.discarded_total.add(1, &[]);
            return;
        }

        let topic_label = KeyValue::new("topic", format!("{:?}", event.topic()));
        metrics.routed_total.add(1, &[topic_label]);

        match event {
            PushEvent::MessageCreated { message, .. } => store.apply_remote_insert(message),
            PushEvent::MessageUpdated { id, body, updated_at, .. } => store.apply_remote_edit(&id, body, updated_at),
            PushEvent::MessageDeleted { id, .. } => store.apply_remote_delete(&id),
            PushEvent::TypingStarted { origin } => {
                typing_tx.send_replace(Some(origin.sender_id));
            }
            PushEvent::TypingStopped { origin } => {
                // Only clear the indicator the stopping participant owns.
                typing_tx.send_if_modified(|current| {
                    if *current == Some(origin.sender_id) {
                        *current = None;
                        true
                    } else {
                        false
                    }
                });
            }
        }
    }
}
