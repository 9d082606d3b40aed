use crate::config::ChannelConfig;
use crate::domain::event::{EventTopic, PushEvent};
use dashmap::DashMap;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
struct Metrics {
    published_total: Counter<u64>,
    unrouted_total: Counter<u64>,
    dropped_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("pitchside-chat");
        Self {
            published_total: meter
                .u64_counter("chat_push_published_total")
                .with_description("Total push events published by topic")
                .build(),
            unrouted_total: meter
                .u64_counter("chat_push_unrouted_total")
                .with_description("Push events published with no local subscriber")
                .build(),
            dropped_total: meter
                .u64_counter("chat_push_dropped_total")
                .with_description("Push events dropped due to a full subscriber buffer")
                .build(),
        }
    }
}

/// Fan-out point between the app's single live server connection and the
/// conversation views. The connection layer decodes frames into
/// [`PushEvent`]s and publishes them here; views subscribe per topic.
///
/// Passed into routers explicitly so subscription lifecycles stay visible
/// and testable; nothing here is a process global.
#[derive(Debug)]
pub struct PushHub {
    topics: DashMap<EventTopic, DashMap<u64, mpsc::Sender<PushEvent>>>,
    next_id: AtomicU64,
    buffer_size: usize,
    metrics: Metrics,
}

impl PushHub {
    #[must_use]
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            topics: DashMap::new(),
            next_id: AtomicU64::new(0),
            buffer_size: config.event_buffer_size,
            metrics: Metrics::new(),
        }
    }

    /// Takes out a subscription for one named event category. Dropping the
    /// returned handle unsubscribes; the hub never holds a dead sender past
    /// the next publish to that topic.
    #[must_use]
    pub fn subscribe(hub: &std::sync::Arc<Self>, topic: EventTopic) -> EventSubscription {
        let (tx, rx) = mpsc::channel(hub.buffer_size);
        let id = hub.next_id.fetch_add(1, Ordering::Relaxed);
        hub.topics.entry(topic).or_default().insert(id, tx);
        tracing::trace!(?topic, id, "Push subscription created");
        EventSubscription { topic, id, rx, hub: std::sync::Arc::downgrade(hub) }
    }

    /// Delivers an event to every current subscriber of its topic. A full
    /// subscriber buffer drops the event for that subscriber rather than
    /// blocking the connection read loop.
    pub fn publish(&self, event: &PushEvent) {
        let topic = event.topic();
        let topic_label = KeyValue::new("topic", format!("{topic:?}"));
        self.metrics.published_total.add(1, &[topic_label.clone()]);

        let Some(subscribers) = self.topics.get(&topic) else {
            tracing::debug!(?topic, "Push event with no local subscriber");
            self.metrics.unrouted_total.add(1, &[topic_label]);
            return;
        };

        let mut delivered = 0_usize;
        for entry in subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(?topic, subscriber = entry.key(), "Dropped push event due to full buffer");
                    self.metrics.dropped_total.add(1, &[topic_label.clone()]);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        if delivered == 0 {
            self.metrics.unrouted_total.add(1, &[topic_label]);
        }
    }

    /// Decodes one JSON frame off the live connection and fans it out.
    ///
    /// # Errors
    /// Returns `ChatError::Protocol` when the frame does not parse as a known
    /// event; nothing is published in that case.
    pub fn publish_frame(&self, frame: &str) -> crate::error::Result<()> {
        let event: PushEvent = serde_json::from_str(frame)
            .map_err(|e| crate::error::ChatError::Protocol(format!("undecodable push frame: {e}")))?;
        self.publish(&event);
        Ok(())
    }

    /// Number of live subscriptions on a topic. Used by teardown tests.
    #[must_use]
    pub fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.topics.get(&topic).map_or(0, |subs| subs.len())
    }
}

/// Handle to one per-topic subscription. Owned by exactly one router; `Drop`
/// unsubscribes, which makes teardown deterministic.
#[derive(Debug)]
pub struct EventSubscription {
    topic: EventTopic,
    id: u64,
    rx: mpsc::Receiver<PushEvent>,
    hub: Weak<PushHub>,
}

impl EventSubscription {
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.rx.recv().await
    }

    #[must_use]
    pub const fn topic(&self) -> EventTopic {
        self.topic
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            if let Some(subscribers) = hub.topics.get(&self.topic) {
                subscribers.remove(&self.id);
            }
            tracing::trace!(topic = ?self.topic, id = self.id, "Push subscription dropped");
        }
    }
}
