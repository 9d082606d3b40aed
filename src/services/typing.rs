use crate::domain::conversation::ConversationId;
use crate::services::transport::PresenceTransport;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Debug, Default)]
struct TypingState {
    is_typing: bool,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every timer cancellation. A timer task that outlives its
    /// abort (already past the sleep, not yet holding the lock) sees a stale
    /// epoch and backs off instead of emitting a late stop signal.
    epoch: u64,
}

/// Converts raw composer input changes into discrete start/stop presence
/// signals.
///
/// One start signal per burst of keystrokes; one stop signal when the burst
/// ends — by inactivity timeout, by the input going empty, by the message
/// being sent, or by teardown. Stop while already idle is a no-op.
#[derive(Debug)]
pub struct TypingDebouncer {
    conversation: ConversationId,
    transport: Arc<dyn PresenceTransport>,
    idle_timeout: Duration,
    state: Arc<Mutex<TypingState>>,
}

impl TypingDebouncer {
    #[must_use]
    pub fn new(conversation: ConversationId, transport: Arc<dyn PresenceTransport>, idle_timeout_ms: u64) -> Self {
        Self {
            conversation,
            transport,
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            state: Arc::new(Mutex::new(TypingState::default())),
        }
    }

    /// Called on every change of the composer text.
    pub fn input_changed(&self, text: &str) {
        if text.is_empty() {
            self.force_stop("input cleared");
            return;
        }

        let mut state = self.lock();
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        if !state.is_typing {
            state.is_typing = true;
            tracing::debug!(conversation = %self.conversation, "Typing started");
            self.emit(true);
        }

        state.timer = Some(self.spawn_idle_timer(state.epoch));
    }

    /// The user committed to sending; presence must not linger.
    pub fn message_sent(&self) {
        self.force_stop("message sent");
    }

    /// Called when the conversation view is torn down.
    pub fn shutdown(&self) {
        self.force_stop("view closed");
    }

    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.lock().is_typing
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TypingState> {
        self.state.lock().expect("typing state mutex poisoned")
    }

    fn force_stop(&self, reason: &'static str) {
        let mut state = self.lock();
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.is_typing {
            state.is_typing = false;
            drop(state);
            tracing::debug!(conversation = %self.conversation, reason, "Typing stopped");
            self.emit(false);
        }
    }

    fn spawn_idle_timer(&self, epoch: u64) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let transport = Arc::clone(&self.transport);
        let conversation = self.conversation;
        let idle_timeout = self.idle_timeout;

        tokio::spawn(
            async move {
                tokio::time::sleep(idle_timeout).await;

                {
                    let mut state = state.lock().expect("typing state mutex poisoned");
                    if state.epoch != epoch || !state.is_typing {
                        return;
                    }
                    state.is_typing = false;
                    state.timer = None;
                }

                tracing::debug!(%conversation, "Typing stopped by inactivity");
                if let Err(e) = transport.typing_stopped(conversation).await {
                    tracing::debug!(error = %e, "Failed to emit stop-typing signal");
                }
            }
            .instrument(tracing::trace_span!("typing_idle_timer", conversation = %self.conversation)),
        )
    }

    /// Presence signals are fire-and-forget; failures are logged, never
    /// surfaced to the composer.
    fn emit(&self, started: bool) {
        let transport = Arc::clone(&self.transport);
        let conversation = self.conversation;
        tokio::spawn(async move {
            let result = if started {
                transport.typing_started(conversation).await
            } else {
                transport.typing_stopped(conversation).await
            };
            if let Err(e) = result {
                tracing::debug!(error = %e, started, "Failed to emit typing signal");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use uuid::Uuid;

    #[derive(Debug, Default)]
    struct RecordingPresence {
        signals: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl PresenceTransport for RecordingPresence {
        async fn typing_started(&self, _conversation: ConversationId) -> Result<()> {
            self.signals.lock().expect("signals").push("start");
            Ok(())
        }

        async fn typing_stopped(&self, _conversation: ConversationId) -> Result<()> {
            self.signals.lock().expect("signals").push("stop");
            Ok(())
        }
    }

    impl RecordingPresence {
        fn signals(&self) -> Vec<&'static str> {
            self.signals.lock().expect("signals").clone()
        }
    }

    fn debouncer(transport: &Arc<RecordingPresence>) -> TypingDebouncer {
        let presence: Arc<dyn PresenceTransport> = Arc::clone(transport) as _;
        TypingDebouncer::new(ConversationId::Direct(Uuid::new_v4()), presence, 3000)
    }

    async fn settle() {
        // Lets spawned signal emissions run on the paused test runtime.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_emits_exactly_one_start() {
        let presence = Arc::new(RecordingPresence::default());
        let typing = debouncer(&presence);

        for text in ["m", "me", "mer", "merh", "merha"] {
            typing.input_changed(text);
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        settle().await;
        assert_eq!(presence.signals(), vec!["start"]);
        assert!(typing.is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_past_timeout_emits_one_stop() {
        let presence = Arc::new(RecordingPresence::default());
        let typing = debouncer(&presence);

        typing.input_changed("selam");
        tokio::time::sleep(Duration::from_millis(3100)).await;

        assert_eq!(presence.signals(), vec!["start", "stop"]);
        assert!(!typing.is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn keystrokes_keep_resetting_the_timer() {
        let presence = Arc::new(RecordingPresence::default());
        let typing = debouncer(&presence);

        typing.input_changed("s");
        tokio::time::sleep(Duration::from_millis(2900)).await;
        typing.input_changed("se");
        tokio::time::sleep(Duration::from_millis(2900)).await;

        settle().await;
        assert_eq!(presence.signals(), vec!["start"], "timer must restart on every keystroke");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(presence.signals(), vec!["start", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_forces_an_immediate_stop() {
        let presence = Arc::new(RecordingPresence::default());
        let typing = debouncer(&presence);

        typing.input_changed("yaz");
        settle().await;
        typing.input_changed("");
        settle().await;

        assert_eq!(presence.signals(), vec!["start", "stop"]);

        // No stale timer stop later.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(presence.signals(), vec!["start", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_is_a_no_op() {
        let presence = Arc::new(RecordingPresence::default());
        let typing = debouncer(&presence);

        typing.message_sent();
        typing.shutdown();
        typing.input_changed("");
        settle().await;

        assert!(presence.signals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resumed_burst_after_timeout_restarts_cleanly() {
        let presence = Arc::new(RecordingPresence::default());
        let typing = debouncer(&presence);

        typing.input_changed("ilk");
        tokio::time::sleep(Duration::from_millis(3100)).await;
        typing.input_changed("ikinci");
        settle().await;

        assert_eq!(presence.signals(), vec!["start", "stop", "start"]);
    }

    #[tokio::test(start_paused = true)]
    async fn send_cancels_the_pending_timer() {
        let presence = Arc::new(RecordingPresence::default());
        let typing = debouncer(&presence);

        typing.input_changed("gidiyor");
        settle().await;
        typing.message_sent();
        settle().await;
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(presence.signals(), vec!["start", "stop"], "no second stop from a stale timer");
    }
}
