use tokio::sync::broadcast;

use super::case::CaseSummary;
use super::context::ContextKey;
use super::message::Message;

/// Default capacity of the event channel. Slow subscribers that fall more
/// than this many events behind observe a `Lagged` error, not engine
/// backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the engine for the rendering layer to consume.
/// Stream events are tagged with the context they belong to so subscribers
/// can filter.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    UserMessageAppended {
        context: ContextKey,
        message: Message,
    },
    /// Incremental assistant text for an in-flight response.
    Delta {
        context: ContextKey,
        text: String,
    },
    StreamCompleted {
        context: ContextKey,
        message: Message,
    },
    /// The partial message preserved when the user stopped a response.
    StreamCancelled {
        context: ContextKey,
        message: Message,
    },
    /// A synthesized assistant message explaining a transport failure.
    StreamFailed {
        context: ContextKey,
        message: Message,
    },
    /// Full replacement of the visible message list after a context switch.
    ContextSwitched {
        context: ContextKey,
        messages: Vec<Message>,
    },
    AnalysisCompleted {
        context: ContextKey,
        message: Message,
    },
    DuplicateDetected {
        existing: CaseSummary,
    },
    CaseCreated {
        case_id: String,
    },
}

/// Broadcast channel the engine publishes [`EngineEvent`]s on.
///
/// Cloning shares the underlying channel. Emitting never blocks and never
/// fails: events sent while no subscriber is attached are simply dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        // Send only errors when there are no receivers; that is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(EngineEvent::CaseCreated {
            case_id: "c1".to_string(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(EngineEvent::Delta {
            context: ContextKey::Global,
            text: "first".to_string(),
        });
        bus.emit(EngineEvent::Delta {
            context: ContextKey::Global,
            text: "second".to_string(),
        });

        match rx.recv().await.unwrap() {
            EngineEvent::Delta { text, .. } => assert_eq!(text, "first"),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            EngineEvent::Delta { text, .. } => assert_eq!(text, "second"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
