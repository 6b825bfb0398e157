//! Lifecycle notifications.
//!
//! The core publishes `CoreEvent`s on a broadcast channel. Subscribers that
//! fall behind lose the oldest events; publishing never blocks and never
//! fails when nobody is listening.

use serde::Serialize;
use tokio::sync::broadcast;

use super::types::{CloseReason, ExecutionStatus};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    SessionCreated {
        session_id: String,
        user_id: String,
    },
    SessionClosed {
        session_id: String,
        reason: CloseReason,
    },
    AgentSpawned {
        session_id: String,
        instance_id: String,
        template_id: String,
    },
    ExecutionStarted {
        session_id: String,
        execution_id: String,
        steps: usize,
    },
    ExecutionFinished {
        session_id: String,
        execution_id: String,
        status: ExecutionStatus,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: CoreEvent) {
        // Err only means there are no subscribers right now.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(CoreEvent::SessionCreated {
            session_id: "s".into(),
            user_id: "u".into(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(CoreEvent::SessionCreated {
            session_id: "s".into(),
            user_id: "u".into(),
        });
        bus.emit(CoreEvent::SessionClosed {
            session_id: "s".into(),
            reason: CloseReason::Requested,
        });
        assert!(matches!(rx.recv().await.unwrap(), CoreEvent::SessionCreated { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            CoreEvent::SessionClosed {
                reason: CloseReason::Requested,
                ..
            }
        ));
    }

    #[test]
    fn event_json_is_tagged() {
        let json = serde_json::to_value(CoreEvent::ExecutionFinished {
            session_id: "s".into(),
            execution_id: "e".into(),
            status: ExecutionStatus::Failed,
        })
        .unwrap();
        assert_eq!(json["type"], "execution_finished");
        assert_eq!(json["status"], "failed");
    }
}
