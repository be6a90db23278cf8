use crate::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted during a flow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    FlowStarted {
        execution_id: ExecutionId,
        flow_id: Option<String>,
        roots: usize,
        timestamp: DateTime<Utc>,
    },
    FlowCompleted {
        execution_id: ExecutionId,
        success: bool,
        visited_nodes: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeVisited {
        execution_id: ExecutionId,
        node_id: NodeId,
        node_type: String,
        /// Branch value after the `returnValue` gate
        effective_result: bool,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        execution_id: ExecutionId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::FlowStarted { execution_id, .. }
            | ExecutionEvent::FlowCompleted { execution_id, .. }
            | ExecutionEvent::NodeVisited { execution_id, .. }
            | ExecutionEvent::NodeFailed { execution_id, .. } => *execution_id,
        }
    }
}

/// Broadcast channel for execution events
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// No subscribers is fine; the event is dropped.
    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let execution_id = ExecutionId::new_v4();

        bus.emit(ExecutionEvent::FlowStarted {
            execution_id,
            flow_id: None,
            roots: 1,
            timestamp: Utc::now(),
        });
        bus.emit(ExecutionEvent::NodeVisited {
            execution_id,
            node_id: "A".to_string(),
            node_type: "policy".to_string(),
            effective_result: true,
            timestamp: Utc::now(),
        });

        assert!(matches!(rx.recv().await.unwrap(), ExecutionEvent::FlowStarted { .. }));
        match rx.recv().await.unwrap() {
            ExecutionEvent::NodeVisited { node_id, .. } => assert_eq!(node_id, "A"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit(ExecutionEvent::NodeFailed {
            execution_id: ExecutionId::new_v4(),
            node_id: "A".to_string(),
            error: "boom".to_string(),
            timestamp: Utc::now(),
        });
    }
}
