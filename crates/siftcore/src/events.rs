use crate::NodeStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Events emitted while a run progresses. The editor subscribes to these to
/// stream per-node status back to the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    RunStarted {
        run_id: RunId,
        node_count: usize,
        timestamp: DateTime<Utc>,
    },
    RunFinished {
        run_id: RunId,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        run_id: RunId,
        node_id: String,
        node_type: String,
        timestamp: DateTime<Utc>,
    },
    NodeFinished {
        run_id: RunId,
        node_id: String,
        status: NodeStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        run_id: RunId,
        node_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    CacheHit {
        run_id: RunId,
        node_id: String,
        fingerprint: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for execution events. Send failures mean no subscriber is
/// listening, which is fine.
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

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
