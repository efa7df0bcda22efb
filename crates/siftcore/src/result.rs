use crate::{Artifact, Fingerprint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Execution status of a node within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Success,
    Error,
    /// Output served from cache or reused from the previous pass.
    SkippedCached,
    /// Not executed at all; see the skip reason.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A transitive predecessor failed, so this node is moot.
    BlockedByUpstream,
    /// The run was cancelled before this node was dispatched.
    Cancelled,
}

/// Per-node record of one execution pass.
///
/// Superseded, not merged, by the next pass's record for the same node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: NodeStatus,
    /// Output artifacts by port. Shared rather than copied; artifacts are
    /// immutable once produced.
    pub outputs: HashMap<String, Arc<Artifact>>,
    pub error: Option<String>,
    pub skip_reason: Option<SkipReason>,
    /// Fingerprint this pass computed for the node, absent when moot
    /// (blocked or cancelled before fingerprinting).
    pub fingerprint: Option<Fingerprint>,
    pub duration_ms: u64,
    /// Free-form diagnostics from the node's compute.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ExecutionResult {
    pub fn success(
        outputs: HashMap<String, Arc<Artifact>>,
        fingerprint: Option<Fingerprint>,
        duration_ms: u64,
    ) -> Self {
        Self {
            status: NodeStatus::Success,
            outputs,
            error: None,
            skip_reason: None,
            fingerprint,
            duration_ms,
            metadata: BTreeMap::new(),
        }
    }

    pub fn cached(
        outputs: HashMap<String, Arc<Artifact>>,
        fingerprint: Option<Fingerprint>,
    ) -> Self {
        Self {
            status: NodeStatus::SkippedCached,
            outputs,
            error: None,
            skip_reason: None,
            fingerprint,
            duration_ms: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn error(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: NodeStatus::Error,
            outputs: HashMap::new(),
            error: Some(message.into()),
            skip_reason: None,
            fingerprint: None,
            duration_ms,
            metadata: BTreeMap::new(),
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            status: NodeStatus::Skipped,
            outputs: HashMap::new(),
            error: None,
            skip_reason: Some(reason),
            fingerprint: None,
            duration_ms: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }

    /// True when this node produced or reused outputs that dependents may
    /// consume.
    pub fn has_outputs(&self) -> bool {
        matches!(self.status, NodeStatus::Success | NodeStatus::SkippedCached)
    }

    pub fn output(&self, port: &str) -> Option<&Arc<Artifact>> {
        self.outputs.get(port)
    }
}
