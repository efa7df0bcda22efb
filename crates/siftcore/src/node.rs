use crate::{Artifact, NodeError, ParamValue};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Cache behavior declared by a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Cache under the node's fingerprint.
    #[default]
    Auto,
    /// Always recompute; the payload's value is presentation, not reuse.
    /// Visualization nodes typically declare this.
    Never,
}

/// Contract implemented by every node type.
///
/// The engine never introspects node logic beyond this trait: it resolves the
/// declared ports, calls `compute`, and maps the outcome onto an execution
/// result. Implementations must be deterministic given identical parameters
/// and inputs if they declare `CachePolicy::Auto`.
#[async_trait]
pub trait NodeType: Send + Sync {
    /// Type identifier, e.g. "source.range" or "transform.scale".
    fn node_type(&self) -> &str;

    /// Input ports that must be bound before execution.
    fn required_inputs(&self) -> &[&str];

    fn optional_inputs(&self) -> &[&str] {
        &[]
    }

    fn outputs(&self) -> &[&str];

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Auto
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError>;
}

/// Everything a node's compute sees: resolved input artifacts, parameters,
/// and run-level context.
#[derive(Clone)]
pub struct ComputeContext {
    pub node_id: String,
    pub params: BTreeMap<String, ParamValue>,
    pub inputs: HashMap<String, Arc<Artifact>>,
    /// Workflow-level seed for stochastic nodes; participates in source-node
    /// fingerprints so that changing it invalidates downstream results.
    pub seed: Option<i64>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl ComputeContext {
    pub fn require_input(&self, name: &str) -> Result<&Arc<Artifact>, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    pub fn input(&self, name: &str) -> Option<&Arc<Artifact>> {
        self.inputs.get(name)
    }

    pub fn require_param(&self, name: &str) -> Result<&ParamValue, NodeError> {
        self.params
            .get(name)
            .ok_or_else(|| NodeError::MissingParam(name.to_string()))
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn param_or(&self, name: &str, default: ParamValue) -> ParamValue {
        self.params.get(name).cloned().unwrap_or(default)
    }
}

/// Output of a successful compute: artifacts by port plus diagnostics.
#[derive(Debug, Default)]
pub struct ComputeOutput {
    pub outputs: HashMap<String, Artifact>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ComputeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, port: impl Into<String>, artifact: Artifact) -> Self {
        self.outputs.insert(port.into(), artifact);
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
