//! Core abstractions for the sift engine
//!
//! This crate provides the graph model, parameter and artifact types, the
//! node compute contract, and the error taxonomy that the runtime builds on.
//! It carries no scheduling or caching machinery.

mod artifact;
mod error;
mod events;
mod graph;
mod node;
mod result;
mod value;

pub use artifact::{Artifact, Fingerprint, TableData};
pub use error::{EngineError, GraphError, NodeError};
pub use events::{EventBus, ExecutionEvent, RunId};
pub use graph::{Edge, NodeId, NodeSpec, Position, WorkflowGraph};
pub use node::{CachePolicy, ComputeContext, ComputeOutput, NodeType};
pub use result::{ExecutionResult, NodeStatus, SkipReason};
pub use value::ParamValue;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
