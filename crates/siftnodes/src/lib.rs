//! Built-in node library
//!
//! A small set of source, transform, metrics, and visualization nodes that
//! implement the engine's compute contract. Enough to build real workflows
//! and to exercise incremental execution end to end.

mod metrics;
mod sources;
mod transform;
mod visualization;

pub use metrics::SummaryNode;
pub use sources::{ConstantNode, RandomSourceNode, RangeSourceNode};
pub use transform::{HeadNode, ScaleNode, SelectColumnsNode};
pub use visualization::PreviewNode;

use siftruntime::NodeRegistry;
use std::sync::Arc;

/// Register every built-in node type with a registry.
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(sources::RangeSourceNode));
    registry.register(Arc::new(sources::ConstantNode));
    registry.register(Arc::new(sources::RandomSourceNode));
    registry.register(Arc::new(transform::ScaleNode));
    registry.register(Arc::new(transform::SelectColumnsNode));
    registry.register(Arc::new(transform::HeadNode));
    registry.register(Arc::new(metrics::SummaryNode));
    registry.register(Arc::new(visualization::PreviewNode));
}
