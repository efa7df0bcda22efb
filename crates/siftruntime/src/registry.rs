use siftcore::{EngineError, NodeType};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available node types.
///
/// The engine resolves a node type once per node and only ever calls the
/// contract's declared ports and `compute`; node internals stay opaque.
#[derive(Default)]
pub struct NodeRegistry {
    types: HashMap<String, Arc<dyn NodeType>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. Re-registering a type id replaces the previous
    /// contract.
    pub fn register(&mut self, node_type: Arc<dyn NodeType>) {
        let id = node_type.node_type().to_string();
        if self.types.contains_key(&id) {
            tracing::warn!("Node type '{}' already registered, overwriting", id);
        } else {
            tracing::info!("Registering node type: {}", id);
        }
        self.types.insert(id, node_type);
    }

    pub fn resolve(&self, type_id: &str) -> Result<Arc<dyn NodeType>, EngineError> {
        self.types
            .get(type_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNodeType(type_id.to_string()))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.types.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use siftcore::{ComputeContext, ComputeOutput, NodeError};

    struct Noop;

    #[async_trait]
    impl NodeType for Noop {
        fn node_type(&self) -> &str {
            "test.noop"
        }
        fn required_inputs(&self) -> &[&str] {
            &[]
        }
        fn outputs(&self) -> &[&str] {
            &["out"]
        }
        async fn compute(&self, _ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
            Ok(ComputeOutput::new())
        }
    }

    #[test]
    fn resolve_known_and_unknown() {
        let mut registry = NodeRegistry::new();
        registry.register(Arc::new(Noop));

        assert!(registry.resolve("test.noop").is_ok());
        assert!(matches!(
            registry.resolve("test.missing"),
            Err(EngineError::UnknownNodeType(_))
        ));
        assert_eq!(registry.list_types(), vec!["test.noop".to_string()]);
    }
}
