use crate::cache::{CacheConfig, CacheStore};
use crate::executor::{Coordinator, RunOptions};
use crate::registry::NodeRegistry;
use crate::{fingerprint, schedule};
use siftcore::{
    EngineError, EventBus, ExecutionEvent, ExecutionResult, Fingerprint, GraphError,
    NodeId, WorkflowGraph,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

/// Engine configuration. Exact capacities and bounds are tunables, not
/// invariants.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_parallel_nodes: usize,
    pub node_timeout: Option<Duration>,
    pub cache: CacheConfig,
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 8,
            node_timeout: None,
            cache: CacheConfig::default(),
            event_buffer_size: 1024,
        }
    }
}

#[derive(Default)]
struct EngineState {
    /// Last pass's result per node; superseded wholesale by the next pass.
    results: HashMap<NodeId, ExecutionResult>,
    /// Declared output ports per node at the time of its last result, so
    /// per-port cache keys can be reconstructed for invalidation.
    output_ports: HashMap<NodeId, Vec<String>>,
}

/// The surface the editor/API layer talks to.
///
/// All calls are plain request/response; transport framing is the caller's
/// concern.
pub struct Engine {
    registry: Arc<NodeRegistry>,
    cache: Arc<CacheStore>,
    events: Arc<EventBus>,
    coordinator: Coordinator,
    state: RwLock<EngineState>,
}

impl Engine {
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        let cache = Arc::new(CacheStore::open(config.cache.clone()));
        let events = Arc::new(EventBus::new(config.event_buffer_size));
        let coordinator = Coordinator::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&events),
            config.max_parallel_nodes,
            config.node_timeout,
        );
        Self {
            registry,
            cache,
            events,
            coordinator,
            state: RwLock::new(EngineState::default()),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Execute a workflow. `changed = None` runs everything; `changed =
    /// Some(ids)` recomputes only the invalidation closure of `ids` and
    /// serves the rest from prior results.
    pub async fn run(
        &self,
        graph: &WorkflowGraph,
        changed: Option<&[NodeId]>,
    ) -> Result<HashMap<NodeId, ExecutionResult>, EngineError> {
        self.run_with(graph, changed, RunOptions::default()).await
    }

    pub async fn run_with(
        &self,
        graph: &WorkflowGraph,
        changed: Option<&[NodeId]>,
        opts: RunOptions,
    ) -> Result<HashMap<NodeId, ExecutionResult>, EngineError> {
        let prior = {
            let state = self.state.read().await;
            state.results.clone()
        };
        let results = self.coordinator.run(graph, changed, &prior, &opts).await?;

        let mut state = self.state.write().await;
        for (id, result) in &results {
            state.results.insert(id.clone(), result.clone());
            if let Some(node) = graph.node(id) {
                state.output_ports.insert(id.clone(), node.outputs.clone());
            }
        }
        Ok(results)
    }

    /// Check the graph without running it: a valid execution order, or the
    /// cycle that prevents one.
    pub fn validate(&self, graph: &WorkflowGraph) -> Result<Vec<NodeId>, GraphError> {
        schedule::order(graph)
    }

    pub async fn get_result(&self, node_id: &str) -> Result<ExecutionResult, EngineError> {
        let state = self.state.read().await;
        state
            .results
            .get(node_id)
            .cloned()
            .ok_or_else(|| EngineError::ResultNotFound(node_id.to_string()))
    }

    pub fn cache_clear(&self) {
        self.cache.clear();
    }

    pub fn cache_size_bytes(&self) -> u64 {
        self.cache.size_bytes()
    }

    /// Drop the cached entries behind a node's last known fingerprint and
    /// forget its recorded result, forcing recomputation next pass.
    pub async fn cache_invalidate(&self, node_id: &str) {
        let mut state = self.state.write().await;
        let fp: Option<Fingerprint> = state
            .results
            .get(node_id)
            .and_then(|result| result.fingerprint);
        if let Some(fp) = fp {
            let ports = state.output_ports.get(node_id).cloned().unwrap_or_default();
            for port in ports {
                self.cache
                    .invalidate(&fingerprint::port_fingerprint(&fp, &port));
            }
        }
        state.results.remove(node_id);
        state.output_ports.remove(node_id);
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }
}
