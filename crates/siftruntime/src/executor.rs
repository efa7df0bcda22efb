use crate::cache::CacheStore;
use crate::registry::NodeRegistry;
use crate::{fingerprint, invalidate, schedule};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use siftcore::{
    Artifact, CachePolicy, ComputeContext, EngineError, EventBus, ExecutionEvent,
    ExecutionResult, Fingerprint, NodeId, NodeStatus, RunId, SkipReason, WorkflowGraph,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Run-level knobs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Workflow-level seed for stochastic nodes; mixed into source-node
    /// fingerprints.
    pub seed: Option<i64>,
    /// Checked between node dispatches; in-flight nodes finish naturally.
    pub cancellation: CancellationToken,
}

/// Orchestrates one execution pass: order, closure, fingerprint, cache,
/// compute, publish.
///
/// The coordinator is the sole writer of per-run state. A node's result is
/// published exactly once and is visible before any dependent is dispatched;
/// dependents only ever see fully written upstream outputs.
pub struct Coordinator {
    registry: Arc<NodeRegistry>,
    cache: Arc<CacheStore>,
    events: Arc<EventBus>,
    max_parallel: usize,
    node_timeout: Option<Duration>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<NodeRegistry>,
        cache: Arc<CacheStore>,
        events: Arc<EventBus>,
        max_parallel: usize,
        node_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            cache,
            events,
            max_parallel: max_parallel.max(1),
            node_timeout,
        }
    }

    /// Execute the graph. `changed = None` treats every node as changed;
    /// `changed = Some(ids)` restricts recomputation to the invalidation
    /// closure of `ids`, reusing `prior` results outside it.
    ///
    /// Structural errors (a cycle) fail the whole call. Per-node failures
    /// never do: the returned map covers every node, partitioned into
    /// success, error, and skipped.
    pub async fn run(
        &self,
        graph: &WorkflowGraph,
        changed: Option<&[NodeId]>,
        prior: &HashMap<NodeId, ExecutionResult>,
        opts: &RunOptions,
    ) -> Result<HashMap<NodeId, ExecutionResult>, EngineError> {
        let order = schedule::order(graph)?;
        let run_id = RunId::new_v4();
        let run_start = Instant::now();

        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            node_count: order.len(),
            timestamp: Utc::now(),
        });
        tracing::info!("Starting run {} over {} nodes", run_id, order.len());

        let closure: Option<BTreeSet<NodeId>> =
            changed.map(|ids| invalidate::closure(graph, ids));

        let mut results: HashMap<NodeId, ExecutionResult> = HashMap::new();
        let mut fingerprints: HashMap<NodeId, Fingerprint> = HashMap::new();
        let mut dispatched: BTreeSet<NodeId> = BTreeSet::new();
        let mut running = FuturesUnordered::new();

        loop {
            // Resolve everything resolvable without computing, then dispatch
            // computes up to the pool bound. Repeats until a fixpoint since
            // each cheap resolution can unblock the next node in order.
            let mut progressed = true;
            while progressed {
                progressed = false;
                for id in &order {
                    if results.contains_key(id) || dispatched.contains(id) {
                        continue;
                    }
                    let preds = graph.predecessors(id);
                    if preds.iter().any(|(_, src, _)| !results.contains_key(src)) {
                        continue;
                    }

                    if opts.cancellation.is_cancelled() {
                        results.insert(id.clone(), ExecutionResult::skipped(SkipReason::Cancelled));
                        progressed = true;
                        continue;
                    }

                    // A failed or skipped predecessor makes this node moot:
                    // no fingerprint, no cache traffic.
                    if preds.iter().any(|(_, src, _)| !results[src.as_str()].has_outputs()) {
                        let result = ExecutionResult::skipped(SkipReason::BlockedByUpstream);
                        self.emit_finished(run_id, id, &result);
                        results.insert(id.clone(), result);
                        progressed = true;
                        continue;
                    }

                    // Outside the closure the previous pass's fingerprint and
                    // outputs still hold; reuse them without recomputation.
                    let in_closure = closure.as_ref().map_or(true, |c| c.contains(id));
                    if !in_closure {
                        if let Some(prev) = prior.get(id) {
                            if prev.has_outputs() {
                                if let Some(fp) = prev.fingerprint {
                                    fingerprints.insert(id.clone(), fp);
                                    let result =
                                        ExecutionResult::cached(prev.outputs.clone(), Some(fp));
                                    self.emit_finished(run_id, id, &result);
                                    results.insert(id.clone(), result);
                                    progressed = true;
                                    continue;
                                }
                            }
                        }
                        // No usable prior result; fall through and treat the
                        // node like any other (the cache may still hit).
                    }

                    let node = graph.node(id).expect("ordered id is a graph node");
                    let node_type = match self.registry.resolve(&node.node_type) {
                        Ok(t) => t,
                        Err(e) => {
                            let result = ExecutionResult::error(e.to_string(), 0);
                            self.emit_failed(run_id, id, &result);
                            results.insert(id.clone(), result);
                            progressed = true;
                            continue;
                        }
                    };

                    // Upstream fingerprints are always available here because
                    // the order is topological and predecessors resolved with
                    // outputs always carry one.
                    let pairs: Vec<(String, Fingerprint)> = preds
                        .iter()
                        .map(|(port, src, _)| (port.clone(), fingerprints[src.as_str()]))
                        .collect();
                    let fp = fingerprint::fingerprint_node(node, &pairs, opts.seed);
                    fingerprints.insert(id.clone(), fp);

                    if node_type.cache_policy() == CachePolicy::Auto {
                        if let Some(outputs) = self.lookup_all_ports(&fp, node_type.outputs()) {
                            self.events.emit(ExecutionEvent::CacheHit {
                                run_id,
                                node_id: id.clone(),
                                fingerprint: fp.to_hex(),
                                timestamp: Utc::now(),
                            });
                            tracing::debug!("Using cached result for node {}", id);
                            let result = ExecutionResult::cached(outputs, Some(fp));
                            self.emit_finished(run_id, id, &result);
                            results.insert(id.clone(), result);
                            progressed = true;
                            continue;
                        }
                    }

                    if let Some(missing) = node_type
                        .required_inputs()
                        .iter()
                        .find(|req| !preds.iter().any(|(port, _, _)| port == *req))
                    {
                        let result = ExecutionResult::error(
                            format!("Missing required input: {missing}"),
                            0,
                        );
                        self.emit_failed(run_id, id, &result);
                        results.insert(id.clone(), result);
                        progressed = true;
                        continue;
                    }

                    if running.len() >= self.max_parallel {
                        // Pool is full; this node stays pending until a slot
                        // frees up.
                        continue;
                    }

                    let mut inputs = HashMap::new();
                    for (port, src, src_port) in &preds {
                        if let Some(artifact) = results[src.as_str()].output(src_port) {
                            inputs.insert(port.clone(), Arc::clone(artifact));
                        }
                    }

                    self.events.emit(ExecutionEvent::NodeStarted {
                        run_id,
                        node_id: id.clone(),
                        node_type: node.node_type.clone(),
                        timestamp: Utc::now(),
                    });
                    tracing::info!("Executing node {} ({})", id, node.node_type);

                    let ctx = ComputeContext {
                        node_id: id.clone(),
                        params: node.params.clone(),
                        inputs,
                        seed: opts.seed,
                        cancellation: opts.cancellation.child_token(),
                    };
                    let task_type = Arc::clone(&node_type);
                    let task_id = id.clone();
                    let limit = self.node_timeout;
                    dispatched.insert(id.clone());
                    let handle = tokio::spawn(async move {
                        let start = Instant::now();
                        let outcome = match limit {
                            Some(limit) => match timeout(limit, task_type.compute(ctx)).await {
                                Ok(res) => res,
                                Err(_) => Err(siftcore::NodeError::Timeout {
                                    seconds: limit.as_secs(),
                                }),
                            },
                            None => task_type.compute(ctx).await,
                        };
                        (outcome, start.elapsed().as_millis() as u64)
                    });
                    // A panicking compute must not take the run down with it;
                    // the join error becomes that node's error outcome.
                    running.push(async move {
                        match handle.await {
                            Ok((outcome, duration_ms)) => (task_id, outcome, duration_ms),
                            Err(e) => (
                                task_id,
                                Err(siftcore::NodeError::ExecutionFailed(format!(
                                    "task panicked: {e}"
                                ))),
                                0,
                            ),
                        }
                    });
                    progressed = true;
                }
            }

            if running.is_empty() {
                break;
            }

            let (id, outcome, duration_ms) = running
                .next()
                .await
                .expect("running set is non-empty");
            dispatched.remove(&id);

            match outcome {
                Ok(output) => {
                    let fp = fingerprints[id.as_str()];
                    let node = graph.node(&id).expect("ordered id is a graph node");
                    let policy = self
                        .registry
                        .resolve(&node.node_type)
                        .map(|t| t.cache_policy())
                        .unwrap_or(CachePolicy::Never);

                    let mut stored: HashMap<String, Arc<Artifact>> = HashMap::new();
                    for (port, artifact) in output.outputs {
                        let artifact = if policy == CachePolicy::Auto {
                            self.cache
                                .put(&fingerprint::port_fingerprint(&fp, &port), artifact)
                        } else {
                            Arc::new(artifact)
                        };
                        stored.insert(port, artifact);
                    }

                    tracing::info!("Node {} completed in {}ms", id, duration_ms);
                    let mut result = ExecutionResult::success(stored, Some(fp), duration_ms);
                    result.metadata = output.metadata;
                    self.emit_finished(run_id, &id, &result);
                    results.insert(id, result);
                }
                Err(e) => {
                    tracing::error!("Node {} failed: {}", id, e);
                    let result = ExecutionResult::error(e.to_string(), duration_ms);
                    self.emit_failed(run_id, &id, &result);
                    results.insert(id, result);
                }
            }
        }

        let succeeded = results
            .values()
            .filter(|r| r.status == NodeStatus::Success)
            .count();
        let failed = results
            .values()
            .filter(|r| r.status == NodeStatus::Error)
            .count();
        let duration_ms = run_start.elapsed().as_millis() as u64;
        self.events.emit(ExecutionEvent::RunFinished {
            run_id,
            succeeded,
            failed,
            duration_ms,
            timestamp: Utc::now(),
        });
        tracing::info!(
            "Run {} finished in {}ms ({} ok, {} failed)",
            run_id,
            duration_ms,
            succeeded,
            failed
        );
        Ok(results)
    }

    /// Consult the cache for every declared output port of a node. A hit
    /// requires every port to be present so dependents never see a partial
    /// binding. A node with no declared ports (a sink) has nothing to look
    /// up and always misses; its compute runs every pass.
    fn lookup_all_ports(
        &self,
        fp: &Fingerprint,
        ports: &[&str],
    ) -> Option<HashMap<String, Arc<Artifact>>> {
        if ports.is_empty() {
            return None;
        }
        let mut outputs = HashMap::new();
        for port in ports {
            let artifact = self.cache.get(&fingerprint::port_fingerprint(fp, port))?;
            outputs.insert(port.to_string(), artifact);
        }
        Some(outputs)
    }

    fn emit_finished(&self, run_id: RunId, node_id: &str, result: &ExecutionResult) {
        self.events.emit(ExecutionEvent::NodeFinished {
            run_id,
            node_id: node_id.to_string(),
            status: result.status,
            duration_ms: result.duration_ms,
            timestamp: Utc::now(),
        });
    }

    fn emit_failed(&self, run_id: RunId, node_id: &str, result: &ExecutionResult) {
        self.events.emit(ExecutionEvent::NodeFailed {
            run_id,
            node_id: node_id.to_string(),
            error: result.error.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        });
    }
}
