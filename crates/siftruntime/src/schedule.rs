use siftcore::{GraphError, NodeId, WorkflowGraph};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Compute a deterministic execution order for the graph.
///
/// Kahn's algorithm over in-degree counts. When several nodes are ready at
/// once, the lexicographically smallest id is dequeued first, so the order is
/// byte-identical across runs and machines. Fingerprints and diagnostics
/// depend on that reproducibility.
///
/// Returns `GraphError::Cycle` listing exactly the nodes never dequeued: the
/// cyclic subgraph plus anything reachable only through it.
pub fn order(graph: &WorkflowGraph) -> Result<Vec<NodeId>, GraphError> {
    let mut in_degree: HashMap<&str, usize> = graph
        .nodes()
        .map(|node| (node.id.as_str(), graph.in_degree(&node.id)))
        .collect();

    let mut ready: BinaryHeap<Reverse<&str>> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut sorted = Vec::with_capacity(in_degree.len());
    while let Some(Reverse(id)) = ready.pop() {
        sorted.push(id.to_string());
        for edge in graph.outgoing_edges(id) {
            let degree = in_degree
                .get_mut(edge.target_node.as_str())
                .expect("edge target is a graph node");
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(edge.target_node.as_str()));
            }
        }
    }

    if sorted.len() != graph.node_count() {
        let mut stuck: Vec<NodeId> = graph
            .nodes()
            .filter(|node| !sorted.iter().any(|id| *id == node.id))
            .map(|node| node.id.clone())
            .collect();
        stuck.sort();
        return Err(GraphError::Cycle { nodes: stuck });
    }
    Ok(sorted)
}
