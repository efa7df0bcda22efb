use siftcore::{NodeId, WorkflowGraph};
use std::collections::{BTreeSet, VecDeque};

/// Compute the invalidation closure of a set of changed nodes.
///
/// Returns the changed nodes plus everything forward-reachable from them. A
/// node outside this set has an unchanged fingerprint by construction and is
/// safe to serve from its previous result.
pub fn closure(graph: &WorkflowGraph, changed: &[NodeId]) -> BTreeSet<NodeId> {
    let mut reached: BTreeSet<NodeId> = BTreeSet::new();
    let mut frontier: VecDeque<NodeId> = VecDeque::new();

    for id in changed {
        if graph.contains(id) && reached.insert(id.clone()) {
            frontier.push_back(id.clone());
        }
    }
    while let Some(id) = frontier.pop_front() {
        for succ in graph.successors(&id) {
            if reached.insert(succ.clone()) {
                frontier.push_back(succ);
            }
        }
    }
    reached
}
