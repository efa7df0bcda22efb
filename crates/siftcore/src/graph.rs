use crate::{GraphError, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type NodeId = String;

/// Node instance in a workflow.
///
/// Parameters are an ordered map so that iteration order is stable; the
/// declared port lists come from the node type's contract and are recorded
/// here so the graph can validate connections without consulting a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub node_type: String,
    pub label: Option<String>,
    pub params: BTreeMap<String, ParamValue>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// Editor placement, ignored by the engine and by fingerprints.
    pub position: Option<Position>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: None,
            params: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            position: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_inputs(mut self, ports: &[&str]) -> Self {
        self.inputs = ports.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_outputs(mut self, ports: &[&str]) -> Self {
        self.outputs = ports.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

/// Node position in the visual editor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source_node: NodeId,
    pub source_port: String,
    pub target_node: NodeId,
    pub target_port: String,
}

impl Edge {
    pub fn new(
        source_node: impl Into<NodeId>,
        source_port: impl Into<String>,
        target_node: impl Into<NodeId>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source_node: source_node.into(),
            source_port: source_port.into(),
            target_node: target_node.into(),
            target_port: target_port.into(),
        }
    }
}

/// Workflow graph with incrementally maintained adjacency.
///
/// Adjacency is indexed on every mutation so structural queries are O(degree)
/// rather than a scan over all edges. Acyclicity is not enforced here; cycles
/// are detected and reported by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    nodes: BTreeMap<NodeId, NodeSpec>,
    /// target node -> input port -> (source node, source port)
    incoming: HashMap<NodeId, BTreeMap<String, (NodeId, String)>>,
    /// source node -> outgoing edges, in connection order
    outgoing: HashMap<NodeId, Vec<Edge>>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeSpec) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
        self.incoming.insert(node.id.clone(), BTreeMap::new());
        self.outgoing.insert(node.id.clone(), Vec::new());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove a node and cascade removal of every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<NodeSpec, GraphError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        // Detach edges into this node from their sources.
        if let Some(ports) = self.incoming.remove(id) {
            for (_, (source, _)) in ports {
                if let Some(edges) = self.outgoing.get_mut(&source) {
                    edges.retain(|e| e.target_node != id);
                }
            }
        }
        // Detach edges out of this node from their targets.
        if let Some(edges) = self.outgoing.remove(id) {
            for edge in edges {
                if let Some(ports) = self.incoming.get_mut(&edge.target_node) {
                    ports.remove(&edge.target_port);
                }
            }
        }
        Ok(node)
    }

    pub fn connect(&mut self, edge: Edge) -> Result<(), GraphError> {
        let source = self
            .nodes
            .get(&edge.source_node)
            .ok_or_else(|| GraphError::NodeNotFound(edge.source_node.clone()))?;
        let target = self
            .nodes
            .get(&edge.target_node)
            .ok_or_else(|| GraphError::NodeNotFound(edge.target_node.clone()))?;

        if !source.outputs.iter().any(|p| *p == edge.source_port) {
            return Err(GraphError::UnknownPort {
                node: edge.source_node.clone(),
                port: edge.source_port.clone(),
            });
        }
        if !target.inputs.iter().any(|p| *p == edge.target_port) {
            return Err(GraphError::UnknownPort {
                node: edge.target_node.clone(),
                port: edge.target_port.clone(),
            });
        }

        let ports = self
            .incoming
            .entry(edge.target_node.clone())
            .or_default();
        if ports.contains_key(&edge.target_port) {
            return Err(GraphError::PortConflict {
                node: edge.target_node.clone(),
                port: edge.target_port.clone(),
            });
        }
        ports.insert(
            edge.target_port.clone(),
            (edge.source_node.clone(), edge.source_port.clone()),
        );
        self.outgoing
            .entry(edge.source_node.clone())
            .or_default()
            .push(edge);
        Ok(())
    }

    pub fn disconnect(&mut self, edge: &Edge) -> Result<(), GraphError> {
        let ports = self
            .incoming
            .get_mut(&edge.target_node)
            .ok_or_else(|| GraphError::NodeNotFound(edge.target_node.clone()))?;
        match ports.get(&edge.target_port) {
            Some((source, source_port))
                if *source == edge.source_node && *source_port == edge.source_port =>
            {
                ports.remove(&edge.target_port);
            }
            _ => return Err(GraphError::NodeNotFound(edge.source_node.clone())),
        }
        if let Some(edges) = self.outgoing.get_mut(&edge.source_node) {
            edges.retain(|e| e != edge);
        }
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order, giving deterministic iteration.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bound input ports of a node, ordered by port name:
    /// (input port, source node, source port).
    pub fn predecessors(&self, id: &str) -> Vec<(String, NodeId, String)> {
        self.incoming
            .get(id)
            .map(|ports| {
                ports
                    .iter()
                    .map(|(port, (source, source_port))| {
                        (port.clone(), source.clone(), source_port.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct downstream neighbors of a node, in connection order.
    pub fn successors(&self, id: &str) -> Vec<NodeId> {
        let mut seen = Vec::new();
        if let Some(edges) = self.outgoing.get(id) {
            for edge in edges {
                if !seen.contains(&edge.target_node) {
                    seen.push(edge.target_node.clone());
                }
            }
        }
        seen
    }

    /// Outgoing edges of a node, one entry per connection (fan-out included).
    pub fn outgoing_edges(&self, id: &str) -> &[Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of incoming edges, used by the scheduler for in-degree counts.
    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map(BTreeMap::len).unwrap_or(0)
    }

    /// Replace a node's parameters, e.g. after an editor update.
    pub fn set_params(
        &mut self,
        id: &str,
        params: BTreeMap<String, ParamValue>,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.params = params;
        Ok(())
    }
}
