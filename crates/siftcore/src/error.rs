use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("No result recorded for node: {0}")]
    ResultNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors rejected at the graph boundary, before any run is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Node '{node}' does not declare port '{port}'")]
    UnknownPort { node: String, port: String },

    #[error("Input port '{port}' on node '{node}' already has an incoming edge")]
    PortConflict { node: String, port: String },

    #[error("Workflow contains a cycle involving nodes: {}", nodes.join(", "))]
    Cycle { nodes: Vec<String> },
}

/// Errors produced by a single node's execution. These are contained to the
/// node and its downstream closure, never to the run as a whole.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParam { param: String, reason: String },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Cancelled")]
    Cancelled,
}
