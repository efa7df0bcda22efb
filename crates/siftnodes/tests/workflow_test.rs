use siftcore::{
    Artifact, ComputeContext, Edge, NodeError, NodeSpec, NodeStatus, NodeType, WorkflowGraph,
};
use siftnodes::{register_all, RandomSourceNode, SelectColumnsNode};
use siftruntime::{CacheConfig, Engine, EngineConfig, NodeRegistry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tempfile::TempDir;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

fn engine() -> (Engine, TempDir) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    let config = EngineConfig {
        cache: CacheConfig {
            dir: dir.path().to_path_buf(),
            ..CacheConfig::default()
        },
        ..EngineConfig::default()
    };
    (Engine::new(Arc::new(registry), config), dir)
}

fn ctx(params: Vec<(&str, siftcore::ParamValue)>) -> ComputeContext {
    ComputeContext {
        node_id: "test".to_string(),
        params: params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
        inputs: HashMap::new(),
        seed: None,
        cancellation: Default::default(),
    }
}

/// range -> scale -> summary, with a preview hanging off the scaled table.
fn pipeline(factor: f64) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new();
    graph
        .add_node(
            NodeSpec::new("range", "source.range")
                .with_param("count", 5i64)
                .with_outputs(&["table"]),
        )
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("scale", "transform.scale")
                .with_param("factor", factor)
                .with_inputs(&["table"])
                .with_outputs(&["table"]),
        )
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("summary", "metrics.summary")
                .with_inputs(&["table"])
                .with_outputs(&["metrics"]),
        )
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("preview", "viz.preview")
                .with_param("limit", 3i64)
                .with_inputs(&["table"])
                .with_outputs(&["figure"]),
        )
        .unwrap();
    graph
        .connect(Edge::new("range", "table", "scale", "table"))
        .unwrap();
    graph
        .connect(Edge::new("scale", "table", "summary", "table"))
        .unwrap();
    graph
        .connect(Edge::new("scale", "table", "preview", "table"))
        .unwrap();
    graph
}

fn table_column(results: &HashMap<String, siftcore::ExecutionResult>, id: &str) -> Vec<f64> {
    results[id]
        .output("table")
        .and_then(|a| a.as_table())
        .expect("table output")
        .rows
        .iter()
        .map(|row| row[0].as_f64().unwrap())
        .collect()
}

#[tokio::test]
async fn pipeline_computes_expected_values() {
    let (engine, _dir) = engine();
    let results = engine.run(&pipeline(2.0), None).await.unwrap();

    assert!(results.values().all(|r| r.status == NodeStatus::Success));
    assert_eq!(table_column(&results, "range"), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(table_column(&results, "scale"), vec![0.0, 2.0, 4.0, 6.0, 8.0]);

    let metrics = results["summary"]
        .output("metrics")
        .and_then(|a| a.as_metadata())
        .expect("metadata output");
    assert_eq!(metrics["row_count"], serde_json::json!(5));
    assert_eq!(metrics["columns"]["value"]["min"], serde_json::json!(0.0));
    assert_eq!(metrics["columns"]["value"]["max"], serde_json::json!(8.0));
    assert_eq!(metrics["columns"]["value"]["mean"], serde_json::json!(4.0));

    let figure = match results["preview"].output("figure") {
        Some(artifact) => match artifact.as_ref() {
            Artifact::Visualization(v) => v,
            other => panic!("expected visualization, got {}", other.kind()),
        },
        None => panic!("figure output missing"),
    };
    assert_eq!(figure["rows"].as_array().unwrap().len(), 3);
    assert_eq!(figure["truncated"], serde_json::json!(true));
}

#[tokio::test]
async fn factor_change_reuses_the_source() {
    let (engine, _dir) = engine();
    engine.run(&pipeline(2.0), None).await.unwrap();

    let changed = ["scale".to_string()];
    let results = engine
        .run(&pipeline(3.0), Some(&changed))
        .await
        .unwrap();

    assert_eq!(results["range"].status, NodeStatus::SkippedCached);
    assert_eq!(results["scale"].status, NodeStatus::Success);
    assert_eq!(results["summary"].status, NodeStatus::Success);
    assert_eq!(results["preview"].status, NodeStatus::Success);
    assert_eq!(table_column(&results, "scale"), vec![0.0, 3.0, 6.0, 9.0, 12.0]);
}

#[tokio::test]
async fn preview_is_never_served_from_cache() {
    let (engine, _dir) = engine();
    engine.run(&pipeline(2.0), None).await.unwrap();

    // Identical full rerun: cacheable nodes hit, the preview recomputes.
    let results = engine.run(&pipeline(2.0), None).await.unwrap();
    assert_eq!(results["range"].status, NodeStatus::SkippedCached);
    assert_eq!(results["scale"].status, NodeStatus::SkippedCached);
    assert_eq!(results["summary"].status, NodeStatus::SkippedCached);
    assert_eq!(results["preview"].status, NodeStatus::Success);
}

#[tokio::test]
async fn select_and_head_shape_the_table() {
    let (engine, _dir) = engine();
    let mut graph = WorkflowGraph::new();
    graph
        .add_node(
            NodeSpec::new("range", "source.range")
                .with_param("count", 10i64)
                .with_param("start", 100i64)
                .with_outputs(&["table"]),
        )
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("head", "transform.head")
                .with_param("count", 4i64)
                .with_inputs(&["table"])
                .with_outputs(&["table"]),
        )
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("select", "transform.select")
                .with_param("columns", vec!["value"])
                .with_inputs(&["table"])
                .with_outputs(&["table"]),
        )
        .unwrap();
    graph
        .connect(Edge::new("range", "table", "head", "table"))
        .unwrap();
    graph
        .connect(Edge::new("head", "table", "select", "table"))
        .unwrap();

    let results = engine.run(&graph, None).await.unwrap();
    assert_eq!(
        table_column(&results, "select"),
        vec![100.0, 101.0, 102.0, 103.0]
    );
}

#[tokio::test]
async fn select_rejects_unknown_column() {
    let node = SelectColumnsNode;
    let mut context = ctx(vec![("columns", vec!["bogus"].into())]);
    let table = siftcore::TableData::new(vec!["value".to_string()]);
    context.inputs.insert(
        "table".to_string(),
        Arc::new(Artifact::Table(table)),
    );

    let err = node.compute(context).await.unwrap_err();
    assert!(matches!(err, NodeError::ExecutionFailed(_)));
    assert!(err.to_string().contains("bogus"));
}

#[tokio::test]
async fn select_pads_ragged_rows_with_null() {
    let node = SelectColumnsNode;
    let mut context = ctx(vec![("columns", vec!["a", "b"].into())]);
    let mut table = siftcore::TableData::new(vec!["a".to_string(), "b".to_string()]);
    table.rows.push(vec![serde_json::json!(1), serde_json::json!(2)]);
    table.rows.push(vec![serde_json::json!(3)]);
    context
        .inputs
        .insert("table".to_string(), Arc::new(Artifact::Table(table)));

    let output = node.compute(context).await.unwrap();
    let out = output.outputs["table"].as_table().unwrap();
    assert_eq!(out.rows[0], vec![serde_json::json!(1), serde_json::json!(2)]);
    assert_eq!(out.rows[1], vec![serde_json::json!(3), serde_json::Value::Null]);
}

#[tokio::test]
async fn random_source_is_deterministic_per_seed() {
    let node = RandomSourceNode;
    let params = |seed: i64| {
        ctx(vec![
            ("count", siftcore::ParamValue::Int(4)),
            ("seed", siftcore::ParamValue::Int(seed)),
        ])
    };

    let rows = |output: siftcore::ComputeOutput| -> Vec<f64> {
        match &output.outputs["table"] {
            Artifact::Table(t) => t.rows.iter().map(|r| r[0].as_f64().unwrap()).collect(),
            other => panic!("expected table, got {}", other.kind()),
        }
    };

    let a = rows(node.compute(params(7)).await.unwrap());
    let b = rows(node.compute(params(7)).await.unwrap());
    let c = rows(node.compute(params(8)).await.unwrap());
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
}

#[tokio::test]
async fn range_rejects_negative_count() {
    let (engine, _dir) = engine();
    let mut graph = WorkflowGraph::new();
    graph
        .add_node(
            NodeSpec::new("range", "source.range")
                .with_param("count", -1i64)
                .with_outputs(&["table"]),
        )
        .unwrap();

    let results = engine.run(&graph, None).await.unwrap();
    assert_eq!(results["range"].status, NodeStatus::Error);
    assert!(results["range"]
        .error
        .as_deref()
        .unwrap()
        .contains("count"));
}
