use async_trait::async_trait;
use siftcore::{Artifact, ComputeContext, ComputeOutput, NodeError, NodeType};
use std::collections::BTreeMap;

/// Summary statistics for a table: shape plus min/max/mean per numeric
/// column.
pub struct SummaryNode;

#[async_trait]
impl NodeType for SummaryNode {
    fn node_type(&self) -> &str {
        "metrics.summary"
    }

    fn required_inputs(&self) -> &[&str] {
        &["table"]
    }

    fn outputs(&self) -> &[&str] {
        &["metrics"]
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
        let table = ctx
            .require_input("table")?
            .as_table()
            .ok_or_else(|| NodeError::InvalidInputType {
                field: "table".to_string(),
                expected: "table".to_string(),
                actual: "other".to_string(),
            })?;

        let mut metrics = BTreeMap::new();
        metrics.insert("row_count".to_string(), serde_json::json!(table.row_count()));
        metrics.insert(
            "column_count".to_string(),
            serde_json::json!(table.columns.len()),
        );

        let mut columns = BTreeMap::new();
        for (idx, name) in table.columns.iter().enumerate() {
            let values: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(|cell| cell.as_f64()))
                .collect();
            if values.is_empty() {
                continue;
            }
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            columns.insert(
                name.clone(),
                serde_json::json!({ "min": min, "max": max, "mean": mean }),
            );
        }
        metrics.insert("columns".to_string(), serde_json::json!(columns));

        Ok(ComputeOutput::new()
            .with_output("metrics", Artifact::Metadata(metrics))
            .with_metadata("rows_scanned", serde_json::json!(table.row_count())))
    }
}
