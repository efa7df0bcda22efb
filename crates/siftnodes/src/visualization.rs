use async_trait::async_trait;
use siftcore::{
    Artifact, CachePolicy, ComputeContext, ComputeOutput, NodeError, NodeType, ParamValue,
};

/// Render a bounded preview of a table for the editor canvas.
///
/// Declares `CachePolicy::Never`: the payload is presentation, not reusable
/// computation, so it is recomputed on every pass and never hits the cache.
pub struct PreviewNode;

#[async_trait]
impl NodeType for PreviewNode {
    fn node_type(&self) -> &str {
        "viz.preview"
    }

    fn required_inputs(&self) -> &[&str] {
        &["table"]
    }

    fn outputs(&self) -> &[&str] {
        &["figure"]
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Never
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
        let limit = ctx
            .param_or("limit", ParamValue::Int(20))
            .as_i64()
            .filter(|n| *n >= 0)
            .ok_or_else(|| NodeError::InvalidParam {
                param: "limit".to_string(),
                reason: "expected a non-negative integer".to_string(),
            })? as usize;

        let preview = serde_json::json!({
            "columns": table.columns,
            "rows": table.rows.iter().take(limit).collect::<Vec<_>>(),
            "truncated": table.row_count() > limit,
        });
        Ok(ComputeOutput::new().with_output("figure", Artifact::Visualization(preview)))
    }
}
