use async_trait::async_trait;
use siftcore::{
    Artifact, ComputeContext, ComputeOutput, NodeError, NodeType, ParamValue, TableData,
};
use std::collections::BTreeMap;

/// Generate an integer sequence as a single-column table.
pub struct RangeSourceNode;

#[async_trait]
impl NodeType for RangeSourceNode {
    fn node_type(&self) -> &str {
        "source.range"
    }

    fn required_inputs(&self) -> &[&str] {
        &[]
    }

    fn outputs(&self) -> &[&str] {
        &["table"]
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
        let count = ctx
            .require_param("count")?
            .as_i64()
            .ok_or_else(|| NodeError::InvalidParam {
                param: "count".to_string(),
                reason: "expected an integer".to_string(),
            })?;
        if count < 0 {
            return Err(NodeError::InvalidParam {
                param: "count".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        let start = ctx.param_or("start", ParamValue::Int(0)).as_i64().unwrap_or(0);
        let step = ctx.param_or("step", ParamValue::Int(1)).as_i64().unwrap_or(1);

        let mut table = TableData::new(vec!["value".to_string()]);
        let mut value = start;
        for _ in 0..count {
            table.rows.push(vec![serde_json::json!(value)]);
            value += step;
        }
        Ok(ComputeOutput::new().with_output("table", Artifact::Table(table)))
    }
}

/// Emit a configured parameter as a metadata artifact.
pub struct ConstantNode;

#[async_trait]
impl NodeType for ConstantNode {
    fn node_type(&self) -> &str {
        "source.constant"
    }

    fn required_inputs(&self) -> &[&str] {
        &[]
    }

    fn outputs(&self) -> &[&str] {
        &["value"]
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
        let value = ctx.require_param("value")?;
        let mut map = BTreeMap::new();
        map.insert("value".to_string(), param_to_json(value));
        Ok(ComputeOutput::new().with_output("value", Artifact::Metadata(map)))
    }
}

/// Deterministic pseudo-random floats in [0, 1).
///
/// Seeded from the node's `seed` parameter, falling back to the workflow
/// seed, so identical configurations reproduce identical tables.
pub struct RandomSourceNode;

#[async_trait]
impl NodeType for RandomSourceNode {
    fn node_type(&self) -> &str {
        "source.random"
    }

    fn required_inputs(&self) -> &[&str] {
        &[]
    }

    fn outputs(&self) -> &[&str] {
        &["table"]
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
        let count = ctx
            .require_param("count")?
            .as_i64()
            .filter(|n| *n >= 0)
            .ok_or_else(|| NodeError::InvalidParam {
                param: "count".to_string(),
                reason: "expected a non-negative integer".to_string(),
            })?;
        let seed = ctx
            .param("seed")
            .and_then(ParamValue::as_i64)
            .or(ctx.seed)
            .unwrap_or(0);

        let mut table = TableData::new(vec!["value".to_string()]);
        // Numerical Recipes LCG; quality is irrelevant, determinism is not.
        let mut state = seed as u64 ^ 0x9e3779b97f4a7c15;
        for _ in 0..count {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            table.rows.push(vec![serde_json::json!(unit)]);
        }
        Ok(ComputeOutput::new().with_output("table", Artifact::Table(table)))
    }
}

pub(crate) fn param_to_json(value: &ParamValue) -> serde_json::Value {
    match value {
        ParamValue::Null => serde_json::Value::Null,
        ParamValue::Bool(b) => serde_json::json!(b),
        ParamValue::Int(n) => serde_json::json!(n),
        ParamValue::Float(n) => serde_json::json!(n),
        ParamValue::Str(s) => serde_json::json!(s),
        ParamValue::List(items) => {
            serde_json::Value::Array(items.iter().map(param_to_json).collect())
        }
    }
}
