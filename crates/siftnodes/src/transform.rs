use async_trait::async_trait;
use siftcore::{
    Artifact, ComputeContext, ComputeOutput, NodeError, NodeType, ParamValue, TableData,
};

fn require_table<'a>(ctx: &'a ComputeContext, port: &str) -> Result<&'a TableData, NodeError> {
    ctx.require_input(port)?
        .as_table()
        .ok_or_else(|| NodeError::InvalidInputType {
            field: port.to_string(),
            expected: "table".to_string(),
            actual: "other".to_string(),
        })
}

/// Multiply numeric cells by a constant factor.
pub struct ScaleNode;

#[async_trait]
impl NodeType for ScaleNode {
    fn node_type(&self) -> &str {
        "transform.scale"
    }

    fn required_inputs(&self) -> &[&str] {
        &["table"]
    }

    fn outputs(&self) -> &[&str] {
        &["table"]
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
        let input = require_table(&ctx, "table")?;
        let factor = ctx
            .param_or("factor", ParamValue::Float(1.0))
            .as_f64()
            .ok_or_else(|| NodeError::InvalidParam {
                param: "factor".to_string(),
                reason: "expected a number".to_string(),
            })?;
        let column = ctx.param("column").and_then(|v| v.as_str().map(String::from));
        let column_idx = match &column {
            Some(name) => Some(input.column_index(name).ok_or_else(|| {
                NodeError::ExecutionFailed(format!("No such column: {name}"))
            })?),
            None => None,
        };

        let mut out = TableData::new(input.columns.clone());
        for row in &input.rows {
            let scaled = row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let applies = column_idx.map_or(true, |idx| idx == i);
                    match cell.as_f64() {
                        Some(n) if applies => serde_json::json!(n * factor),
                        _ => cell.clone(),
                    }
                })
                .collect();
            out.rows.push(scaled);
        }
        Ok(ComputeOutput::new().with_output("table", Artifact::Table(out)))
    }
}

/// Keep only the named columns, in the requested order.
pub struct SelectColumnsNode;

#[async_trait]
impl NodeType for SelectColumnsNode {
    fn node_type(&self) -> &str {
        "transform.select"
    }

    fn required_inputs(&self) -> &[&str] {
        &["table"]
    }

    fn outputs(&self) -> &[&str] {
        &["table"]
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
        let input = require_table(&ctx, "table")?;
        let wanted = ctx
            .require_param("columns")?
            .as_list()
            .ok_or_else(|| NodeError::InvalidParam {
                param: "columns".to_string(),
                reason: "expected a list of column names".to_string(),
            })?;

        let mut indices = Vec::with_capacity(wanted.len());
        let mut columns = Vec::with_capacity(wanted.len());
        for value in wanted {
            let name = value.as_str().ok_or_else(|| NodeError::InvalidParam {
                param: "columns".to_string(),
                reason: "column names must be strings".to_string(),
            })?;
            let idx = input
                .column_index(name)
                .ok_or_else(|| NodeError::ExecutionFailed(format!("No such column: {name}")))?;
            indices.push(idx);
            columns.push(name.to_string());
        }

        let mut out = TableData::new(columns);
        for row in &input.rows {
            // Ragged rows pad with null rather than panic.
            out.rows.push(
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(serde_json::Value::Null))
                    .collect(),
            );
        }
        Ok(ComputeOutput::new().with_output("table", Artifact::Table(out)))
    }
}

/// Keep the first `count` rows.
pub struct HeadNode;

#[async_trait]
impl NodeType for HeadNode {
    fn node_type(&self) -> &str {
        "transform.head"
    }

    fn required_inputs(&self) -> &[&str] {
        &["table"]
    }

    fn outputs(&self) -> &[&str] {
        &["table"]
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<ComputeOutput, NodeError> {
        let input = require_table(&ctx, "table")?;
        let count = ctx
            .param_or("count", ParamValue::Int(10))
            .as_i64()
            .filter(|n| *n >= 0)
            .ok_or_else(|| NodeError::InvalidParam {
                param: "count".to_string(),
                reason: "expected a non-negative integer".to_string(),
            })? as usize;

        let mut out = TableData::new(input.columns.clone());
        out.rows = input.rows.iter().take(count).cloned().collect();
        Ok(ComputeOutput::new().with_output("table", Artifact::Table(out)))
    }
}
