//! Integer addition tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolResult};

pub struct CalcSumTool;

#[derive(Deserialize)]
struct Params {
    a: i64,
    b: i64,
}

#[async_trait]
impl Tool for CalcSumTool {
    fn name(&self) -> &str {
        "calc_sum"
    }

    fn description(&self) -> &str {
        "Calculate the sum of two integers."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "integer",
                    "description": "First integer"
                },
                "b": {
                    "type": "integer",
                    "description": "Second integer"
                }
            },
            "required": ["a", "b"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match params.a.checked_add(params.b) {
            Some(sum) => ToolResult::success(sum.to_string()),
            None => ToolResult::error(format!("{} + {} overflows", params.a, params.b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sum() {
        let result = CalcSumTool.execute(json!({"a": 2, "b": 3})).await;
        assert_eq!(result, ToolResult::success("5"));

        let result = CalcSumTool.execute(json!({"a": -7, "b": 3})).await;
        assert_eq!(result.output, "-4");
    }

    #[tokio::test]
    async fn test_overflow_is_error() {
        let result = CalcSumTool.execute(json!({"a": i64::MAX, "b": 1})).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_non_integer_arguments_rejected() {
        let result = CalcSumTool.execute(json!({"a": "two", "b": 3})).await;
        assert!(result.is_error);
        assert!(result.output.contains("invalid_parameters"));
    }
}
