//! Current time tool

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::tools::registry::Tool;
use crate::tools::ToolResult;

pub struct GetTimeTool;

pub(crate) fn format_utc(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[async_trait]
impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Return the current date and time (UTC)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value) -> ToolResult {
        ToolResult::success(format_utc(Utc::now()))
    }
}
