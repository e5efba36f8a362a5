//! Built-in tools
//!
//! - calc_sum: Add two integers
//! - get_time: Current UTC date and time

pub mod calc_sum;
pub mod get_time;

use std::sync::Arc;

pub use calc_sum::CalcSumTool;
pub use get_time::GetTimeTool;

use super::registry::Tool;

pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(CalcSumTool), Arc::new(GetTimeTool)]
}
