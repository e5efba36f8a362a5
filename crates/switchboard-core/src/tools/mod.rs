//! Function tools agents may call
//!
//! Tools are side-effect free and registered once at startup.

pub mod implementations;
pub mod registry;

pub use implementations::{builtin_tools, CalcSumTool, GetTimeTool};
pub use registry::{parse_params, Tool, ToolRegistry, ToolResult};
