//! Default agent graph: a triage agent that routes to math and time
//! specialists, both of which can hand back.

use super::{AgentRegistry, AgentSpec};
use crate::error::Result;
use crate::tools::ToolRegistry;

pub const TRIAGE_AGENT: &str = "TriageAgent";
pub const MATH_AGENT: &str = "MathAgent";
pub const TIME_AGENT: &str = "TimeAgent";

const TRIAGE_INSTRUCTIONS: &str = "You are the coordinator. Work out what the user needs and decide how to answer:\n\
- If the user wants simple arithmetic, hand off to MathAgent\n\
- If the user wants to know the time, hand off to TimeAgent\n\
Answer directly when you can, but use a hand-off for anything about math or time.";

const MATH_INSTRUCTIONS: &str = "You only handle math requests and can use the `calc_sum` tool to add integers. \
Keep your answers concise and precise.";

const TIME_INSTRUCTIONS: &str =
    "You only handle time and time zone requests and can use the `get_time` tool to report the current time.";

/// Build the default graph. `model` overrides the engine default for every
/// agent when given.
pub fn default_registry(tools: &ToolRegistry, model: Option<&str>) -> Result<AgentRegistry> {
    let spec = |name: &str, instructions: &str| {
        let spec = AgentSpec::new(name, instructions);
        match model {
            Some(model) => spec.with_model(model),
            None => spec,
        }
    };

    let mut builder = AgentRegistry::builder();
    let triage = builder.declare(spec(TRIAGE_AGENT, TRIAGE_INSTRUCTIONS));
    let math = builder.declare(
        spec(MATH_AGENT, MATH_INSTRUCTIONS)
            .with_tools(["calc_sum"])
            .with_handoff_description("Handles arithmetic such as adding integers."),
    );
    let time = builder.declare(
        spec(TIME_AGENT, TIME_INSTRUCTIONS)
            .with_tools(["get_time"])
            .with_handoff_description("Reports the current date and time."),
    );

    builder
        .handoffs(triage, &[math, time])
        .handoffs(math, &[triage])
        .handoffs(time, &[triage])
        .initial(triage);

    builder.build(tools)
}
