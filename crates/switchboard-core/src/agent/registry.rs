//! Agent registry
//!
//! Hand-off edges may form cycles (triage hands off to a specialist, the
//! specialist hands back), so the graph is built in two passes: `declare`
//! every agent and receive its `AgentId`, then wire edges by id. `build`
//! validates the whole graph before anything can observe it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::handoff::prompt_with_handoff_instructions;
use super::{Agent, AgentId, AgentSpec};
use crate::error::{Error, Result};
use crate::tools::ToolRegistry;

/// Read-only agent graph shared by every session
#[derive(Debug)]
pub struct AgentRegistry {
    agents: Vec<Arc<Agent>>,
    by_name: HashMap<String, AgentId>,
    initial: AgentId,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    pub fn by_id(&self, id: AgentId) -> Option<&Arc<Agent>> {
        self.agents.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<Agent>> {
        self.by_name.get(name).and_then(|id| self.by_id(*id))
    }

    /// Entry-point agent for new sessions
    pub fn initial_agent(&self) -> &Arc<Agent> {
        &self.agents[self.initial.0]
    }

    pub fn handoff_targets(&self, id: AgentId) -> impl Iterator<Item = &Arc<Agent>> {
        self.by_id(id)
            .into_iter()
            .flat_map(|agent| agent.handoffs.iter())
            .filter_map(|target| self.by_id(*target))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.agents.iter()
    }
}

/// Two-pass builder for `AgentRegistry`
#[derive(Debug, Default)]
pub struct AgentRegistryBuilder {
    specs: Vec<AgentSpec>,
    edges: Vec<Vec<AgentId>>,
    initial: Option<AgentId>,
    unknown_sources: Vec<AgentId>,
}

impl AgentRegistryBuilder {
    /// Pass 1: declare an agent without edges.
    pub fn declare(&mut self, spec: AgentSpec) -> AgentId {
        let id = AgentId(self.specs.len());
        self.specs.push(spec);
        self.edges.push(Vec::new());
        id
    }

    /// Pass 2: set the hand-off targets of `from`, in priority order.
    pub fn handoffs(&mut self, from: AgentId, targets: &[AgentId]) -> &mut Self {
        match self.edges.get_mut(from.0) {
            Some(edges) => *edges = targets.to_vec(),
            None => self.unknown_sources.push(from),
        }
        self
    }

    pub fn initial(&mut self, id: AgentId) -> &mut Self {
        self.initial = Some(id);
        self
    }

    /// Validate and freeze the graph.
    pub fn build(self, tools: &ToolRegistry) -> Result<AgentRegistry> {
        let initial = self
            .initial
            .ok_or_else(|| Error::Registry("no initial agent set".into()))?;
        if let Some(from) = self.unknown_sources.first() {
            return Err(Error::Registry(format!("hand-offs set on undeclared {}", from)));
        }
        if initial.0 >= self.specs.len() {
            return Err(Error::Registry(format!("initial {} was never declared", initial)));
        }

        let mut by_name = HashMap::with_capacity(self.specs.len());
        for (index, spec) in self.specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(Error::Registry(format!("agent#{} has an empty name", index)));
            }
            if by_name.insert(spec.name.clone(), AgentId(index)).is_some() {
                return Err(Error::Registry(format!("duplicate agent name '{}'", spec.name)));
            }
            if let Some(missing) = spec.tools.iter().find(|t| !tools.contains(t)) {
                return Err(Error::Registry(format!(
                    "agent '{}' references unknown tool '{}'",
                    spec.name, missing
                )));
            }
        }

        for (index, targets) in self.edges.iter().enumerate() {
            let from = &self.specs[index].name;
            let mut tool_names: HashSet<String> = self.specs[index].tools.iter().cloned().collect();
            for target in targets {
                let target_spec = self.specs.get(target.0).ok_or_else(|| {
                    Error::Registry(format!(
                        "agent '{}' hands off to undeclared {}",
                        from, target
                    ))
                })?;
                let name = super::handoff_tool_name(&target_spec.name);
                if !tool_names.insert(name.clone()) {
                    return Err(Error::Registry(format!(
                        "agent '{}' exposes tool name '{}' more than once",
                        from, name
                    )));
                }
            }
        }

        let agents = self
            .specs
            .into_iter()
            .zip(self.edges)
            .enumerate()
            .map(|(index, (spec, handoffs))| {
                Arc::new(Agent {
                    id: AgentId(index),
                    name: spec.name,
                    instructions: prompt_with_handoff_instructions(&spec.instructions),
                    tools: spec.tools,
                    handoffs,
                    handoff_description: spec.handoff_description,
                    model: spec.model,
                })
            })
            .collect();

        Ok(AgentRegistry {
            agents,
            by_name,
            initial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> ToolRegistry {
        ToolRegistry::with_builtin_tools()
    }

    #[test]
    fn test_cyclic_graph_builds() {
        let mut builder = AgentRegistry::builder();
        let hub = builder.declare(AgentSpec::new("Hub", "route"));
        let spoke = builder.declare(AgentSpec::new("Spoke", "work").with_tools(["calc_sum"]));
        builder
            .handoffs(hub, &[spoke])
            .handoffs(spoke, &[hub])
            .initial(hub);

        let registry = builder.build(&tools()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.initial_agent().name, "Hub");
        assert_eq!(registry.by_name("Spoke").unwrap().id, spoke);

        let back: Vec<_> = registry.handoff_targets(spoke).map(|a| a.name.as_str()).collect();
        assert_eq!(back, vec!["Hub"]);
        assert!(registry.by_id(hub).unwrap().instructions.ends_with("route"));
    }

    #[test]
    fn test_missing_initial_is_rejected() {
        let mut builder = AgentRegistry::builder();
        builder.declare(AgentSpec::new("Solo", "x"));
        let err = builder.build(&tools()).unwrap_err();
        assert!(matches!(err, Error::Registry(msg) if msg.contains("initial")));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut builder = AgentRegistry::builder();
        let a = builder.declare(AgentSpec::new("Twin", "x"));
        builder.declare(AgentSpec::new("Twin", "y"));
        builder.initial(a);
        assert!(matches!(
            builder.build(&tools()),
            Err(Error::Registry(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let mut other = AgentRegistry::builder();
        other.declare(AgentSpec::new("A", "x"));
        other.declare(AgentSpec::new("B", "x"));
        let foreign = other.declare(AgentSpec::new("C", "x"));

        let mut builder = AgentRegistry::builder();
        let a = builder.declare(AgentSpec::new("A", "x"));
        builder.handoffs(a, &[foreign]).initial(a);
        assert!(matches!(
            builder.build(&tools()),
            Err(Error::Registry(msg)) if msg.contains("undeclared")
        ));
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let mut builder = AgentRegistry::builder();
        let a = builder.declare(AgentSpec::new("A", "x").with_tools(["launch_rockets"]));
        builder.initial(a);
        assert!(matches!(
            builder.build(&tools()),
            Err(Error::Registry(msg)) if msg.contains("launch_rockets")
        ));
    }

    #[test]
    fn test_colliding_handoff_names_are_rejected() {
        let mut builder = AgentRegistry::builder();
        let a = builder.declare(AgentSpec::new("A", "x"));
        let b = builder.declare(AgentSpec::new("Math Agent", "x"));
        let c = builder.declare(AgentSpec::new("Math-Agent", "x"));
        builder.handoffs(a, &[b, c]).initial(a);
        assert!(matches!(
            builder.build(&tools()),
            Err(Error::Registry(msg)) if msg.contains("transfer_to_math_agent")
        ));
    }
}
