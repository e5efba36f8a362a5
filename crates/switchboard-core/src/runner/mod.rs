//! Conversation runner
//!
//! Drives one turn: holds the session, appends the user message, runs the
//! active agent through the completion engine and commits the engine's item
//! sequence together with the agent it finished on.
//!
//! A streamed turn commits only when the engine produced a full result and
//! the consumer is still attached. A consumer that goes away cancels the
//! engine run and the session keeps its previous state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentRegistry};
use crate::ai::types::ModelMessage;
use crate::engine::{CompletionEngine, EngineEvent, RunResult, StreamedRun};
use crate::error::{Error, Result};
use crate::session::{SessionStore, SessionTurn};

const TURN_CHANNEL_BUFFER: usize = 256;

/// Result of a non-streamed turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutput {
    pub response: String,
    /// Agent responsible for the next turn
    pub agent: String,
}

/// Item of a streamed turn. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Delta(String),
    Done { agent: String },
    Failed(String),
}

pub type TurnStream = ReceiverStream<TurnEvent>;

#[derive(Clone)]
pub struct ConversationRunner {
    store: SessionStore,
    agents: Arc<AgentRegistry>,
    engine: Arc<dyn CompletionEngine>,
}

impl ConversationRunner {
    pub fn new(
        store: SessionStore,
        agents: Arc<AgentRegistry>,
        engine: Arc<dyn CompletionEngine>,
    ) -> Self {
        Self {
            store,
            agents,
            engine,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    /// Create a session owned by the initial agent.
    pub fn create_session(&self) -> String {
        self.store.create(self.agents.initial_agent().id)
    }

    /// Run one turn to completion and commit it.
    pub async fn run_turn(&self, session_id: &str, message: &str) -> Result<TurnOutput> {
        let turn = self.store.lock(session_id).await?;
        let (agent, input) = self.prepare(&turn, message)?;
        debug!(session_id, agent = %agent.name, "Running turn");

        let result = self.engine.run(agent, input).await?;
        let agent = commit(&self.agents, turn, &result)?;

        Ok(TurnOutput {
            response: result.final_output,
            agent,
        })
    }

    /// Start a streamed turn. Fails before any output if the session is
    /// unknown; later failures arrive as `TurnEvent::Failed`.
    pub async fn run_turn_streamed(&self, session_id: &str, message: &str) -> Result<TurnStream> {
        let turn = self.store.lock(session_id).await?;
        let (agent, input) = self.prepare(&turn, message)?;
        debug!(session_id, agent = %agent.name, "Running streamed turn");

        let run = self.engine.run_streamed(agent, input);
        let (tx, rx) = mpsc::channel(TURN_CHANNEL_BUFFER);
        tokio::spawn(forward_stream(self.agents.clone(), turn, run, tx));

        Ok(ReceiverStream::new(rx))
    }

    fn prepare(&self, turn: &SessionTurn, message: &str) -> Result<(Arc<Agent>, Vec<ModelMessage>)> {
        let state = turn.state();
        let agent = self
            .agents
            .by_id(state.last_agent)
            .cloned()
            .ok_or_else(|| Error::UnknownAgent(state.last_agent.to_string()))?;

        let mut input = Vec::with_capacity(state.conversation_items.len() + 1);
        input.extend(state.conversation_items.iter().cloned());
        input.push(ModelMessage::user(message));
        Ok((agent, input))
    }
}

/// Resolve the engine's final agent and commit. Returns the agent's name.
fn commit(agents: &AgentRegistry, turn: SessionTurn, result: &RunResult) -> Result<String> {
    let agent = agents
        .by_name(&result.last_agent)
        .ok_or_else(|| Error::UnknownAgent(result.last_agent.clone()))?;
    let session_id = turn.session_id().to_string();

    turn.commit(result.items.clone(), agent.id)?;
    info!(
        session_id = %session_id,
        agent = %agent.name,
        items = result.items.len(),
        "Turn committed"
    );
    Ok(agent.name.clone())
}

async fn forward_stream(
    agents: Arc<AgentRegistry>,
    turn: SessionTurn,
    mut run: StreamedRun,
    tx: mpsc::Sender<TurnEvent>,
) {
    let session_id = turn.session_id().to_string();
    let mut delta_count = 0usize;

    loop {
        let event = tokio::select! {
            event = run.next_event() => event,
            _ = tx.closed() => {
                info!(session_id = %session_id, delta_count, "Client disconnected, abandoning turn");
                return;
            }
        };
        let Some(event) = event else { break };

        if let EngineEvent::TextDelta { delta } = event {
            if tx.send(TurnEvent::Delta(delta)).await.is_err() {
                info!(session_id = %session_id, delta_count, "Client disconnected, abandoning turn");
                return;
            }
            delta_count += 1;
        }
    }

    let outcome = match run.finish().await {
        Ok(result) if tx.is_closed() => {
            info!(
                session_id = %session_id,
                agent = %result.last_agent,
                "Client disconnected before commit, abandoning turn"
            );
            return;
        }
        Ok(result) => commit(&agents, turn, &result),
        Err(e) => Err(e),
    };

    let terminal = match outcome {
        Ok(agent) => {
            debug!(session_id = %session_id, delta_count, "Streamed turn complete");
            TurnEvent::Done { agent }
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Streamed turn failed");
            TurnEvent::Failed(e.to_string())
        }
    };
    let _ = tx.send(terminal).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::default_registry;
    use crate::ai::types::Role;
    use crate::engine::testing::ScriptedClient;
    use crate::engine::AgentEngine;
    use crate::session::SessionStoreConfig;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::time::Duration;

    /// Replies "echo: <message>" after `delay`, streaming word by word.
    struct EchoEngine {
        delay: Duration,
        final_agent: Option<String>,
        fail: bool,
    }

    impl EchoEngine {
        fn new() -> Self {
            Self {
                delay: Duration::ZERO,
                final_agent: None,
                fail: false,
            }
        }

        fn result(&self, agent: &Agent, mut input: Vec<ModelMessage>) -> RunResult {
            let reply = format!("echo: {}", input.last().map(|m| m.text()).unwrap_or_default());
            input.push(ModelMessage::assistant(reply.clone()));
            RunResult {
                final_output: reply,
                items: input,
                last_agent: self
                    .final_agent
                    .clone()
                    .unwrap_or_else(|| agent.name.clone()),
            }
        }
    }

    #[async_trait]
    impl CompletionEngine for EchoEngine {
        async fn run(&self, agent: Arc<Agent>, input: Vec<ModelMessage>) -> Result<RunResult> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::Engine("rate limited".into()));
            }
            Ok(self.result(&agent, input))
        }

        fn run_streamed(&self, agent: Arc<Agent>, input: Vec<ModelMessage>) -> StreamedRun {
            let result = self.result(&agent, input);
            let delay = self.delay;
            let fail = self.fail;
            StreamedRun::spawn(move |emitter| async move {
                for word in result.final_output.split_inclusive(' ') {
                    emitter.emit(EngineEvent::TextDelta {
                        delta: word.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                }
                if fail {
                    return Err(Error::Engine("stream dropped".into()));
                }
                Ok(result)
            })
        }
    }

    fn runner(engine: impl CompletionEngine + 'static) -> ConversationRunner {
        let tools = ToolRegistry::with_builtin_tools();
        let agents = Arc::new(default_registry(&tools, None).unwrap());
        ConversationRunner::new(
            SessionStore::new(SessionStoreConfig::default()),
            agents,
            Arc::new(engine),
        )
    }

    async fn drain(stream: TurnStream) -> Vec<TurnEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_turn_commits_engine_items_and_agent() {
        let runner = runner(EchoEngine {
            final_agent: Some("TimeAgent".into()),
            ..EchoEngine::new()
        });
        let id = runner.create_session();

        let output = runner.run_turn(&id, "hello").await.unwrap();
        assert_eq!(output.response, "echo: hello");
        assert_eq!(output.agent, "TimeAgent");

        let state = runner.store().get(&id).await.unwrap();
        assert_eq!(
            state.conversation_items,
            vec![ModelMessage::user("hello"), ModelMessage::assistant("echo: hello")]
        );
        assert_eq!(
            state.last_agent,
            runner.agents().by_name("TimeAgent").unwrap().id
        );
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_created() {
        let runner = runner(EchoEngine::new());
        assert!(matches!(
            runner.run_turn("nope", "hi").await,
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(
            runner.run_turn_streamed("nope", "hi").await,
            Err(Error::SessionNotFound(_))
        ));
        assert!(runner.store().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_final_agent_is_fatal() {
        let runner = runner(EchoEngine {
            final_agent: Some("GhostAgent".into()),
            ..EchoEngine::new()
        });
        let id = runner.create_session();

        let err = runner.run_turn(&id, "hi").await.unwrap_err();
        assert!(matches!(err, Error::UnknownAgent(name) if name == "GhostAgent"));

        let state = runner.store().get(&id).await.unwrap();
        assert!(state.conversation_items.is_empty());
        assert_eq!(state.last_agent, runner.agents().initial_agent().id);
    }

    #[tokio::test]
    async fn test_engine_failure_leaves_state_unchanged() {
        let runner = runner(EchoEngine {
            fail: true,
            ..EchoEngine::new()
        });
        let id = runner.create_session();

        assert!(runner.run_turn(&id, "hi").await.unwrap_err().is_engine_failure());
        assert!(runner
            .store()
            .get(&id)
            .await
            .unwrap()
            .conversation_items
            .is_empty());
    }

    #[tokio::test]
    async fn test_streamed_fragments_in_order_then_done() {
        let runner = runner(EchoEngine::new());
        let id = runner.create_session();

        let events = drain(runner.run_turn_streamed(&id, "one two three").await.unwrap()).await;
        assert_eq!(
            events,
            vec![
                TurnEvent::Delta("echo: ".into()),
                TurnEvent::Delta("one ".into()),
                TurnEvent::Delta("two ".into()),
                TurnEvent::Delta("three".into()),
                TurnEvent::Done {
                    agent: "TriageAgent".into()
                },
            ]
        );

        let state = runner.store().get(&id).await.unwrap();
        assert_eq!(state.conversation_items.len(), 2);
    }

    #[tokio::test]
    async fn test_streamed_failure_is_reported_without_commit() {
        let runner = runner(EchoEngine {
            fail: true,
            ..EchoEngine::new()
        });
        let id = runner.create_session();

        let events = drain(runner.run_turn_streamed(&id, "hi").await.unwrap()).await;
        assert!(matches!(events.last(), Some(TurnEvent::Failed(msg)) if msg.contains("stream dropped")));
        assert!(runner
            .store()
            .get(&id)
            .await
            .unwrap()
            .conversation_items
            .is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_abandons_turn() {
        let runner = runner(EchoEngine {
            delay: Duration::from_millis(30),
            ..EchoEngine::new()
        });
        let id = runner.create_session();

        let mut stream = runner
            .run_turn_streamed(&id, "a b c d e f")
            .await
            .unwrap();
        assert_eq!(stream.next().await, Some(TurnEvent::Delta("echo: ".into())));
        drop(stream);

        // get waits for the abandoned turn to release the session
        let state = tokio::time::timeout(Duration::from_secs(2), runner.store().get(&id))
            .await
            .unwrap()
            .unwrap();
        assert!(state.conversation_items.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_turns_are_serialized() {
        let runner = runner(EchoEngine {
            delay: Duration::from_millis(20),
            ..EchoEngine::new()
        });
        let id = runner.create_session();

        let (a, b) = tokio::join!(runner.run_turn(&id, "first"), runner.run_turn(&id, "second"));
        a.unwrap();
        b.unwrap();

        let items = runner.store().get(&id).await.unwrap().conversation_items;
        assert_eq!(items.len(), 4);
        let roles: Vec<_> = items.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_handoff_persists_across_turns() {
        let tools = Arc::new(ToolRegistry::with_builtin_tools());
        let agents = Arc::new(default_registry(&tools, None).unwrap());
        let client = Arc::new(ScriptedClient::new({
            let mut script = ScriptedClient::two_plus_three().into_script();
            script.push(crate::engine::testing::scripted::text("And 5 + 5 = 10"));
            script
        }));
        let engine = AgentEngine::new(client.clone(), tools, agents.clone());
        let runner = ConversationRunner::new(SessionStore::default(), agents.clone(), Arc::new(engine));
        let id = runner.create_session();

        let first = runner.run_turn(&id, "what is 2+3?").await.unwrap();
        assert!(first.response.contains('5'));
        assert_eq!(first.agent, "MathAgent");

        let state = runner.store().get(&id).await.unwrap();
        assert_eq!(state.last_agent, agents.by_name("MathAgent").unwrap().id);
        assert!(state.conversation_items.len() >= 2);

        // The second turn starts with MathAgent and the full history
        runner.run_turn(&id, "and 5+5?").await.unwrap();
        let requests = client.requests();
        let last = requests.last().unwrap();
        assert!(last.system_prompt.contains("calc_sum"));
        assert_eq!(last.messages.len(), state.conversation_items.len() + 1);
    }
}
