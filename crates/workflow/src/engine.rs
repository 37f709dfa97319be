//! Workflow engine — runs one turn of a thread end to end.
//!
//! ```text
//! agent ──no tools──▶ end
//!   │
//!   └─tools─▶ tool_executor ──grade──▶ generate ─▶ end
//!                               │
//!                               └──▶ rewrite ─▶ agent
//! ```
//!
//! The conversation is loaded from the checkpoint store at the start of a
//! turn and written back when the turn ends, whether it succeeded or not.

use crate::graph::{Graph, GraphBuilder, GraphError, Target};
use crate::nodes::{
    AgentNode, GenerateNode, GradeRouter, ROUTE_END, ROUTE_GENERATE, ROUTE_REWRITE, ROUTE_TOOLS,
    RewriteNode, ToolsCondition, ToolsNode,
};
use crate::state::{NodeId, TurnState};
use chrono::Utc;
use docpilot_agent::prompts::{self, SupportDomain};
use docpilot_agent::{
    AnswerGenerator, NodeModel, QueryRewriter, ReasoningAgent, RelevanceGrader, ToolExecutor,
};
use docpilot_config::AppConfig;
use docpilot_core::checkpoint::CheckpointStore;
use docpilot_core::error::{Error, Result};
use docpilot_core::event::{DomainEvent, EventBus};
use docpilot_core::message::{ConversationState, Message, ThreadId};
use docpilot_core::provider::Provider;
use docpilot_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// The five node implementations a workflow is assembled from.
pub struct WorkflowNodes {
    pub agent: ReasoningAgent,
    pub executor: ToolExecutor,
    pub grader: RelevanceGrader,
    pub rewriter: QueryRewriter,
    pub generator: AnswerGenerator,
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub thread_id: ThreadId,

    /// The final assistant message
    pub answer: Message,

    /// Everything appended this turn, starting with the user's message
    pub new_messages: Vec<Message>,

    /// Nodes visited, in order
    pub path: Vec<NodeId>,

    pub rewrites: u32,
}

pub struct WorkflowEngine {
    graph: Graph,
    store: Arc<dyn CheckpointStore>,
    event_bus: Arc<EventBus>,
}

impl WorkflowEngine {
    /// Wire the nodes into the support graph.
    pub fn new(
        nodes: WorkflowNodes,
        max_rewrites: u32,
        store: Arc<dyn CheckpointStore>,
        event_bus: Arc<EventBus>,
    ) -> std::result::Result<Self, GraphError> {
        let grade = GradeRouter::new(nodes.grader, max_rewrites).with_event_bus(event_bus.clone());

        let graph = GraphBuilder::new()
            .node(Arc::new(AgentNode(nodes.agent)))
            .node(Arc::new(ToolsNode(nodes.executor)))
            .node(Arc::new(RewriteNode(nodes.rewriter)))
            .node(Arc::new(GenerateNode(nodes.generator)))
            .entry(NodeId::Agent)
            // each pass is agent, tool_executor, then rewrite or generate
            .max_steps(3 * (max_rewrites as usize + 1))
            .conditional_edge(
                NodeId::Agent,
                Arc::new(ToolsCondition),
                [
                    (ROUTE_TOOLS, Target::Node(NodeId::Tools)),
                    (ROUTE_END, Target::End),
                ],
            )
            .conditional_edge(
                NodeId::Tools,
                Arc::new(grade),
                [
                    (ROUTE_GENERATE, Target::Node(NodeId::Generate)),
                    (ROUTE_REWRITE, Target::Node(NodeId::Rewrite)),
                ],
            )
            .edge(NodeId::Rewrite, Target::Node(NodeId::Agent))
            .edge(NodeId::Generate, Target::End)
            .compile()?;

        Ok(Self {
            graph,
            store,
            event_bus,
        })
    }

    /// Build every node from configuration around one shared provider and
    /// tool registry.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn CheckpointStore>,
        event_bus: Arc<EventBus>,
    ) -> std::result::Result<Self, GraphError> {
        let workflow = &config.workflow;
        let model = |name: &Option<String>| {
            NodeModel::new(provider.clone(), config.model_for(name))
                .with_temperature(config.default_temperature)
                .with_max_tokens(config.default_max_tokens)
        };

        let domain = SupportDomain::from(&config.assistant);
        let system_prompt = config
            .assistant
            .system_prompt_override
            .clone()
            .unwrap_or_else(|| prompts::system_prompt(&domain));

        let nodes = WorkflowNodes {
            agent: ReasoningAgent::new(model(&workflow.agent_model), tools.clone(), system_prompt)
                .with_event_bus(event_bus.clone()),
            executor: ToolExecutor::new(tools)
                .with_timeout(Duration::from_secs(workflow.tool_timeout_secs))
                .with_retry_attempts(workflow.tool_retry_attempts)
                .with_event_bus(event_bus.clone()),
            grader: RelevanceGrader::new(model(&workflow.grader_model)),
            rewriter: QueryRewriter::new(model(&workflow.rewriter_model)),
            generator: AnswerGenerator::new(model(&workflow.generator_model), domain)
                .with_event_bus(event_bus.clone()),
        };

        Self::new(nodes, workflow.max_rewrites, store, event_bus)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Load a thread's conversation, or an empty one for a new thread.
    pub async fn history(&self, thread_id: &ThreadId) -> Result<ConversationState> {
        Ok(self
            .store
            .get(thread_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(thread_id.clone())))
    }

    /// Run one turn: append the user's message, drive the graph to the end
    /// state and checkpoint the result.
    ///
    /// On a fatal node error the conversation up to that point is still
    /// checkpointed before the error is returned.
    pub async fn run_turn(&self, thread_id: &ThreadId, user_text: &str) -> Result<TurnOutcome> {
        let conversation = self.history(thread_id).await?;
        let mut turn = TurnState::begin(conversation, user_text);

        info!(thread_id = %thread_id, history = turn.conversation.len() - 1, "Turn started");

        let result = self.graph.run(&mut turn, Some(&self.event_bus)).await;
        let saved = self.store.put(thread_id, &turn.conversation).await;

        if let Err(e) = result {
            error!(thread_id = %thread_id, error = %e, path = ?turn.path, "Turn failed");
            self.event_bus.publish(DomainEvent::TurnFailed {
                thread_id: thread_id.to_string(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            if let Err(save_err) = saved {
                error!(thread_id = %thread_id, error = %save_err, "Checkpoint after failure also failed");
            }
            return Err(e);
        }
        saved?;

        let answer = turn
            .conversation
            .last()
            .cloned()
            .ok_or_else(|| Error::Internal("turn ended with an empty conversation".into()))?;

        self.event_bus.publish(DomainEvent::TurnCompleted {
            thread_id: thread_id.to_string(),
            rewrites: turn.rewrites,
            steps: turn.path.len(),
            timestamp: Utc::now(),
        });
        info!(
            thread_id = %thread_id,
            steps = turn.path.len(),
            rewrites = turn.rewrites,
            "Turn completed"
        );

        Ok(TurnOutcome {
            thread_id: thread_id.clone(),
            answer,
            new_messages: turn.new_messages().to_vec(),
            path: turn.path,
            rewrites: turn.rewrites,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docpilot_config::AssistantConfig;
    use docpilot_core::error::{ProviderError, ToolError};
    use docpilot_core::message::{MessageToolCall, Role};
    use docpilot_core::provider::{ProviderRequest, ProviderResponse};
    use docpilot_core::tool::{Tool, ToolOutput};
    use docpilot_memory::InMemoryCheckpointStore;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses; fails once the script runs out.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Message>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Message>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let message = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "scripted".into(),
            })
        }
    }

    struct Docs(&'static str);

    #[async_trait]
    impl Tool for Docs {
        fn name(&self) -> &str {
            "technical_docs_retriever"
        }
        fn description(&self) -> &str {
            "Search internal documents"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(self.0))
        }
    }

    fn tool_request(id: &str) -> Message {
        let mut message = Message::assistant("");
        message.tool_calls = vec![MessageToolCall {
            id: id.into(),
            name: "technical_docs_retriever".into(),
            arguments: r#"{"query":"AT+PP xDot"}"#.into(),
        }];
        message
    }

    fn engine(
        provider: Arc<ScriptedProvider>,
        docs: &'static str,
        max_rewrites: u32,
    ) -> (WorkflowEngine, Arc<InMemoryCheckpointStore>) {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Docs(docs)));
        let tools = Arc::new(registry);
        let model = || NodeModel::new(provider.clone(), "gpt-4o");
        let store = Arc::new(InMemoryCheckpointStore::new());

        let nodes = WorkflowNodes {
            agent: ReasoningAgent::new(model(), tools.clone(), "support rules"),
            executor: ToolExecutor::new(tools),
            grader: RelevanceGrader::new(model()),
            rewriter: QueryRewriter::new(model()),
            generator: AnswerGenerator::new(model(), SupportDomain::from(&AssistantConfig::default())),
        };
        let engine = WorkflowEngine::new(nodes, max_rewrites, store.clone(), Arc::new(EventBus::default()))
            .unwrap();
        (engine, store)
    }

    #[tokio::test]
    async fn direct_answer_ends_the_turn() {
        let provider = ScriptedProvider::new(vec![Message::assistant("Hello! Ask me about Multitech gear.")]);
        let (engine, store) = engine(provider.clone(), "unused", 3);
        let thread = ThreadId::from("t1");

        let outcome = engine.run_turn(&thread, "hi").await.unwrap();
        assert_eq!(outcome.path, vec![NodeId::Agent]);
        assert_eq!(outcome.answer.content, "Hello! Ask me about Multitech gear.");
        assert_eq!(outcome.new_messages.len(), 2);

        let saved = store.get(&thread).await.unwrap().unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.messages()[0].role, Role::System);
    }

    #[tokio::test]
    async fn relevant_context_goes_to_generate() {
        let provider = ScriptedProvider::new(vec![
            tool_request("c1"),
            Message::assistant(r#"{"binary_score":"yes"}"#),
            Message::assistant("From internal documents (xdot-at.md): send AT+PP=2."),
        ]);
        let (engine, _) = engine(provider.clone(), "Source: xdot-at.md\nSend AT+PP=2 then AT&W.", 3);

        let outcome = engine
            .run_turn(&ThreadId::from("t1"), "How do I set AT+PP on an xDot?")
            .await
            .unwrap();
        assert_eq!(outcome.path, vec![NodeId::Agent, NodeId::Tools, NodeId::Generate]);
        assert_eq!(outcome.rewrites, 0);
        assert!(outcome.answer.content.contains("xdot-at.md"));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn rewrite_limit_forces_generate() {
        let provider = ScriptedProvider::new(vec![
            tool_request("c1"),
            Message::assistant("Which AT command configures the xDot port?"),
            tool_request("c2"),
            Message::assistant("I don't know."),
        ]);
        let (engine, _) = engine(provider.clone(), "Nothing here.", 1);

        let outcome = engine
            .run_turn(&ThreadId::from("t1"), "How do I set AT+PP on an xDot?")
            .await
            .unwrap();
        assert_eq!(
            outcome.path,
            vec![
                NodeId::Agent,
                NodeId::Tools,
                NodeId::Rewrite,
                NodeId::Agent,
                NodeId::Tools,
                NodeId::Generate
            ]
        );
        assert_eq!(outcome.rewrites, 1);
        assert_eq!(outcome.answer.content, "I don't know.");
        // agent, rewriter, agent, generator; no grading calls
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn failed_turn_is_still_checkpointed() {
        let provider = ScriptedProvider::new(vec![]);
        let (engine, store) = engine(provider, "unused", 3);
        let thread = ThreadId::from("t1");

        let err = engine.run_turn(&thread, "hello?").await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));

        let saved = store.get(&thread).await.unwrap().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved.last().unwrap().content, "hello?");
    }

    #[tokio::test]
    async fn second_turn_sees_first() {
        let provider = ScriptedProvider::new(vec![
            Message::assistant("Use the MTCDT web UI."),
            Message::assistant("The MTCDTIP uses the same web UI."),
        ]);
        let (engine, _) = engine(provider.clone(), "unused", 3);
        let thread = ThreadId::from("t1");

        engine.run_turn(&thread, "How do I configure an MTCDT?").await.unwrap();
        engine
            .run_turn(&thread, "what about the IP version of that device")
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        let second: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            second,
            vec![
                "support rules",
                "How do I configure an MTCDT?",
                "Use the MTCDT web UI.",
                "what about the IP version of that device"
            ]
        );
    }
}
