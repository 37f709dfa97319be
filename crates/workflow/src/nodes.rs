//! Graph adapters for the agent crate's nodes, plus the two routing
//! functions: "did the agent ask for tools" and "was the context relevant".

use crate::graph::{Node, Router};
use crate::state::{NodeId, TurnState};
use async_trait::async_trait;
use chrono::Utc;
use docpilot_agent::context::{latest_tool_results, usable_context};
use docpilot_agent::{
    AnswerGenerator, GradeDecision, QueryRewriter, ReasoningAgent, RelevanceGrader, ToolExecutor,
};
use docpilot_core::error::Result;
use docpilot_core::event::{DomainEvent, EventBus};
use std::sync::Arc;
use tracing::{info, warn};

pub const ROUTE_TOOLS: &str = "tools";
pub const ROUTE_END: &str = "end";
pub const ROUTE_GENERATE: &str = "generate";
pub const ROUTE_REWRITE: &str = "rewrite";

pub struct AgentNode(pub ReasoningAgent);

#[async_trait]
impl Node for AgentNode {
    fn id(&self) -> NodeId {
        NodeId::Agent
    }

    async fn execute(&self, turn: &mut TurnState) -> Result<()> {
        let active = turn.last_rewrite.clone();
        self.0.run(&mut turn.conversation, active.as_deref()).await?;
        Ok(())
    }
}

pub struct ToolsNode(pub ToolExecutor);

#[async_trait]
impl Node for ToolsNode {
    fn id(&self) -> NodeId {
        NodeId::Tools
    }

    async fn execute(&self, turn: &mut TurnState) -> Result<()> {
        self.0.run(&mut turn.conversation).await?;
        Ok(())
    }
}

pub struct RewriteNode(pub QueryRewriter);

#[async_trait]
impl Node for RewriteNode {
    fn id(&self) -> NodeId {
        NodeId::Rewrite
    }

    async fn execute(&self, turn: &mut TurnState) -> Result<()> {
        let original = turn.original_question.clone();
        let previous = turn.last_rewrite.clone();
        let rewritten = self
            .0
            .run(&mut turn.conversation, &original, previous.as_deref())
            .await?;
        turn.record_rewrite(&rewritten.content);
        Ok(())
    }
}

pub struct GenerateNode(pub AnswerGenerator);

#[async_trait]
impl Node for GenerateNode {
    fn id(&self) -> NodeId {
        NodeId::Generate
    }

    async fn execute(&self, turn: &mut TurnState) -> Result<()> {
        let question = turn.original_question.content.clone();
        let start = turn.turn_start();
        self.0.run(&mut turn.conversation, &question, start).await?;
        Ok(())
    }
}

/// Routes the agent's output: tool requests go to the executor, anything
/// else ends the turn.
pub struct ToolsCondition;

#[async_trait]
impl Router for ToolsCondition {
    fn name(&self) -> &str {
        "tools_condition"
    }

    async fn route(&self, turn: &TurnState) -> Result<&'static str> {
        match turn.conversation.last() {
            Some(last) if last.requests_tools() => Ok(ROUTE_TOOLS),
            _ => Ok(ROUTE_END),
        }
    }
}

/// Grades the latest tool results against the active question.
///
/// Once the turn has used up its rewrites, a not-relevant grade is sent to
/// the generator instead so the turn still ends with an answer.
pub struct GradeRouter {
    grader: RelevanceGrader,
    max_rewrites: u32,
    event_bus: Option<Arc<EventBus>>,
}

impl GradeRouter {
    pub fn new(grader: RelevanceGrader, max_rewrites: u32) -> Self {
        Self {
            grader,
            max_rewrites,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }
}

#[async_trait]
impl Router for GradeRouter {
    fn name(&self) -> &str {
        "grade_documents"
    }

    async fn route(&self, turn: &TurnState) -> Result<&'static str> {
        let context = usable_context(&latest_tool_results(&turn.conversation));
        let outcome = self
            .grader
            .grade(&turn.active_question, context.as_deref())
            .await?;

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::GradeComputed {
                thread_id: turn.conversation.thread_id.to_string(),
                relevant: outcome.decision.is_relevant(),
                model_consulted: outcome.model_consulted,
                timestamp: Utc::now(),
            });
        }

        info!(
            thread_id = %turn.conversation.thread_id,
            decision = outcome.decision.route_label(),
            model_consulted = outcome.model_consulted,
            rewrites = turn.rewrites,
            "Context graded"
        );

        match outcome.decision {
            GradeDecision::Relevant => Ok(ROUTE_GENERATE),
            GradeDecision::NotRelevant if turn.rewrites >= self.max_rewrites => {
                warn!(
                    thread_id = %turn.conversation.thread_id,
                    max_rewrites = self.max_rewrites,
                    "Rewrite limit reached; answering with the context at hand"
                );
                Ok(ROUTE_GENERATE)
            }
            GradeDecision::NotRelevant => Ok(ROUTE_REWRITE),
        }
    }
}
