//! Workflow engine — the node/edge graph that turns one user message into
//! one answer.
//!
//! A turn enters at the reasoning agent, optionally loops through tool
//! execution, relevance grading and query rewriting, and ends either with
//! the agent's direct answer or the generator's grounded one. The rewrite
//! loop is bounded by `workflow.max_rewrites`.

pub mod engine;
pub mod graph;
pub mod nodes;
pub mod state;

pub use engine::{TurnOutcome, WorkflowEngine, WorkflowNodes};
pub use graph::{Graph, GraphBuilder, GraphError, Node, Router, Target};
pub use state::{NodeId, TurnState};
