//! Node/edge graph and the loop that drives it.
//!
//! Nodes and edges live in a `petgraph` [`DiGraph`] with a terminal `End`
//! vertex. Every node has exactly one outgoing edge definition: either an
//! unconditional target or a router that inspects the turn and returns a
//! branch label. Compilation checks the wiring before any turn runs.

use crate::state::{NodeId, TurnState};
use async_trait::async_trait;
use chrono::Utc;
use docpilot_core::error::{Error, Result};
use docpilot_core::event::{DomainEvent, EventBus};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A workflow step: reads the turn and appends messages.
#[async_trait]
pub trait Node: Send + Sync {
    fn id(&self) -> NodeId;

    async fn execute(&self, turn: &mut TurnState) -> Result<()>;
}

/// Decides which branch a conditional edge takes.
#[async_trait]
pub trait Router: Send + Sync {
    /// Routing function name, for logs.
    fn name(&self) -> &str;

    async fn route(&self, turn: &TurnState) -> Result<&'static str>;
}

/// Where an edge leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    End,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Node(id) => write!(f, "{id}"),
            Target::End => f.write_str("end"),
        }
    }
}

/// Edge weight: which router outcome selects the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeCondition {
    Always,
    On(&'static str),
}

enum Vertex {
    Step(Arc<dyn Node>),
    End,
}

impl Vertex {
    fn label(&self) -> String {
        match self {
            Vertex::Step(node) => node.id().to_string(),
            Vertex::End => "end".into(),
        }
    }
}

/// An edge as declared on the builder, before it is resolved to indices.
enum EdgeSpec {
    Always(Target),
    Conditional {
        router: Arc<dyn Router>,
        branches: HashMap<&'static str, Target>,
    },
}

/// Wiring mistakes caught at compile time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("No entry node set")]
    NoEntry,

    #[error("Entry node '{0}' is not registered")]
    UnknownEntry(NodeId),

    #[error("Node '{0}' registered twice")]
    DuplicateNode(NodeId),

    #[error("Edge declared from unknown node '{0}'")]
    UnknownSource(NodeId),

    #[error("Edge from '{from}' targets unregistered node '{to}'")]
    UnknownTarget { from: NodeId, to: NodeId },

    #[error("Node '{0}' has more than one outgoing edge definition")]
    DuplicateEdge(NodeId),

    #[error("Node '{0}' has no outgoing edge")]
    MissingEdge(NodeId),

    #[error("Conditional edge from '{0}' has no branches")]
    EmptyBranches(NodeId),
}

/// Fluent builder for a [`Graph`].
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<Arc<dyn Node>>,
    edges: Vec<(NodeId, EdgeSpec)>,
    entry: Option<NodeId>,
    max_steps: Option<usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: Arc<dyn Node>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn entry(mut self, id: NodeId) -> Self {
        self.entry = Some(id);
        self
    }

    /// Upper bound on node executions per turn.
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn edge(mut self, from: NodeId, to: Target) -> Self {
        self.edges.push((from, EdgeSpec::Always(to)));
        self
    }

    pub fn conditional_edge(
        mut self,
        from: NodeId,
        router: Arc<dyn Router>,
        branches: impl IntoIterator<Item = (&'static str, Target)>,
    ) -> Self {
        self.edges.push((
            from,
            EdgeSpec::Conditional {
                router,
                branches: branches.into_iter().collect(),
            },
        ));
        self
    }

    /// Validate the wiring and produce a runnable graph.
    pub fn compile(self) -> std::result::Result<Graph, GraphError> {
        let entry = self.entry.ok_or(GraphError::NoEntry)?;

        let mut graph: DiGraph<Vertex, EdgeCondition> = DiGraph::new();
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();
        for node in self.nodes {
            let id = node.id();
            if indices.contains_key(&id) {
                return Err(GraphError::DuplicateNode(id));
            }
            let index = graph.add_node(Vertex::Step(node));
            indices.insert(id, index);
        }
        let end = graph.add_node(Vertex::End);

        let entry_index = *indices.get(&entry).ok_or(GraphError::UnknownEntry(entry))?;

        let mut routers: HashMap<NodeIndex, Arc<dyn Router>> = HashMap::new();
        for (from, edge) in self.edges {
            let from_index = *indices.get(&from).ok_or(GraphError::UnknownSource(from))?;
            if graph
                .edges_directed(from_index, Direction::Outgoing)
                .next()
                .is_some()
            {
                return Err(GraphError::DuplicateEdge(from));
            }

            let resolve = |target: Target| match target {
                Target::End => Ok(end),
                Target::Node(to) => indices
                    .get(&to)
                    .copied()
                    .ok_or(GraphError::UnknownTarget { from, to }),
            };

            match edge {
                EdgeSpec::Always(target) => {
                    let to = resolve(target)?;
                    graph.add_edge(from_index, to, EdgeCondition::Always);
                }
                EdgeSpec::Conditional { router, branches } => {
                    if branches.is_empty() {
                        return Err(GraphError::EmptyBranches(from));
                    }
                    let mut resolved = Vec::with_capacity(branches.len());
                    for (label, target) in branches {
                        resolved.push((label, resolve(target)?));
                    }
                    for (label, to) in resolved {
                        graph.add_edge(from_index, to, EdgeCondition::On(label));
                    }
                    routers.insert(from_index, router);
                }
            }
        }

        let unwired = graph.node_indices().find(|index| {
            matches!(graph[*index], Vertex::Step(_))
                && graph
                    .edges_directed(*index, Direction::Outgoing)
                    .next()
                    .is_none()
        });
        if let Some(index) = unwired
            && let Vertex::Step(node) = &graph[index]
        {
            return Err(GraphError::MissingEdge(node.id()));
        }

        Ok(Graph {
            graph,
            routers,
            entry: entry_index,
            max_steps: self.max_steps.unwrap_or(50),
        })
    }
}

/// A compiled workflow graph.
pub struct Graph {
    graph: DiGraph<Vertex, EdgeCondition>,
    routers: HashMap<NodeIndex, Arc<dyn Router>>,
    entry: NodeIndex,
    max_steps: usize,
}

impl Graph {
    /// Drive the turn from the entry node until an edge leads to `End`.
    ///
    /// Visited nodes are recorded on `turn.path` as they run, so the path is
    /// accurate even when a node fails.
    pub async fn run(&self, turn: &mut TurnState, events: Option<&EventBus>) -> Result<()> {
        let thread_id = turn.conversation.thread_id.to_string();
        let mut current = self.entry;

        for step in 0..self.max_steps {
            let Some(Vertex::Step(node)) = self.graph.node_weight(current) else {
                return Err(Error::Internal(format!("vertex {current:?} is not a node")));
            };
            let id = node.id();

            debug!(node = %id, step, "Executing node");
            if let Some(bus) = events {
                bus.publish(DomainEvent::NodeEntered {
                    thread_id: thread_id.clone(),
                    node: id.to_string(),
                    timestamp: Utc::now(),
                });
            }
            turn.path.push(id);

            let before = turn.conversation.len();
            node.execute(turn).await?;
            if let Some(bus) = events {
                for message in &turn.conversation.messages()[before.min(turn.conversation.len())..] {
                    bus.publish(DomainEvent::MessageAppended {
                        thread_id: thread_id.clone(),
                        node: id.to_string(),
                        role: format!("{:?}", message.role).to_lowercase(),
                        content: message.content.clone(),
                        timestamp: Utc::now(),
                    });
                }
            }

            let next = self.resolve_next(current, id, turn).await?;
            let (to, done) = match self.graph.node_weight(next) {
                Some(vertex) => (vertex.label(), matches!(vertex, Vertex::End)),
                None => return Err(Error::Internal(format!("edge from '{id}' leads nowhere"))),
            };
            debug!(from = %id, to = %to, "Routed");
            if let Some(bus) = events {
                bus.publish(DomainEvent::Routed {
                    thread_id: thread_id.clone(),
                    from: id.to_string(),
                    to,
                    timestamp: Utc::now(),
                });
            }

            if done {
                return Ok(());
            }
            current = next;
        }

        Err(Error::Internal(format!(
            "workflow exceeded {} steps",
            self.max_steps
        )))
    }

    /// Pick the outgoing edge matching the router's branch, or the
    /// unconditional edge when the node has no router.
    async fn resolve_next(
        &self,
        current: NodeIndex,
        id: NodeId,
        turn: &TurnState,
    ) -> Result<NodeIndex> {
        let branch = match self.routers.get(&current) {
            Some(router) => Some((router.name(), router.route(turn).await?)),
            None => None,
        };

        for edge in self.graph.edges_directed(current, Direction::Outgoing) {
            match (*edge.weight(), branch) {
                (EdgeCondition::On(label), Some((_, chosen))) if label == chosen => {
                    return Ok(edge.target());
                }
                (EdgeCondition::Always, None) => return Ok(edge.target()),
                _ => {}
            }
        }

        Err(Error::Internal(match branch {
            Some((router, label)) => {
                format!("router '{router}' returned unknown branch '{label}' from '{id}'")
            }
            None => format!("node '{id}' has no edge"),
        }))
    }
}
