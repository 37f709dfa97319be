//! # docpilot core
//!
//! Domain types, traits, and error definitions for the docpilot support
//! assistant. This crate has no framework dependencies: it defines the model
//! every other crate implements against.
//!
//! Each external collaborator (language model, tool, retriever, checkpoint
//! store) is a trait here, with implementations in their own crates.

pub mod checkpoint;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod retriever;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use checkpoint::CheckpointStore;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationState, Message, MessageToolCall, Role, ThreadId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use retriever::{Passage, Retriever};
pub use tool::{Tool, ToolCall, ToolOutput, ToolRegistry};

/// The descriptor of a registered tool as presented to the model.
pub type ToolDescriptor = ToolDefinition;
