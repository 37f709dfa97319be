//! The workflow nodes of the support assistant.
//!
//! Each node reads the conversation state, talks to the model (or the
//! tools) and appends its own messages:
//!
//! 1. **Reasoning agent** answers directly or requests tool calls
//! 2. **Tool executor** runs the requested calls and appends the results
//! 3. **Relevance grader** decides whether the retrieved context answers the question
//! 4. **Query rewriter** reformulates a question whose retrieval missed
//! 5. **Answer generator** writes the final answer from the context
//!
//! Routing between the nodes lives in `docpilot-workflow`.

pub mod context;
pub mod executor;
pub mod generator;
pub mod grader;
pub mod model;
pub mod prompts;
pub mod reasoning;
pub mod rewriter;

#[cfg(test)]
mod test_helpers;

pub use executor::ToolExecutor;
pub use generator::AnswerGenerator;
pub use grader::{GradeDecision, GradeOutcome, GradeParseError, RelevanceGrader, parse_grade};
pub use model::NodeModel;
pub use prompts::SupportDomain;
pub use reasoning::ReasoningAgent;
pub use rewriter::QueryRewriter;
