//! Relevance grader — decides whether retrieved context answers the question.
//!
//! Two phases:
//! 1. a lexical pre-filter that rejects off-topic context without a model call
//! 2. strict model grading with a `{"binary_score": "yes" | "no"}` schema
//!
//! Anything other than a well-formed "yes" grades as not relevant.

use crate::model::NodeModel;
use crate::prompts;
use docpilot_core::error::ProviderError;
use docpilot_core::provider::ResponseFormat;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// The outcome of grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeDecision {
    Relevant,
    NotRelevant,
}

impl GradeDecision {
    /// The routing label used by the workflow.
    pub fn route_label(self) -> &'static str {
        match self {
            GradeDecision::Relevant => "generate",
            GradeDecision::NotRelevant => "rewrite",
        }
    }

    pub fn is_relevant(self) -> bool {
        self == GradeDecision::Relevant
    }
}

/// The structured grade output did not conform to the schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradeParseError {
    #[error("grade output is not JSON: {0}")]
    NotJson(String),

    #[error("grade output has no string 'binary_score'")]
    MissingScore,

    #[error("unexpected binary_score '{0}'")]
    UnexpectedScore(String),
}

#[derive(Deserialize)]
struct GradeOutput {
    binary_score: Option<serde_json::Value>,
}

/// Strictly parse the model's grade output.
pub fn parse_grade(raw: &str) -> Result<GradeDecision, GradeParseError> {
    let output: GradeOutput =
        serde_json::from_str(raw.trim()).map_err(|e| GradeParseError::NotJson(e.to_string()))?;
    let score = output
        .binary_score
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or(GradeParseError::MissingScore)?;

    match score.trim().to_lowercase().as_str() {
        "yes" => Ok(GradeDecision::Relevant),
        "no" => Ok(GradeDecision::NotRelevant),
        other => Err(GradeParseError::UnexpectedScore(other.to_string())),
    }
}

/// Words too common to say anything about topical overlap.
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "as", "be", "been", "but", "by", "can",
    "could", "did", "do", "does", "for", "from", "get", "had", "has", "have", "how", "i", "if",
    "in", "into", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our", "please",
    "should", "so", "some", "than", "that", "the", "their", "then", "there", "these", "this",
    "those", "to", "us", "was", "we", "were", "what", "when", "where", "which", "who", "why",
    "will", "with", "would", "you", "your",
];

/// Lowercase content tokens of a question.
///
/// Surrounding punctuation is trimmed (a `+` is kept, so `AT+PP` survives),
/// and stopwords and single characters are dropped. A question made only of
/// such words keeps all of its words instead.
pub fn question_tokens(question: &str) -> Vec<String> {
    let words: Vec<String> = question
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '+')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let content: Vec<String> = words
        .iter()
        .filter(|w| w.chars().count() >= 2 && !STOPWORDS.contains(&w.as_str()))
        .cloned()
        .collect();
    if content.is_empty() { words } else { content }
}

/// Whether any question token occurs as a substring of the context.
pub fn lexical_overlap(question: &str, context: &str) -> bool {
    let haystack = context.to_lowercase();
    question_tokens(question)
        .iter()
        .any(|token| haystack.contains(token.as_str()))
}

/// A grade plus whether the model had to be consulted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub decision: GradeDecision,
    pub model_consulted: bool,
}

pub struct RelevanceGrader {
    model: NodeModel,
}

impl RelevanceGrader {
    pub fn new(model: NodeModel) -> Self {
        Self { model }
    }

    fn schema() -> ResponseFormat {
        ResponseFormat {
            name: "grade".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "binary_score": {
                        "type": "string",
                        "enum": ["yes", "no"],
                        "description": "Relevance score: 'yes' or 'no'"
                    }
                },
                "required": ["binary_score"],
                "additionalProperties": false
            }),
        }
    }

    /// Grade `context` against `question`.
    ///
    /// `context` is `None` when the latest tool pass produced nothing usable
    /// (every call failed); that grades as not relevant without a model call.
    /// A model failure is returned as an error; a malformed grade is not.
    pub async fn grade(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<GradeOutcome, ProviderError> {
        let Some(context) = context else {
            info!("No usable tool output; grading as not relevant");
            return Ok(GradeOutcome {
                decision: GradeDecision::NotRelevant,
                model_consulted: false,
            });
        };

        if !lexical_overlap(question, context) {
            info!("Pre-check failed: no keyword match");
            return Ok(GradeOutcome {
                decision: GradeDecision::NotRelevant,
                model_consulted: false,
            });
        }

        let response = self
            .model
            .complete(
                vec![docpilot_core::message::Message::user(prompts::grade_prompt(
                    question, context,
                ))],
                Vec::new(),
                Some(Self::schema()),
            )
            .await?;

        let decision = parse_grade(&response.message.content).unwrap_or_else(|e| {
            warn!(error = %e, raw = %response.message.content, "Malformed grade; treating as not relevant");
            GradeDecision::NotRelevant
        });

        debug!(?decision, "Model grade");
        Ok(GradeOutcome {
            decision,
            model_consulted: true,
        })
    }
}
