//! Prompt templates for every model-backed node.
//!
//! The product domain (vendor name and product families) is data, so the
//! same templates serve any product line configured in `[assistant]`.

use docpilot_config::AssistantConfig;

/// The product domain the assistant supports.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportDomain {
    pub product_name: String,
    pub product_families: Vec<String>,
}

impl SupportDomain {
    pub fn new(product_name: impl Into<String>, product_families: Vec<String>) -> Self {
        Self {
            product_name: product_name.into(),
            product_families,
        }
    }

    fn families(&self) -> String {
        if self.product_families.is_empty() {
            format!("{} products", self.product_name)
        } else {
            self.product_families.join(", ")
        }
    }
}

impl From<&AssistantConfig> for SupportDomain {
    fn from(config: &AssistantConfig) -> Self {
        Self::new(&config.product_name, config.product_families.clone())
    }
}

/// System prompt for the reasoning agent.
pub fn system_prompt(domain: &SupportDomain) -> String {
    let name = &domain.product_name;
    format!(
        "You are an expert {name} technical support assistant for question-answering tasks.\n\
         \n\
         1. Prefer the internal document retriever tool. Use only the {name} internal documents to answer when they suffice.\n\
         2. If the internal context is insufficient, use the web search tool. Keep every web search about {name} products, \
            for example {families}.\n\
         3. Do not mix information from different sources. State clearly whether the answer comes from internal documents or from web search.\n\
         4. Match keywords from the question against exact words in the documents, or close variants of them \
            (for example the keyword 'at+pp' matches 'at+pp' and 'at+ppxxx').\n\
         5. Provide complete, step-by-step instructions. Include links, screenshots or examples exactly as shown.\n\
         6. Cite the source (document name or URL).\n\
         7. If no answer is found, say: \"I don't know.\"",
        families = domain.families(),
    )
}

/// Strict relevance grading prompt.
pub fn grade_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a strict grader that evaluates whether a retrieved document is relevant to a user's question.\n\
         \n\
         Return a binary score:\n\
         - \"yes\" if the document clearly contains keywords, phrases or exact instructions that directly answer or explain the question.\n\
         - \"no\" if the document does not mention any of the keywords from the question or does not directly relate to the user's intent.\n\
         \n\
         Do not infer or assume relevance from vague similarities. Only return \"yes\" if the answer is explicitly addressed in the document.\n\
         \n\
         ---\n\
         \n\
         User Question:\n{question}\n\
         \n\
         Retrieved Document:\n{context}\n\
         \n\
         Does the document directly answer or relate to the question? Reply with \"yes\" or \"no\"."
    )
}

/// Query reformulation prompt.
///
/// `previous` is the last reformulation that failed to retrieve anything
/// relevant, if there was one.
pub fn rewrite_prompt(question: &str, previous: Option<&str>) -> String {
    let mut prompt = format!(
        "Look at the input and try to reason about the underlying semantic intent / meaning.\n\
         \n\
         Here is the initial question:\n-------\n{question}\n-------\n"
    );
    if let Some(previous) = previous {
        prompt.push_str(&format!(
            "\nThis reformulation did not find relevant material, so phrase it differently:\n-------\n{previous}\n-------\n"
        ));
    }
    prompt.push_str("Formulate an improved question. Reply with the question only.");
    prompt
}

/// Final answer prompt.
pub fn generate_prompt(
    domain: &SupportDomain,
    question: &str,
    context: &str,
    history: &str,
) -> String {
    let name = &domain.product_name;
    let mut prompt = format!(
        "You are a helpful {name} support assistant for question-answering tasks. Follow these instructions:\n\
         1. Use only the retrieved context below to answer the question.\n\
         2. Do not mix information from different sources. State clearly whether the answer is based on internal documents or external web results.\n\
         3. These product families are distinct: {families}. Never substitute one product's instructions for another's \
            (a Dot module is not a Conduit gateway, and a model is not its IP-rated variant).\n\
         4. Provide complete, step-by-step instructions when applicable, and include any links, screenshots or examples exactly as they appear in the context.\n\
         5. Always cite the source of the information (document name or URL).\n\
         6. If the context does not contain the answer, respond with: \"I don't know.\"\n",
        families = domain.families(),
    );
    if !history.is_empty() {
        prompt.push_str(&format!("\nEarlier in this conversation:\n{history}\n"));
    }
    prompt.push_str(&format!(
        "\nQuestion: {question}\nContext: {context}\nAnswer:"
    ));
    prompt
}
