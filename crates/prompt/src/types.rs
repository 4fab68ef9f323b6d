//! Prompt types for chatread.

use chatread_llm::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::templates;

/// Sentinel prefix marking a prompt override as an append directive.
pub const APPEND_SENTINEL: &str = ">>>";

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Prompt identifier (e.g. "chat.answer")
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Template text; Handlebars syntax for "chat.answer"
    pub template: String,

    /// Demonstration messages, in conversation order
    #[serde(rename = "fewShots", default)]
    pub few_shots: Vec<ChatMessage>,
}

/// How a caller-supplied prompt override changes the answer system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromptOverride {
    /// Base template, nothing injected
    #[default]
    Default,
    /// Text appended to the base template's instructions
    Append(String),
    /// Text taking the injected-instructions slot verbatim
    Replace(String),
}

impl PromptOverride {
    /// Decide the override variant from the raw caller value.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Default,
            Some(text) => match text.strip_prefix(APPEND_SENTINEL) {
                Some(rest) => Self::Append(rest.to_string()),
                None => Self::Replace(text.to_string()),
            },
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Append(_) => "append",
            Self::Replace(_) => "replace",
        }
    }

    /// Value substituted for the injected-instructions placeholder.
    pub fn injected_text(&self) -> String {
        match self {
            Self::Default => String::new(),
            Self::Append(text) => format!("{}\n", text),
            Self::Replace(text) => text.clone(),
        }
    }
}

/// The complete set of prompts used by the chat pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptLibrary {
    /// System prompt of the query rewrite stage
    pub query_system: String,

    /// Few-shot demonstrations of the query rewrite stage
    pub query_few_shots: Vec<ChatMessage>,

    /// Handlebars template of the answer system prompt
    pub answer_template: String,

    /// Instructions injected when follow-up questions are requested
    pub follow_up_prompt: String,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            query_system: templates::QUERY_SYSTEM_PROMPT.to_string(),
            query_few_shots: templates::query_few_shots(),
            answer_template: templates::ANSWER_SYSTEM_TEMPLATE.to_string(),
            follow_up_prompt: templates::FOLLOW_UP_QUESTIONS_PROMPT.to_string(),
        }
    }
}
