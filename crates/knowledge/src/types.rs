//! Request-scoped data types for the chat pipeline.

use serde::{Deserialize, Serialize};

pub use chatread_prompt::HistoryMessage;

/// Number of documents retrieved when the caller does not say.
pub const DEFAULT_TOP: usize = 3;

/// A document returned by the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    /// Name cited verbatim by the answer, e.g. `benefits.pdf#page=2`
    pub identifier: String,

    /// Text supporting the answer
    pub excerpt: String,

    /// Relevance as reported by the index
    pub score: f32,
}

impl EvidenceDocument {
    pub fn new(identifier: impl Into<String>, excerpt: impl Into<String>, score: f32) -> Self {
        Self {
            identifier: identifier.into(),
            excerpt: excerpt.into(),
            score,
        }
    }

    /// Single-line `identifier: excerpt` rendering used as evidence.
    pub fn evidence_line(&self) -> String {
        format!("{}: {}", self.identifier, self.excerpt.replace(['\r', '\n'], " "))
    }
}

/// Caller options for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    /// Ask the model to end its answer with follow-up questions
    #[serde(default)]
    pub suggest_followup_questions: bool,

    /// Extra or replacement answer instructions; a `>>>` prefix appends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_override: Option<String>,

    /// Answer sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Number of documents to retrieve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,

    /// Document category left out of retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_category: Option<String>,
}

impl PipelineContext {
    pub fn top(&self) -> usize {
        self.top.unwrap_or(DEFAULT_TOP)
    }

    /// Search filter expression derived from the options, if any.
    pub fn search_filter(&self) -> Option<String> {
        self.exclude_category
            .as_deref()
            .map(|category| format!("category ne '{}'", category.replace('\'', "''")))
    }
}
