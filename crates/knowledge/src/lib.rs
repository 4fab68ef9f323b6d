//! Conversational retrieval-augmented answering.
//!
//! Provides the search index abstraction and the chat pipeline that turns a
//! conversation into a grounded answer.

pub mod rag;
pub mod search;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use rag::{ChatAnswer, ChatChunk, ChatPipeline, ChatStream, QueryRewrite, Retrieval, Synthesis};
pub use search::{HttpSearchIndex, SearchIndex, SearchRequest};
pub use types::{EvidenceDocument, HistoryMessage, PipelineContext, DEFAULT_TOP};
