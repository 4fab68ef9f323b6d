//! Stage outputs and pipeline responses.

use crate::types::EvidenceDocument;
use chatread_core::AppResult;
use chatread_llm::ChatMessage;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Output of the query rewrite stage.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRewrite {
    /// Query sent to the search index
    pub query: String,

    /// Messages sent to the model to produce the query
    pub prompt: Vec<ChatMessage>,
}

/// Output of the retrieval stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    /// Query the documents were retrieved for
    pub query: String,

    /// Documents in index order
    pub documents: Vec<EvidenceDocument>,

    /// One `identifier: excerpt` line per document
    pub evidence: Vec<String>,
}

impl Retrieval {
    /// Evidence block placed after the sources header.
    pub fn evidence_block(&self) -> String {
        self.evidence.join("\n")
    }
}

/// Output of the answer synthesis stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Messages for the answer completion
    pub messages: Vec<ChatMessage>,

    /// Retrieved documents returned to the caller
    pub data_points: Vec<EvidenceDocument>,

    /// Operator-facing trace of the run
    pub thoughts: String,

    /// Answer sampling temperature
    pub temperature: f32,
}

/// Single-shot pipeline response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub data_points: Vec<EvidenceDocument>,
    pub thoughts: String,
}

/// One increment of a streamed pipeline response.
///
/// Only the first chunk of a stream carries `data_points` and `thoughts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub answer: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<Vec<EvidenceDocument>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
}

impl ChatChunk {
    /// Opening chunk carrying the evidence and trace.
    pub fn first(answer: String, data_points: Vec<EvidenceDocument>, thoughts: String) -> Self {
        Self {
            answer,
            data_points: Some(data_points),
            thoughts: Some(thoughts),
        }
    }

    /// Answer-text-only chunk.
    pub fn delta(answer: String) -> Self {
        Self {
            answer,
            data_points: None,
            thoughts: None,
        }
    }
}

/// Streamed pipeline response.
pub type ChatStream = Pin<Box<dyn Stream<Item = AppResult<ChatChunk>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_chunk_omits_metadata_in_json() {
        let json = serde_json::to_value(ChatChunk::delta("lo".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"answer": "lo"}));
    }

    #[test]
    fn test_first_chunk_json() {
        let chunk = ChatChunk::first(
            "Hel".to_string(),
            vec![EvidenceDocument::new("a.txt", "A\nB", 1.5)],
            "Searched for:\nq".to_string(),
        );
        let json = serde_json::to_value(chunk).unwrap();
        assert_eq!(
            json["data_points"][0],
            serde_json::json!({"identifier": "a.txt", "excerpt": "A\nB", "score": 1.5})
        );
        assert_eq!(json["thoughts"], "Searched for:\nq");
    }

    #[test]
    fn test_evidence_block_joins_lines() {
        let retrieval = Retrieval {
            query: "q".to_string(),
            documents: Vec::new(),
            evidence: vec!["a.txt: A".to_string(), "b.txt: B".to_string()],
        };
        assert_eq!(retrieval.evidence_block(), "a.txt: A\nb.txt: B");
    }
}
