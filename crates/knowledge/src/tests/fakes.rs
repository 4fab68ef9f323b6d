//! In-memory collaborators for pipeline tests.

use crate::search::{SearchIndex, SearchRequest};
use crate::types::EvidenceDocument;
use chatread_core::{AppError, AppResult};
use chatread_llm::{
    ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
    TokenMeter,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Completion service replaying canned replies and recording requests.
#[derive(Default)]
pub struct FakeLlm {
    replies: Mutex<VecDeque<String>>,
    deltas: Vec<String>,
    fail: bool,
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl FakeLlm {
    /// Replies returned by `complete`, in call order.
    pub fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            ..Default::default()
        }
    }

    /// Every call is recorded, then fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Deltas produced by `stream`.
    pub fn with_deltas(mut self, deltas: &[&str]) -> Self {
        self.deltas = deltas.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(AppError::Llm("completion service unavailable".to_string()));
        }
        let content = self.replies.lock().unwrap().pop_front().unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(10, 5),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(AppError::Llm("completion service unavailable".to_string()));
        }
        let chunks: Vec<AppResult<LlmStreamChunk>> = self
            .deltas
            .iter()
            .map(|content| {
                Ok(LlmStreamChunk {
                    content: content.clone(),
                    model: request.model.clone(),
                    done: false,
                    usage: None,
                })
            })
            .collect();

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Search index returning fixed documents, or failing.
#[derive(Default)]
pub struct FakeSearch {
    documents: Vec<EvidenceDocument>,
    fail: bool,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl FakeSearch {
    pub fn with_documents(documents: Vec<EvidenceDocument>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchIndex for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<EvidenceDocument>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(AppError::Search("index unavailable".to_string()));
        }
        Ok(self.documents.iter().take(request.top).cloned().collect())
    }
}

/// One token per whitespace-separated word.
pub struct WordMeter {
    limits: HashMap<String, usize>,
}

impl WordMeter {
    pub fn new(model: &str, limit: usize) -> Self {
        Self {
            limits: HashMap::from([(model.to_string(), limit)]),
        }
    }
}

impl TokenMeter for WordMeter {
    fn limit_for(&self, model: &str) -> AppResult<usize> {
        self.limits
            .get(model)
            .copied()
            .ok_or_else(|| AppError::UnknownModel(model.to_string()))
    }

    fn cost_of(&self, message: &ChatMessage) -> usize {
        message.content.split_whitespace().count()
    }
}
