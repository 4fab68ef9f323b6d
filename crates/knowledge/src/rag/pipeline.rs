//! Pipeline orchestration.
//!
//! A run rewrites the latest question into a search query, retrieves
//! evidence for it and asks the model for an answer grounded in that
//! evidence, either in one completion or as a stream of deltas.

use crate::rag::types::{ChatAnswer, ChatChunk, ChatStream};
use crate::search::SearchIndex;
use crate::types::{EvidenceDocument, HistoryMessage, PipelineContext};
use chatread_core::AppResult;
use chatread_llm::{LlmClient, LlmStream, TokenMeter};
use chatread_prompt::PromptLibrary;
use futures::StreamExt;
use std::sync::Arc;

/// Retrieve-then-read chat pipeline.
///
/// Holds no per-request state; one instance can serve concurrent runs.
#[derive(Clone)]
pub struct ChatPipeline {
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) search: Arc<dyn SearchIndex>,
    pub(crate) meter: Arc<dyn TokenMeter>,
    pub(crate) prompts: PromptLibrary,
    pub(crate) model: String,
}

impl std::fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchIndex>,
        meter: Arc<dyn TokenMeter>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            search,
            meter,
            prompts: PromptLibrary::default(),
            model: model.into(),
        }
    }

    /// Replace the built-in prompts.
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer the last turn of `history` with a single completion.
    #[tracing::instrument(name = "chat_pipeline", skip_all, fields(model = %self.model, turns = history.len(), stream = false))]
    pub async fn run(
        &self,
        history: &[HistoryMessage],
        context: &PipelineContext,
    ) -> AppResult<ChatAnswer> {
        let rewrite = self.rewrite_query(history).await?;
        let retrieval = self.retrieve(&rewrite.query, context).await?;
        let synthesis = self.synthesize(history, &rewrite, &retrieval, context)?;

        let request = self.answer_request(&synthesis);
        let response = self.llm.complete(&request).await?;

        tracing::info!(
            documents = retrieval.documents.len(),
            completion_tokens = response.usage.completion_tokens,
            "Answer generated"
        );

        Ok(ChatAnswer {
            answer: response.content,
            data_points: synthesis.data_points,
            thoughts: synthesis.thoughts,
        })
    }

    /// Answer the last turn of `history` as a stream of answer deltas.
    ///
    /// All three stages complete before this returns. Every completion delta
    /// becomes one chunk, empty ones included. The first chunk carries the
    /// data points and thoughts; later chunks carry answer text only. When
    /// the model produces no deltas the stream still yields one chunk with
    /// the data points and thoughts.
    #[tracing::instrument(name = "chat_pipeline", skip_all, fields(model = %self.model, turns = history.len(), stream = true))]
    pub async fn run_stream(
        &self,
        history: &[HistoryMessage],
        context: &PipelineContext,
    ) -> AppResult<ChatStream> {
        let rewrite = self.rewrite_query(history).await?;
        let retrieval = self.retrieve(&rewrite.query, context).await?;
        let synthesis = self.synthesize(history, &rewrite, &retrieval, context)?;

        let request = self.answer_request(&synthesis).with_streaming();
        let deltas = self.llm.stream(&request).await?;

        tracing::info!(documents = retrieval.documents.len(), "Answer stream opened");

        Ok(chat_chunks(deltas, synthesis.data_points, synthesis.thoughts))
    }
}

struct ChunkState {
    deltas: LlmStream,
    metadata: Option<(Vec<EvidenceDocument>, String)>,
    finished: bool,
}

/// Turn completion deltas into chat chunks, leading with the metadata.
fn chat_chunks(
    deltas: LlmStream,
    data_points: Vec<EvidenceDocument>,
    thoughts: String,
) -> ChatStream {
    let state = ChunkState {
        deltas,
        metadata: Some((data_points, thoughts)),
        finished: false,
    };

    let chunks = futures::stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        match state.deltas.next().await {
            Some(Ok(delta)) => {
                let chunk = match state.metadata.take() {
                    Some((data_points, thoughts)) => {
                        ChatChunk::first(delta.content, data_points, thoughts)
                    }
                    None => ChatChunk::delta(delta.content),
                };
                Some((Ok(chunk), state))
            }
            Some(Err(e)) => {
                state.finished = true;
                Some((Err(e), state))
            }
            None => {
                state.finished = true;
                match state.metadata.take() {
                    Some((data_points, thoughts)) => {
                        let chunk = ChatChunk::first(String::new(), data_points, thoughts);
                        Some((Ok(chunk), state))
                    }
                    None => None,
                }
            }
        }
    });

    Box::pin(chunks)
}
