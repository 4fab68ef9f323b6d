//! Query rewrite stage.

use crate::rag::pipeline::ChatPipeline;
use crate::rag::types::QueryRewrite;
use crate::types::HistoryMessage;
use chatread_core::{AppError, AppResult};
use chatread_llm::LlmRequest;
use chatread_prompt::assemble;
use chatread_prompt::templates::QUERY_INSTRUCTION_PREFIX;

/// Reply meaning the model could not produce a query.
pub const NO_QUERY_SENTINEL: &str = "0";

const QUERY_MAX_TOKENS: u32 = 32;

impl ChatPipeline {
    /// Rewrite the latest question into a standalone search query.
    ///
    /// A `"0"` or blank reply falls back to the question itself.
    ///
    /// # Errors
    /// `AppError::InvalidRequest` when the last turn has no user text, before
    /// any call is made. Token meter and completion errors propagate.
    pub async fn rewrite_query(&self, history: &[HistoryMessage]) -> AppResult<QueryRewrite> {
        let question = latest_question(history)?;

        let trailing = format!("{}{}", QUERY_INSTRUCTION_PREFIX, question);
        let budget = self
            .meter
            .limit_for(&self.model)?
            .saturating_sub(trailing.chars().count());

        let prompt = assemble(
            &self.prompts.query_system,
            history,
            &trailing,
            &self.prompts.query_few_shots,
            budget,
            self.meter.as_ref(),
        )
        .into_messages();

        let request = LlmRequest::new(prompt.clone(), self.model.as_str())
            .with_temperature(0.0)
            .with_max_tokens(QUERY_MAX_TOKENS)
            .with_completions(1);

        let response = self.llm.complete(&request).await?;
        let query = resolve_query(&response.content, question);

        tracing::info!(query = %query, fallback = query == question, "Search query generated");

        Ok(QueryRewrite { query, prompt })
    }
}

/// User text of the turn being answered.
pub(crate) fn latest_question(history: &[HistoryMessage]) -> AppResult<&str> {
    history
        .last()
        .and_then(HistoryMessage::user_text)
        .ok_or_else(|| {
            AppError::InvalidRequest("The last history turn has no user question".to_string())
        })
}

/// Trimmed model reply, or the question when the reply carries no query.
fn resolve_query(reply: &str, question: &str) -> String {
    let reply = reply.trim();
    if reply.is_empty() || reply == NO_QUERY_SENTINEL {
        question.to_string()
    } else {
        reply.to_string()
    }
}
