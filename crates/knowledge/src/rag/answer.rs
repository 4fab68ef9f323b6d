//! Answer synthesis stage.

use crate::rag::pipeline::ChatPipeline;
use crate::rag::query::latest_question;
use crate::rag::types::{QueryRewrite, Retrieval, Synthesis};
use crate::types::{HistoryMessage, PipelineContext};
use chatread_core::AppResult;
use chatread_llm::{ChatMessage, LlmRequest};
use chatread_prompt::templates::SOURCES_HEADER;
use chatread_prompt::{assemble, render_answer_prompt, PromptOverride};

/// Answer temperature when the caller gives none.
pub const DEFAULT_ANSWER_TEMPERATURE: f32 = 0.7;

const ANSWER_MAX_TOKENS: u32 = 1024;

impl ChatPipeline {
    /// Build the answer conversation from the retrieved evidence.
    ///
    /// Evidence goes in the final user turn, after the question and a
    /// `Sources:` header. History fills the rest of the model's context.
    pub fn synthesize(
        &self,
        history: &[HistoryMessage],
        rewrite: &QueryRewrite,
        retrieval: &Retrieval,
        context: &PipelineContext,
    ) -> AppResult<Synthesis> {
        let question = latest_question(history)?;

        let prompt_override = PromptOverride::parse(context.prompt_override.as_deref());
        let system_prompt = render_answer_prompt(
            &self.prompts,
            &prompt_override,
            context.suggest_followup_questions,
        )?;

        let trailing = format!("{}{}{}", question, SOURCES_HEADER, retrieval.evidence_block());
        let budget = self.meter.limit_for(&self.model)?;

        let conversation = assemble(
            &system_prompt,
            history,
            &trailing,
            &[],
            budget,
            self.meter.as_ref(),
        );

        tracing::debug!(
            history_turns = conversation.turns_included,
            token_cost = conversation.token_cost,
            budget,
            "Answer prompt assembled"
        );

        Ok(Synthesis {
            messages: conversation.into_messages(),
            data_points: retrieval.documents.clone(),
            thoughts: thoughts(&retrieval.query, &rewrite.prompt),
            temperature: context.temperature.unwrap_or(DEFAULT_ANSWER_TEMPERATURE),
        })
    }

    pub(crate) fn answer_request(&self, synthesis: &Synthesis) -> LlmRequest {
        LlmRequest::new(synthesis.messages.clone(), self.model.as_str())
            .with_temperature(synthesis.temperature)
            .with_max_tokens(ANSWER_MAX_TOKENS)
            .with_completions(1)
    }
}

/// Operator trace: the search query and the rewrite prompt that produced it.
fn thoughts(query: &str, rewrite_prompt: &[ChatMessage]) -> String {
    let conversation = rewrite_prompt
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Searched for:\n{}\n\nConversations:\n{}", query, conversation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thoughts_format() {
        let prompt = vec![
            ChatMessage::system("Rewrite."),
            ChatMessage::user("Generate search query for: pto?"),
        ];

        assert_eq!(
            thoughts("pto policy", &prompt),
            "Searched for:\npto policy\n\nConversations:\nsystem: Rewrite.\n\nuser: Generate search query for: pto?"
        );
    }

    #[test]
    fn test_thoughts_without_prompt() {
        assert_eq!(thoughts("q", &[]), "Searched for:\nq\n\nConversations:\n");
    }
}
