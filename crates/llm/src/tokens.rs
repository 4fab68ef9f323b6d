//! Token metering.
//!
//! A [`TokenMeter`] answers two questions about a chat model: how large its
//! context window is and how many tokens a message costs. Costs are only used
//! for relative comparison when budgeting prompts, so they need not match the
//! completion service's tokenizer exactly.

use crate::client::ChatMessage;
use chatread_core::{AppError, AppResult};
use std::collections::HashMap;
use tiktoken_rs::CoreBPE;

/// Context sizes, in tokens, of the chat models known out of the box.
pub const MODEL_TOKEN_LIMITS: &[(&str, usize)] = &[
    ("gpt-35-turbo", 4000),
    ("gpt-3.5-turbo", 4000),
    ("gpt-35-turbo-16k", 16000),
    ("gpt-3.5-turbo-16k", 16000),
    ("gpt-4", 8100),
    ("gpt-4-32k", 32000),
    ("gpt-4o", 128000),
    ("gpt-4o-mini", 128000),
];

/// Fixed cost of the `role` and `content` keys of a message.
const MESSAGE_OVERHEAD: usize = 2;

/// Measures messages against a model's context window.
pub trait TokenMeter: Send + Sync {
    /// Maximum context size of `model`.
    ///
    /// Fails with [`AppError::UnknownModel`] when the model is not recognised.
    fn limit_for(&self, model: &str) -> AppResult<usize>;

    /// Token cost of one message.
    fn cost_of(&self, message: &ChatMessage) -> usize;

    /// Total cost of a message sequence.
    fn total_cost(&self, messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| self.cost_of(m)).sum()
    }
}

/// Token meter backed by the `cl100k_base` BPE.
pub struct TiktokenMeter {
    bpe: CoreBPE,
    limits: HashMap<String, usize>,
}

impl std::fmt::Debug for TiktokenMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenMeter")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn load_encoding() -> anyhow::Result<CoreBPE> {
    tiktoken_rs::cl100k_base()
}

impl TiktokenMeter {
    /// Create a meter with the built-in model table.
    pub fn new() -> AppResult<Self> {
        let bpe = load_encoding()
            .map_err(|e| AppError::Llm(format!("Failed to load tokenizer: {}", e)))?;

        let limits = MODEL_TOKEN_LIMITS
            .iter()
            .map(|(model, limit)| (model.to_string(), *limit))
            .collect();

        Ok(Self { bpe, limits })
    }

    /// Add or replace model limits, e.g. for local models.
    pub fn with_limits(mut self, extra: impl IntoIterator<Item = (String, usize)>) -> Self {
        self.limits.extend(extra);
        self
    }

    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl TokenMeter for TiktokenMeter {
    fn limit_for(&self, model: &str) -> AppResult<usize> {
        self.limits
            .get(model)
            .copied()
            .ok_or_else(|| AppError::UnknownModel(model.to_string()))
    }

    fn cost_of(&self, message: &ChatMessage) -> usize {
        MESSAGE_OVERHEAD + self.count(message.role.as_str()) + self.count(&message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_limits() {
        let meter = TiktokenMeter::new().unwrap();
        assert_eq!(meter.limit_for("gpt-35-turbo").unwrap(), 4000);
        assert_eq!(meter.limit_for("gpt-4").unwrap(), 8100);
        assert_eq!(meter.limit_for("gpt-4-32k").unwrap(), 32000);
    }

    #[test]
    fn test_unknown_model() {
        let meter = TiktokenMeter::new().unwrap();
        match meter.limit_for("llama3.2") {
            Err(AppError::UnknownModel(model)) => assert_eq!(model, "llama3.2"),
            other => panic!("Expected UnknownModel, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_limits() {
        let meter = TiktokenMeter::new()
            .unwrap()
            .with_limits([("llama3.2".to_string(), 8192)]);
        assert_eq!(meter.limit_for("llama3.2").unwrap(), 8192);
    }

    #[test]
    fn test_cost_grows_with_content() {
        let meter = TiktokenMeter::new().unwrap();
        let short = meter.cost_of(&ChatMessage::user("What is covered?"));
        let long = meter.cost_of(&ChatMessage::user(
            "What is covered by the dental plan, and how do I file a claim?",
        ));

        assert!(short > MESSAGE_OVERHEAD);
        assert!(long > short);
    }

    #[test]
    fn test_total_cost_sums_messages() {
        let meter = TiktokenMeter::new().unwrap();
        let messages = vec![ChatMessage::system("Be brief."), ChatMessage::user("Hi")];
        let expected = meter.cost_of(&messages[0]) + meter.cost_of(&messages[1]);
        assert_eq!(meter.total_cost(&messages), expected);
    }
}
