//! LLM integration crate for chatread.
//!
//! This crate provides a provider-agnostic abstraction for chat completion
//! services, plus the token meter used to budget prompts.
//!
//! # Providers
//! - **OpenAI-compatible**: any `/chat/completions` endpoint (default)
//! - **Ollama**: local LLM runtime
//!
//! # Example
//! ```no_run
//! use chatread_llm::{ChatMessage, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new(vec![ChatMessage::user("Hello, world!")], "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod tokens;
pub mod types;

// Re-export main types
pub use client::{
    ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk,
    LlmUsage,
};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use tokens::{TiktokenMeter, TokenMeter, MODEL_TOKEN_LIMITS};
pub use types::ProviderType;
