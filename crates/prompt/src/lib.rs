//! Prompt system for chatread.
//!
//! This crate provides:
//! - Token-budgeted conversation assembly
//! - Built-in query rewrite and answer prompts
//! - Handlebars rendering of the answer system prompt
//! - YAML prompt definitions overriding the built-ins

pub mod builder;
pub mod conversation;
pub mod loader;
pub mod templates;
pub mod types;

// Re-export main types
pub use builder::render_answer_prompt;
pub use conversation::{assemble, AssembledConversation, HistoryMessage};
pub use loader::{list_prompts, load_prompt};
pub use types::{PromptDefinition, PromptLibrary, PromptOverride, APPEND_SENTINEL};
