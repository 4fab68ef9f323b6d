//! Command handlers for the chatread CLI.

pub mod ask;

pub use ask::AskCommand;
