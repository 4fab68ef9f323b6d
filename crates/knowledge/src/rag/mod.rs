//! Retrieve-then-read chat answering.
//!
//! [`ChatPipeline`] runs the query rewrite, retrieval and answer synthesis
//! stages in order for each request.

pub mod answer;
pub mod pipeline;
pub mod query;
pub mod retrieve;
pub mod types;

pub use pipeline::ChatPipeline;
pub use types::{ChatAnswer, ChatChunk, ChatStream, QueryRewrite, Retrieval, Synthesis};
