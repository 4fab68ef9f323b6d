//! Provider implementations.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use chatread_core::{AppError, AppResult};
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// Split an HTTP byte stream into complete text lines.
///
/// Lines are yielded without their terminator. Bytes are buffered until a
/// newline arrives so multi-byte characters split across frames decode
/// correctly. A trailing line without newline is yielded when the body ends.
/// After a transport error the stream yields that error and ends.
pub(crate) fn line_stream<S, B, E>(bytes: S) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    futures::stream::unfold(
        (bytes, Vec::<u8>::new(), false),
        |(mut bytes, mut buffer, mut finished)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    return Some((Ok(line), (bytes, buffer, finished)));
                }

                if finished {
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = String::from_utf8_lossy(&buffer).trim_end().to_string();
                    buffer.clear();
                    return Some((Ok(line), (bytes, buffer, finished)));
                }

                match bytes.next().await {
                    Some(Ok(frame)) => buffer.extend_from_slice(frame.as_ref()),
                    Some(Err(e)) => {
                        buffer.clear();
                        let err = AppError::Llm(format!("Stream error: {}", e));
                        return Some((Err(err), (bytes, buffer, true)));
                    }
                    None => finished = true,
                }
            }
        },
    )
}
