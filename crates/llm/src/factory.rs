//! LLM provider factory.
//!
//! Builds a completion client from a provider name plus the endpoint, key and
//! timeout resolved from configuration.

use crate::client::LlmClient;
use crate::providers::{openai, OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("openai", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, required by "openai"
/// * `timeout` - Optional request timeout
///
/// # Errors
/// Returns error if the provider is unknown, a required key is missing or
/// the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            let client = match timeout {
                Some(timeout) => {
                    OllamaClient::with_timeout(base_url, timeout).map_err(|e| e.to_string())?
                }
                None => OllamaClient::with_base_url(base_url),
            };
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let api_key = api_key.ok_or_else(|| "OpenAI provider requires API key".to_string())?;
            let base_url = endpoint.unwrap_or(openai::DEFAULT_BASE_URL);
            let client = match timeout {
                Some(timeout) => OpenAiClient::with_timeout(base_url, api_key, timeout)
                    .map_err(|e| e.to_string())?,
                None => OpenAiClient::new(base_url, api_key),
            };
            Ok(Arc::new(client))
        }
    }
}
