//! Configuration management for chatread.
//!
//! Configuration is merged from, in increasing precedence:
//! - Built-in defaults
//! - The workspace config file (`.chatread/config.yaml`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "openai"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .chatread/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider ("ollama", "openai")
    pub provider: String,

    /// Chat model identifier
    pub model: String,

    /// API key for the completion provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Provider configurations from config.yaml
    pub llm: Option<LlmConfig>,

    /// Search index settings
    pub search: SearchConfig,

    /// Directory holding YAML prompt definitions
    pub prompts_dir: Option<PathBuf>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Extra model context sizes, in tokens, on top of the built-in table
    #[serde(rename = "contextLimits", default)]
    pub context_limits: HashMap<String, usize>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint),
        }
    }

    /// Request timeout in seconds, if any.
    pub fn timeout(&self) -> Option<u64> {
        match self {
            Self::OpenAI { timeout, .. } | Self::Ollama { timeout, .. } => *timeout,
        }
    }
}

/// Search index connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search service
    pub endpoint: Option<String>,

    /// Index name
    pub index: String,

    /// Environment variable holding the search API key
    #[serde(rename = "apiKeyEnv", default)]
    pub api_key_env: Option<String>,

    /// Resolved search API key (never read from YAML)
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Document field used as the citation identifier
    #[serde(rename = "identifierField", default = "default_identifier_field")]
    pub identifier_field: String,

    /// Document field holding the excerpt text
    #[serde(rename = "contentField", default = "default_content_field")]
    pub content_field: String,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_identifier_field() -> String {
    "sourcepage".to_string()
}

fn default_content_field() -> String {
    "content".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            index: "gptkbindex".to_string(),
            api_key_env: None,
            api_key: None,
            identifier_field: default_identifier_field(),
            content_field: default_content_field(),
            timeout: None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    search: Option<SearchConfig>,
    logging: Option<LoggingConfig>,
    prompts: Option<PromptsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PromptsConfig {
    directory: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "openai".to_string(),
            model: "gpt-35-turbo".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            search: SearchConfig::default(),
            prompts_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and the environment.
    ///
    /// Environment variables:
    /// - `CHATREAD_WORKSPACE`: Override workspace path
    /// - `CHATREAD_CONFIG`: Path to config file
    /// - `CHATREAD_PROVIDER`: Completion provider
    /// - `CHATREAD_MODEL`: Chat model identifier
    /// - `CHATREAD_API_KEY`: Completion API key
    /// - `CHATREAD_SEARCH_ENDPOINT`, `CHATREAD_SEARCH_INDEX`, `CHATREAD_SEARCH_KEY`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `CHATREAD_WORKSPACE` and `CHATREAD_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("CHATREAD_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("CHATREAD_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.chatread_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(provider) = std::env::var("CHATREAD_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("CHATREAD_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("CHATREAD_SEARCH_ENDPOINT") {
            config.search.endpoint = Some(endpoint);
        }

        if let Ok(index) = std::env::var("CHATREAD_SEARCH_INDEX") {
            config.search.index = index;
        }

        config.api_key = std::env::var("CHATREAD_API_KEY").ok();
        config.search.api_key = std::env::var("CHATREAD_SEARCH_KEY").ok().or_else(|| {
            config
                .search
                .api_key_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok())
        });
        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(search) = config_file.search {
            result.search = search;
        }

        if let Some(prompts) = config_file.prompts {
            // Relative prompt directories are anchored at the workspace
            result.prompts_dir = prompts.directory.map(|dir| result.workspace.join(dir));
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .chatread directory.
    pub fn chatread_dir(&self) -> PathBuf {
        self.workspace.join(".chatread")
    }

    /// Directory searched for prompt definitions.
    pub fn prompts_dir(&self) -> PathBuf {
        self.prompts_dir
            .clone()
            .unwrap_or_else(|| self.chatread_dir().join("prompts"))
    }

    /// Get the configuration of a provider, if declared in config.yaml.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Extra model context limits declared in config.yaml.
    pub fn context_limits(&self) -> HashMap<String, usize> {
        self.llm
            .as_ref()
            .map(|llm| llm.context_limits.clone())
            .unwrap_or_default()
    }

    /// Resolve the completion API key.
    ///
    /// `CHATREAD_API_KEY` wins over the provider's `apiKeyEnv` variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider and the search index.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(
                "The openai provider requires CHATREAD_API_KEY or an apiKeyEnv entry".to_string(),
            ));
        }

        match self.search.endpoint.as_deref() {
            None | Some("") => Err(AppError::Config(
                "No search endpoint configured (search.endpoint or CHATREAD_SEARCH_ENDPOINT)"
                    .to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn searchable_config() -> AppConfig {
        let mut config = AppConfig {
            provider: "ollama".to_string(),
            ..AppConfig::default()
        };
        config.search.endpoint = Some("http://localhost:7700".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-35-turbo");
        assert_eq!(config.search.identifier_field, "sourcepage");
        assert_eq!(config.search.content_field, "content");
        assert!(!config.verbose);
    }

    #[test]
    fn test_prompts_dir_defaults_under_chatread_dir() {
        let config = AppConfig::default();
        assert!(config.prompts_dir().ends_with(".chatread/prompts"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("llama3.2".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "ollama");
        assert_eq!(overridden.model, "llama3.2");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
  contextLimits:
    llama3.2: 8192
search:
  endpoint: https://search.example.net
  index: handbook
  identifierField: page
logging:
  level: warn
  color: false
prompts:
  directory: prompts
"#,
        )
        .unwrap();

        let base = AppConfig {
            workspace: temp_dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let merged = base.merge_yaml(&path).unwrap();

        assert_eq!(merged.provider, "ollama");
        assert_eq!(merged.model, "llama3.2");
        assert_eq!(merged.context_limits().get("llama3.2"), Some(&8192));
        assert_eq!(
            merged.search.endpoint.as_deref(),
            Some("https://search.example.net")
        );
        assert_eq!(merged.search.index, "handbook");
        assert_eq!(merged.search.identifier_field, "page");
        assert_eq!(merged.search.content_field, "content");
        assert_eq!(merged.log_level.as_deref(), Some("warn"));
        assert!(merged.no_color);
        assert_eq!(merged.prompts_dir(), temp_dir.path().join("prompts"));
        assert!(matches!(
            merged.get_provider_config("ollama"),
            Some(ProviderConfig::Ollama { .. })
        ));
    }

    #[test]
    fn test_load_from_explicit_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        std::fs::write(&path, "search:\n  index: handbook\n").unwrap();

        let config =
            AppConfig::load_from(Some(temp_dir.path().to_path_buf()), Some(path.clone())).unwrap();
        assert_eq!(config.workspace, temp_dir.path());
        assert_eq!(config.config_file, Some(path));
        assert_eq!(config.search.identifier_field, "sourcepage");
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load_from(Some(temp_dir.path().join("absent")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_merge_yaml_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "llm: [unterminated").unwrap();

        assert!(AppConfig::default().merge_yaml(&path).is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = searchable_config();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_search_endpoint() {
        let mut config = searchable_config();
        config.search.endpoint = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_openai_with_explicit_key() {
        let mut config = searchable_config();
        config.provider = "openai".to_string();
        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ollama() {
        assert!(searchable_config().validate().is_ok());
    }
}
