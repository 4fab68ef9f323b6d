//! Prompt loader for YAML prompt definitions.

use crate::builder::check_template;
use crate::types::{PromptDefinition, PromptLibrary};
use chatread_core::{AppError, AppResult};
use std::path::Path;

/// Prompt id of the query rewrite system prompt and its few-shots.
pub const QUERY_PROMPT_ID: &str = "chat.query";

/// Prompt id of the answer synthesis system template.
pub const ANSWER_PROMPT_ID: &str = "chat.answer";

/// Prompt id of the follow-up questions instructions.
pub const FOLLOW_UPS_PROMPT_ID: &str = "chat.followups";

const KNOWN_PROMPT_IDS: &[&str] = &[QUERY_PROMPT_ID, ANSWER_PROMPT_ID, FOLLOW_UPS_PROMPT_ID];

/// Load a prompt definition by ID.
///
/// Looks for `<prompts_dir>/<id>.yml`.
///
/// # Example
/// ```no_run
/// use chatread_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".chatread/prompts"), "chat.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir.join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List all prompt IDs available in a directory.
pub fn list_prompts(prompts_dir: &Path) -> AppResult<Vec<String>> {
    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(prompts_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.api_version.is_empty() {
        return Err(AppError::Prompt(
            "Prompt apiVersion cannot be empty".to_string(),
        ));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

impl PromptLibrary {
    /// Built-in prompts with any definitions found in `prompts_dir` applied.
    ///
    /// A missing directory yields the built-in library. `chat.query` replaces
    /// the rewrite system prompt, and its few-shots when it declares any.
    /// `chat.answer` replaces the answer template and must parse as
    /// Handlebars. `chat.followups` replaces the follow-up instructions.
    pub fn load(prompts_dir: &Path) -> AppResult<Self> {
        let mut library = Self::default();

        for id in list_prompts(prompts_dir)? {
            if !KNOWN_PROMPT_IDS.contains(&id.as_str()) {
                tracing::warn!(prompt_id = %id, "Ignoring unknown prompt definition");
                continue;
            }

            let definition = load_prompt(prompts_dir, &id)?;

            match definition.id.as_str() {
                QUERY_PROMPT_ID => {
                    library.query_system = definition.template;
                    if !definition.few_shots.is_empty() {
                        library.query_few_shots = definition.few_shots;
                    }
                }
                ANSWER_PROMPT_ID => {
                    check_template(&definition.template)?;
                    library.answer_template = definition.template;
                }
                FOLLOW_UPS_PROMPT_ID => {
                    library.follow_up_prompt = definition.template;
                }
                _ => {}
            }
        }

        Ok(library)
    }
}
