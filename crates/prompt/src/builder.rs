//! System prompt rendering.

use crate::templates::{FOLLOW_UP_QUESTIONS_VAR, INJECTED_PROMPT_VAR};
use crate::types::{PromptLibrary, PromptOverride};
use chatread_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render the answer-synthesis system prompt.
///
/// The injected-instructions placeholder receives the override's text, and
/// the follow-up placeholder receives the library's follow-up instructions
/// only when `suggest_follow_ups` is set. Both resolve to an empty string
/// otherwise.
///
/// # Example
/// ```
/// use chatread_prompt::{render_answer_prompt, PromptLibrary, PromptOverride};
///
/// let library = PromptLibrary::default();
/// let prompt = render_answer_prompt(&library, &PromptOverride::parse(Some(">>>Answer in French.")), false).unwrap();
/// assert!(prompt.contains("Answer in French.\n"));
/// ```
pub fn render_answer_prompt(
    library: &PromptLibrary,
    prompt_override: &PromptOverride,
    suggest_follow_ups: bool,
) -> AppResult<String> {
    let mut variables = HashMap::new();
    variables.insert(INJECTED_PROMPT_VAR.to_string(), prompt_override.injected_text());
    variables.insert(
        FOLLOW_UP_QUESTIONS_VAR.to_string(),
        if suggest_follow_ups {
            library.follow_up_prompt.clone()
        } else {
            String::new()
        },
    );

    tracing::debug!(
        override_kind = prompt_override.kind(),
        suggest_follow_ups,
        "Rendering answer system prompt"
    );

    render_template(&library.answer_template, &variables)
}

/// Render a Handlebars template with variables.
pub(crate) fn render_template(
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// Check that a template parses.
pub(crate) fn check_template(template: &str) -> AppResult<()> {
    render_template(template, &HashMap::new()).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{ANSWER_SYSTEM_TEMPLATE, FOLLOW_UP_QUESTIONS_PROMPT};

    fn expected(injected: &str, follow_ups: &str) -> String {
        ANSWER_SYSTEM_TEMPLATE
            .replace("{{injected_prompt}}", injected)
            .replace("{{follow_up_questions_prompt}}", follow_ups)
    }

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("prompt".to_string(), "<b>Hello</b>".to_string());

        let result = render_template("Question: {{prompt}}", &vars).unwrap();
        assert_eq!(result, "Question: <b>Hello</b>");
    }

    #[test]
    fn test_render_template_missing_variable() {
        let result = render_template("Question: {{missing}}", &HashMap::new()).unwrap();
        assert_eq!(result, "Question: ");
    }

    #[test]
    fn test_check_template_rejects_unclosed_block() {
        assert!(check_template("{{#if x}}unterminated").is_err());
    }

    #[test]
    fn test_append_override() {
        let library = PromptLibrary::default();
        let prompt_override = PromptOverride::parse(Some(">>>extra text"));

        let prompt = render_answer_prompt(&library, &prompt_override, false).unwrap();
        assert_eq!(prompt, expected("extra text\n", ""));
    }

    #[test]
    fn test_replace_override() {
        let library = PromptLibrary::default();
        let prompt_override = PromptOverride::parse(Some("extra text"));

        let prompt = render_answer_prompt(&library, &prompt_override, false).unwrap();
        assert_eq!(prompt, expected("extra text", ""));
    }

    #[test]
    fn test_no_override() {
        let library = PromptLibrary::default();

        let prompt = render_answer_prompt(&library, &PromptOverride::Default, false).unwrap();
        assert_eq!(prompt, expected("", ""));
    }

    #[test]
    fn test_follow_up_questions_spliced_only_when_requested() {
        let library = PromptLibrary::default();

        let with = render_answer_prompt(&library, &PromptOverride::Default, true).unwrap();
        assert_eq!(with, expected("", FOLLOW_UP_QUESTIONS_PROMPT));
        assert!(with.contains("<<Are there exclusions for prescriptions?>>"));

        let without = render_answer_prompt(&library, &PromptOverride::Default, false).unwrap();
        assert!(!without.contains("follow-up questions"));
    }

    #[test]
    fn test_override_text_is_not_rendered() {
        let library = PromptLibrary::default();
        let prompt_override = PromptOverride::parse(Some("Keep {{braces}} verbatim"));

        let prompt = render_answer_prompt(&library, &prompt_override, false).unwrap();
        assert!(prompt.contains("Keep {{braces}} verbatim"));
    }
}
