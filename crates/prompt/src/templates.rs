//! Built-in prompt templates.
//!
//! Workspaces can replace any of these with YAML prompt definitions, see
//! [`crate::loader`].

use chatread_llm::ChatMessage;

/// Handlebars variable filled with caller-injected instructions.
pub const INJECTED_PROMPT_VAR: &str = "injected_prompt";

/// Handlebars variable filled with the follow-up questions instructions.
pub const FOLLOW_UP_QUESTIONS_VAR: &str = "follow_up_questions_prompt";

/// Prefix of the query rewrite instruction sent as the final user turn.
pub const QUERY_INSTRUCTION_PREFIX: &str = "Generate search query for: ";

/// Header separating the question from retrieved evidence in the final user turn.
pub const SOURCES_HEADER: &str = "\n\nSources:\n";

/// System prompt for answer synthesis.
pub const ANSWER_SYSTEM_TEMPLATE: &str = "Assistant helps the company employees with their healthcare plan questions, and questions about the employee handbook. Be brief in your answers.
Answer ONLY with the facts listed in the list of sources below. If there isn't enough information below, say you don't know. Do not generate answers that don't use the sources below. If asking a clarifying question to the user would help, ask the question.
For tabular information return it as an html table. Do not return markdown format. If the question is not in English, answer in the language used in the question.
Each source has a name followed by colon and the actual information, always include the source name for each fact you use in the response. Use square brackets to reference the source, e.g. [info1.txt]. Don't combine sources, list each source separately, e.g. [info1.txt][info2.pdf].
{{follow_up_questions_prompt}}
{{injected_prompt}}
";

/// Instructions spliced in when follow-up suggestions are requested.
pub const FOLLOW_UP_QUESTIONS_PROMPT: &str = "Generate three very brief follow-up questions that the user would likely ask next about their healthcare plan and employee handbook.
Use double angle brackets to reference the questions, e.g. <<Are there exclusions for prescriptions?>>.
Try not to repeat questions that have already been asked.
Only generate questions and do not generate any text before or after the questions, such as 'Next Questions'";

/// System prompt for the query rewrite stage.
pub const QUERY_SYSTEM_PROMPT: &str = "Below is a history of the conversation so far, and a new question asked by the user that needs to be answered by searching in a knowledge base about employee healthcare plans and the employee handbook.
Generate a search query based on the conversation and the new question.
Do not include cited source filenames and document names e.g info.txt or doc.pdf in the search query terms.
Do not include any text inside [] or <<>> in the search query terms.
Do not include any special characters like '+'.
If the question is not in English, translate the question to English before generating the search query.
If you cannot generate a search query, return just the number 0.
";

/// Demonstrations steering the query rewrite output style.
pub fn query_few_shots() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("What are my health plans?"),
        ChatMessage::assistant("Show available health plans"),
        ChatMessage::user("does my plan cover cardio?"),
        ChatMessage::assistant("Health plan cardio coverage"),
    ]
}
