//! Token-budgeted conversation assembly.
//!
//! [`assemble`] lays out the messages sent to the completion service:
//!
//! ```text
//! system prompt
//! few-shot examples (given order)
//! prior history, oldest included turn first
//! trailing user content
//! ```
//!
//! The system prompt, few-shots and trailing content are always present.
//! Prior history is taken newest turn first until the running token cost
//! exceeds the budget. The turn that crosses the budget is kept, so the
//! result can overshoot `max_tokens` by at most one turn.

use chatread_llm::{ChatMessage, TokenMeter};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One exchange of a chat transcript.
///
/// The last turn of a history is the question being answered; its `bot`
/// field is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<String>,
}

impl HistoryMessage {
    /// A turn holding only a user question.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            user: Some(text.into()),
            bot: None,
        }
    }

    /// A completed exchange.
    pub fn exchange(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            bot: Some(bot.into()),
        }
    }

    /// User text, treating empty strings as absent.
    pub fn user_text(&self) -> Option<&str> {
        self.user.as_deref().filter(|text| !text.is_empty())
    }

    /// Assistant text, treating empty strings as absent.
    pub fn bot_text(&self) -> Option<&str> {
        self.bot.as_deref().filter(|text| !text.is_empty())
    }
}

/// Result of [`assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledConversation {
    /// Messages in send order
    pub messages: Vec<ChatMessage>,

    /// Number of prior history turns that made it in
    pub turns_included: usize,

    /// Measured cost of `messages`
    pub token_cost: usize,
}

impl AssembledConversation {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}

/// Build the message sequence for one completion call.
///
/// # Arguments
/// * `system_prompt` - Instructions placed first
/// * `history` - Full transcript; the last turn is excluded from the history walk
/// * `trailing_user_content` - Final user message (question, possibly with evidence)
/// * `few_shots` - Demonstrations placed right after the system prompt
/// * `max_tokens` - Soft budget for the whole sequence
/// * `meter` - Token meter of the target model
pub fn assemble(
    system_prompt: &str,
    history: &[HistoryMessage],
    trailing_user_content: &str,
    few_shots: &[ChatMessage],
    max_tokens: usize,
    meter: &dyn TokenMeter,
) -> AssembledConversation {
    let system = ChatMessage::system(system_prompt);
    let trailing = ChatMessage::user(trailing_user_content);

    let mut token_cost = meter.cost_of(&system)
        + meter.total_cost(few_shots)
        + meter.cost_of(&trailing);

    let prior = match history.split_last() {
        Some((_, prior)) => prior,
        None => &[],
    };

    let mut included: VecDeque<ChatMessage> = VecDeque::new();
    let mut turns_included = 0;

    for turn in prior.iter().rev() {
        if let Some(bot) = turn.bot_text() {
            let message = ChatMessage::assistant(bot);
            token_cost += meter.cost_of(&message);
            included.push_front(message);
        }
        if let Some(user) = turn.user_text() {
            let message = ChatMessage::user(user);
            token_cost += meter.cost_of(&message);
            included.push_front(message);
        }
        turns_included += 1;

        if token_cost > max_tokens {
            break;
        }
    }

    tracing::trace!(
        turns_included,
        turns_available = prior.len(),
        token_cost,
        max_tokens,
        "Assembled conversation"
    );

    let mut messages = Vec::with_capacity(2 + few_shots.len() + included.len());
    messages.push(system);
    messages.extend(few_shots.iter().cloned());
    messages.extend(included);
    messages.push(trailing);

    AssembledConversation {
        messages,
        turns_included,
        token_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatread_core::AppResult;
    use chatread_llm::ChatRole;

    /// One token per whitespace-separated word.
    struct WordMeter;

    impl TokenMeter for WordMeter {
        fn limit_for(&self, _model: &str) -> AppResult<usize> {
            Ok(usize::MAX)
        }

        fn cost_of(&self, message: &ChatMessage) -> usize {
            message.content.split_whitespace().count()
        }
    }

    fn transcript() -> Vec<HistoryMessage> {
        vec![
            HistoryMessage::exchange("one two", "three four"),
            HistoryMessage::exchange("five six", "seven eight"),
            HistoryMessage::exchange("nine ten", "eleven twelve"),
            HistoryMessage::user("latest question"),
        ]
    }

    fn shots() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
            ChatMessage::assistant("a2"),
        ]
    }

    #[test]
    fn test_layout_with_unbounded_budget() {
        let conversation = assemble("sys", &transcript(), "final", &shots(), 1000, &WordMeter);
        let contents: Vec<&str> = conversation
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();

        assert_eq!(
            contents,
            vec![
                "sys",
                "q1",
                "a1",
                "q2",
                "a2",
                "one two",
                "three four",
                "five six",
                "seven eight",
                "nine ten",
                "eleven twelve",
                "final",
            ]
        );
        assert_eq!(conversation.turns_included, 3);
        assert_eq!(conversation.token_cost, 1 + 4 + 12 + 1);
    }

    #[test]
    fn test_roles_alternate_within_history() {
        let conversation = assemble("sys", &transcript(), "final", &[], 1000, &WordMeter);
        let roles: Vec<ChatRole> = conversation.messages.iter().map(|m| m.role).collect();

        assert_eq!(roles[0], ChatRole::System);
        assert_eq!(roles[1], ChatRole::User);
        assert_eq!(roles[2], ChatRole::Assistant);
        assert_eq!(*roles.last().unwrap(), ChatRole::User);
    }

    #[test]
    fn test_overflowing_turn_is_kept() {
        // sys(1) + final(1) = 2; newest turn adds 4 -> 6 > 5, walk stops after it
        let conversation = assemble("sys", &transcript(), "final", &[], 5, &WordMeter);
        let contents: Vec<&str> = conversation
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();

        assert_eq!(contents, vec!["sys", "nine ten", "eleven twelve", "final"]);
        assert_eq!(conversation.turns_included, 1);
        assert_eq!(conversation.token_cost, 6);
    }

    #[test]
    fn test_budget_stops_between_turns() {
        // 2 + 4 = 6 <= 6 keeps going, 6 + 4 = 10 > 6 stops
        let conversation = assemble("sys", &transcript(), "final", &[], 6, &WordMeter);
        assert_eq!(conversation.turns_included, 2);
        assert_eq!(conversation.messages[1].content, "five six");
    }

    #[test]
    fn test_oversized_trailing_content_still_well_formed() {
        let huge = "word ".repeat(500);
        let conversation = assemble("sys", &transcript(), &huge, &shots(), 10, &WordMeter);

        assert_eq!(conversation.messages.first().unwrap().content, "sys");
        assert_eq!(conversation.messages.last().unwrap().content, huge);
        // The first walked turn overflows immediately and is kept
        assert_eq!(conversation.turns_included, 1);
        assert_eq!(conversation.messages.len(), 1 + 4 + 2 + 1);
    }

    #[test]
    fn test_empty_history() {
        let conversation = assemble("sys", &[], "final", &[], 0, &WordMeter);
        assert_eq!(
            conversation.messages,
            vec![ChatMessage::system("sys"), ChatMessage::user("final")]
        );
        assert_eq!(conversation.turns_included, 0);
    }

    #[test]
    fn test_last_turn_is_never_walked() {
        let history = vec![HistoryMessage::exchange("only question", "ignored answer")];
        let conversation = assemble("sys", &history, "final", &[], 1000, &WordMeter);
        assert_eq!(conversation.messages.len(), 2);
    }

    #[test]
    fn test_missing_fields_are_skipped() {
        let history = vec![
            HistoryMessage {
                user: None,
                bot: Some("greeting".to_string()),
            },
            HistoryMessage {
                user: Some("hello".to_string()),
                bot: Some(String::new()),
            },
            HistoryMessage::user("latest"),
        ];

        let conversation = assemble("sys", &history, "final", &[], 1000, &WordMeter);
        assert_eq!(
            conversation.messages,
            vec![
                ChatMessage::system("sys"),
                ChatMessage::assistant("greeting"),
                ChatMessage::user("hello"),
                ChatMessage::user("final"),
            ]
        );
    }

    #[test]
    fn test_more_budget_never_includes_fewer_turns() {
        let history = transcript();
        let mut previous = 0;
        for budget in 0..40 {
            let turns = assemble("sys", &history, "final", &shots(), budget, &WordMeter).turns_included;
            assert!(turns >= previous, "budget {} included {} < {}", budget, turns, previous);
            previous = turns;
        }
        assert_eq!(previous, 3);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let history = transcript();
        let first = assemble("sys", &history, "final", &shots(), 9, &WordMeter);
        let second = assemble("sys", &history, "final", &shots(), 9, &WordMeter);
        assert_eq!(first, second);
    }

    #[test]
    fn test_history_message_json_shape() {
        let turns: Vec<HistoryMessage> =
            serde_json::from_str(r#"[{"user":"hi","bot":"hello"},{"user":"and?"}]"#).unwrap();
        assert_eq!(turns[0], HistoryMessage::exchange("hi", "hello"));
        assert_eq!(turns[1].bot, None);
    }
}
