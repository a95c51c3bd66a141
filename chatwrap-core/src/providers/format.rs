//! Prompt formats
//!
//! Turns a session into the exact payload a backend expects. Formatting is a
//! pure function of the messages: the default system prompt is inserted into
//! a working copy, never into the caller's session.
//!
//! Three formats exist:
//! - `InstructionTag`: `<s>[INST] ... [/INST]` blocks with the system prompt
//!   folded into the first user turn
//! - `RoleTranscript`: one `Role: content` line per message and an
//!   `Assistant: ` cue
//! - `TurnList`: the messages as a list of `{role, content}` records

use crate::protocol::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const B_INST: &str = "[INST]";
pub const E_INST: &str = "[/INST]";
pub const B_SYS: &str = "<<SYS>>\n";
pub const E_SYS: &str = "\n<</SYS>>\n\n";
pub const BOS: &str = "<s>";
pub const EOS: &str = "</s>";

/// System prompt used when a session does not start with one
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful, respectful and honest assistant. Always answer as helpfully as possible, while being safe. Your answers should not include any harmful, unethical, racist, sexist, toxic, dangerous, or illegal content. Please ensure that your responses are socially unbiased and positive in nature.

If a question does not make any sense, or is not factually coherent, explain why instead of answering something not correct. If you don't know the answer to a question, please don't share false information.";

/// Session shape rejected by a prompt format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptFormatError {
    /// A message sits where another role was required
    #[error(
        "message {position} must be from {expected}, got {found}; the model only supports \
         'system', 'user' and 'assistant' roles, starting with 'system', then 'user' and \
         alternating (u/a/u/a/u...)"
    )]
    UnexpectedRole {
        position: usize,
        expected: MessageRole,
        found: MessageRole,
    },

    /// Conversation does not end on a user turn
    #[error("Last message must be from user, got {}", .found.map(|r| r.as_str()).unwrap_or("nothing"))]
    LastMessageNotUser { found: Option<MessageRole> },
}

/// Payload produced by a prompt format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedPrompt {
    /// Single prompt string for text-generation endpoints
    Text(String),
    /// Structured transcript for chat endpoints
    Turns(Vec<ChatMessage>),
}

impl FormattedPrompt {
    /// Character count used by the approximate token heuristic
    pub fn char_len(&self) -> usize {
        match self {
            FormattedPrompt::Text(text) => text.chars().count(),
            FormattedPrompt::Turns(turns) => turns.iter().map(|m| m.content().chars().count()).sum(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormattedPrompt::Text(text) => Some(text),
            FormattedPrompt::Turns(_) => None,
        }
    }

    pub fn as_turns(&self) -> Option<&[ChatMessage]> {
        match self {
            FormattedPrompt::Text(_) => None,
            FormattedPrompt::Turns(turns) => Some(turns),
        }
    }
}

/// Prompt format of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptFormat {
    InstructionTag,
    RoleTranscript,
    TurnList,
}

impl PromptFormat {
    /// Format the messages of a session
    pub fn format(&self, messages: &[ChatMessage]) -> Result<FormattedPrompt, PromptFormatError> {
        match self {
            PromptFormat::InstructionTag => format_instruction_tag(messages).map(FormattedPrompt::Text),
            PromptFormat::RoleTranscript => format_role_transcript(messages).map(FormattedPrompt::Text),
            PromptFormat::TurnList => Ok(FormattedPrompt::Turns(messages.to_vec())),
        }
    }

    /// Whether the format enforces system/user/assistant ordering
    pub fn requires_alternation(&self) -> bool {
        !matches!(self, PromptFormat::TurnList)
    }
}

/// One turn of a working copy: role plus borrowed or merged content
struct Turn<'a> {
    role: MessageRole,
    content: std::borrow::Cow<'a, str>,
}

fn with_system_prompt(messages: &[ChatMessage]) -> Vec<Turn<'_>> {
    let mut turns: Vec<Turn<'_>> = Vec::with_capacity(messages.len() + 1);
    if messages.first().map(ChatMessage::role) != Some(MessageRole::System) {
        turns.push(Turn {
            role: MessageRole::System,
            content: DEFAULT_SYSTEM_PROMPT.into(),
        });
    }
    turns.extend(messages.iter().map(|m| Turn {
        role: m.role(),
        content: m.content().into(),
    }));
    turns
}

fn expect_role(turns: &[Turn<'_>], position: usize, expected: MessageRole) -> Result<(), PromptFormatError> {
    let found = turns[position].role;
    if found != expected {
        return Err(PromptFormatError::UnexpectedRole {
            position,
            expected,
            found,
        });
    }
    Ok(())
}

fn expect_last_user(turns: &[Turn<'_>]) -> Result<(), PromptFormatError> {
    match turns.last().map(|t| t.role) {
        Some(MessageRole::User) => Ok(()),
        found => Err(PromptFormatError::LastMessageNotUser { found }),
    }
}

fn format_instruction_tag(messages: &[ChatMessage]) -> Result<String, PromptFormatError> {
    let turns = with_system_prompt(messages);
    if turns.len() < 2 {
        return Err(PromptFormatError::LastMessageNotUser {
            found: turns.last().map(|t| t.role),
        });
    }

    // Fold the system prompt into the first real turn, keeping that turn's role
    let mut merged = Vec::with_capacity(turns.len() - 1);
    let mut rest = turns.into_iter();
    let system = rest.next().map(|t| t.content).unwrap_or_default();
    if let Some(first) = rest.next() {
        merged.push(Turn {
            role: first.role,
            content: format!("{B_SYS}{system}{E_SYS}{}", first.content).into(),
        });
    }
    merged.extend(rest);

    for position in 0..merged.len() {
        let expected = if position % 2 == 0 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        expect_role(&merged, position, expected)?;
    }
    expect_last_user(&merged)?;

    let mut formatted = String::new();
    for pair in merged.chunks_exact(2) {
        formatted.push_str(&format!(
            "{BOS}{B_INST} {} {E_INST} {} {EOS}",
            pair[0].content.trim(),
            pair[1].content.trim()
        ));
    }
    if let Some(last) = merged.last() {
        formatted.push_str(&format!("{BOS}{B_INST} {} {E_INST}", last.content.trim()));
    }
    Ok(formatted)
}

fn format_role_transcript(messages: &[ChatMessage]) -> Result<String, PromptFormatError> {
    let turns = with_system_prompt(messages);

    for position in 1..turns.len() {
        let expected = if position % 2 == 1 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        expect_role(&turns, position, expected)?;
    }
    expect_last_user(&turns)?;

    let mut formatted = turns
        .iter()
        .map(|t| format!("{}: {}", t.role.capitalized(), t.content))
        .collect::<Vec<_>>()
        .join("\n");
    formatted.push_str("\nAssistant: ");
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(text: &str) -> ChatMessage {
        ChatMessage::system(text).unwrap()
    }

    fn user(text: &str) -> ChatMessage {
        ChatMessage::user(text).unwrap()
    }

    fn assistant(text: &str) -> ChatMessage {
        ChatMessage::assistant(text).unwrap()
    }

    #[test]
    fn test_instruction_tag_single_turn() {
        let prompt = PromptFormat::InstructionTag
            .format(&[system("S"), user("U")])
            .unwrap();
        assert_eq!(
            prompt.as_text().unwrap(),
            "<s>[INST] <<SYS>>\nS\n<</SYS>>\n\nU [/INST]"
        );
    }

    #[test]
    fn test_instruction_tag_multi_turn() {
        let prompt = PromptFormat::InstructionTag
            .format(&[system("S"), user("Q1"), assistant(" A1 "), user("Q2")])
            .unwrap();
        assert_eq!(
            prompt.as_text().unwrap(),
            "<s>[INST] <<SYS>>\nS\n<</SYS>>\n\nQ1 [/INST] A1 </s><s>[INST] Q2 [/INST]"
        );
    }

    #[test]
    fn test_instruction_tag_inserts_default_system_prompt() {
        let prompt = PromptFormat::InstructionTag.format(&[user("U")]).unwrap();
        let text = prompt.as_text().unwrap();
        assert!(text.starts_with("<s>[INST] <<SYS>>\nYou are a helpful"));
        assert!(text.ends_with("\n<</SYS>>\n\nU [/INST]"));
    }

    #[test]
    fn test_instruction_tag_rejects_consecutive_users() {
        let err = PromptFormat::InstructionTag
            .format(&[system("S"), user("a"), user("b")])
            .unwrap_err();
        assert_eq!(
            err,
            PromptFormatError::UnexpectedRole {
                position: 1,
                expected: MessageRole::Assistant,
                found: MessageRole::User,
            }
        );
    }

    #[test]
    fn test_instruction_tag_rejects_trailing_assistant() {
        let err = PromptFormat::InstructionTag
            .format(&[system("S"), user("a"), assistant("b")])
            .unwrap_err();
        assert_eq!(
            err,
            PromptFormatError::LastMessageNotUser {
                found: Some(MessageRole::Assistant)
            }
        );
    }

    #[test]
    fn test_instruction_tag_rejects_system_only() {
        let err = PromptFormat::InstructionTag.format(&[system("S")]).unwrap_err();
        assert!(matches!(err, PromptFormatError::LastMessageNotUser { .. }));
    }

    #[test]
    fn test_role_transcript_layout() {
        let prompt = PromptFormat::RoleTranscript
            .format(&[system("Be brief."), user("Hi"), assistant("Hello"), user("Bye")])
            .unwrap();
        assert_eq!(
            prompt.as_text().unwrap(),
            "System: Be brief.\nUser: Hi\nAssistant: Hello\nUser: Bye\nAssistant: "
        );
    }

    #[test]
    fn test_role_transcript_does_not_touch_input() {
        let messages = vec![user("Hi")];
        let _ = PromptFormat::RoleTranscript.format(&messages).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_turn_list_accepts_any_order() {
        let messages = vec![assistant("a"), assistant("b"), system("c")];
        let prompt = PromptFormat::TurnList.format(&messages).unwrap();
        assert_eq!(prompt.as_turns().unwrap(), messages.as_slice());
        assert!(!PromptFormat::TurnList.requires_alternation());
    }

    #[test]
    fn test_empty_session_error_message() {
        let err = PromptFormat::RoleTranscript.format(&[]).unwrap_err();
        assert_eq!(err.to_string(), "Last message must be from user, got system");
    }
}
