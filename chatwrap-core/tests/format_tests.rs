//! Prompt format behavior across session shapes

use chatwrap_core::protocol::{ChatMessage, MessageRole};
use chatwrap_core::providers::format::{DEFAULT_SYSTEM_PROMPT, E_INST};
use chatwrap_core::providers::{PromptFormat, PromptFormatError};
use test_case::test_case;

fn parse(script: &str) -> Vec<ChatMessage> {
    script
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (role, content) = entry.split_once(':').unwrap();
            ChatMessage::new(role.parse::<MessageRole>().unwrap(), content).unwrap()
        })
        .collect()
}

#[test_case("user:Hi" ; "single user turn")]
#[test_case("system:S;user:U" ; "explicit system prompt")]
#[test_case("system:S;user:a;assistant:b;user:c" ; "two rounds")]
#[test_case("user:a;assistant:b;user:c" ; "implicit system prompt")]
fn test_alternating_sessions_are_accepted(script: &str) {
    let messages = parse(script);
    for format in [PromptFormat::InstructionTag, PromptFormat::RoleTranscript] {
        assert!(format.format(&messages).is_ok(), "{format:?} rejected {script}");
    }
}

#[test_case("assistant:Hi" ; "assistant first")]
#[test_case("system:S;user:a;user:b" ; "two users in a row")]
#[test_case("system:S;user:a;assistant:b" ; "ends on assistant")]
#[test_case("system:S" ; "system only")]
#[test_case("system:S;system:T;user:a" ; "second system message")]
fn test_malformed_sessions_are_rejected(script: &str) {
    let messages = parse(script);
    for format in [PromptFormat::InstructionTag, PromptFormat::RoleTranscript] {
        assert!(format.format(&messages).is_err(), "{format:?} accepted {script}");
    }
    // Chat endpoints take any shape
    assert!(PromptFormat::TurnList.format(&messages).is_ok());
}

#[test]
fn test_instruction_tag_merges_system_into_first_user_turn() {
    let prompt = PromptFormat::InstructionTag.format(&parse("system:S;user:U")).unwrap();
    let text = prompt.as_text().unwrap();

    assert!(text.starts_with("<s>"));
    assert!(text.contains("[INST]"));
    assert!(text.contains("<<SYS>>\nS\n<</SYS>>\n\nU"));
    assert!(text.ends_with(E_INST));
    assert!(!text.contains("</s>"));
}

#[test]
fn test_role_transcript_defaults_system_prompt() {
    let prompt = PromptFormat::RoleTranscript.format(&parse("user:Hi")).unwrap();
    let text = prompt.as_text().unwrap();

    let first_line = DEFAULT_SYSTEM_PROMPT.lines().next().unwrap();
    assert!(text.starts_with(&format!("System: {first_line}")));
    assert!(text.ends_with("\nUser: Hi\nAssistant: "));
}

#[test]
fn test_role_transcript_rejects_leading_assistant() {
    let err = PromptFormat::RoleTranscript
        .format(&parse("assistant:Hi"))
        .unwrap_err();
    assert_eq!(
        err,
        PromptFormatError::UnexpectedRole {
            position: 1,
            expected: MessageRole::User,
            found: MessageRole::Assistant,
        }
    );
}

#[test]
fn test_formatting_never_mutates_the_session() {
    let messages = parse("user:Hi");
    let before = messages.clone();
    PromptFormat::InstructionTag.format(&messages).unwrap();
    PromptFormat::RoleTranscript.format(&messages).unwrap();
    assert_eq!(messages, before);
}
