//! Conversation message model and the flattened transport form.

use serde::{Deserialize, Serialize};

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One part of a message body. Only text parts carry prompt content; other
/// part kinds (reasoning traces, attachments from newer builds) are carried
/// through but never flattened into the wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessagePart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "reasoning")]
    Reasoning { text: String },
    #[serde(other)]
    Unknown,
}

/// A conversation message as held by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    /// Plain-text parts joined with `\n`. Reasoning and unknown parts are
    /// excluded.
    pub fn flat_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Minimal role + flattened-text form sent to the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.flat_text(),
        }
    }
}

/// Extract the prompt for a send: scan newest to oldest for the first
/// user-authored message, flatten its text parts, trim. `None` when no user
/// message exists or its text is empty.
pub fn latest_user_text(messages: &[ChatMessage]) -> Option<String> {
    let message = messages.iter().rev().find(|m| m.role == Role::User)?;
    let text = message.flat_text().trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_user_text_picks_most_recent_user_message() {
        let messages = vec![
            ChatMessage::user_text("first"),
            ChatMessage {
                role: Role::Assistant,
                parts: vec![MessagePart::Text { text: "reply".into() }],
            },
            ChatMessage::user_text("second"),
        ];
        assert_eq!(latest_user_text(&messages).as_deref(), Some("second"));
    }

    #[test]
    fn test_latest_user_text_joins_parts_and_trims() {
        let messages = vec![ChatMessage {
            role: Role::User,
            parts: vec![
                MessagePart::Text { text: "  line one".into() },
                MessagePart::Text { text: "line two  ".into() },
            ],
        }];
        assert_eq!(
            latest_user_text(&messages).as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn test_latest_user_text_ignores_reasoning_only_message() {
        let messages = vec![ChatMessage {
            role: Role::User,
            parts: vec![MessagePart::Reasoning { text: "internal".into() }],
        }];
        assert_eq!(latest_user_text(&messages), None);
    }

    #[test]
    fn test_wire_message_flattens_text() {
        let message = ChatMessage::user_text("Hello");
        let wire = WireMessage::from(&message);
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "Hello");
    }
}
