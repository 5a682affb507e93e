//! Message events exchanged between channels and the dialogue.
//!
//! Channels turn platform updates into [`InboundMessage`]s and render
//! [`OutboundMessage`]s, including their keyboards, back onto the platform.

use crate::util::generate_message_id;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Typed text, including commands and menu button labels.
    Text(String),
    /// Pressed an inline button; carries the button's token.
    Selection(String),
}

/// An inbound message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Channel identifier (e.g. "telegram", "cli").
    pub channel: String,
    /// Sender's identifier within the channel.
    pub sender_id: String,
    /// Chat identifier.
    pub chat_id: String,
    /// Text or button press.
    pub payload: Payload,
    /// Platform id of the message that carried the pressed button.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Timestamp when the message was received.
    pub timestamp: SystemTime,
}

impl InboundMessage {
    /// Create an inbound message.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            payload,
            message_id: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Create a text message.
    pub fn text(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(channel, sender_id, chat_id, Payload::Text(text.into()))
    }

    /// Create a button press.
    pub fn selection(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self::new(channel, sender_id, chat_id, Payload::Selection(token.into()))
    }

    /// Create a CLI message from a typed line.
    ///
    /// A line starting with `@` presses the button with that token.
    pub fn cli(chat_id: impl Into<String>, line: &str) -> Self {
        let line = line.trim();
        match line.strip_prefix('@') {
            Some(token) => Self::selection("cli", "user", chat_id, token.trim()),
            None => Self::text("cli", "user", chat_id, line),
        }
    }

    /// Attach the id of the message that carried the pressed button.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Session key for this conversation.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }
}

/// An inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Token delivered back when pressed.
    pub token: String,
}

/// Buttons attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyboard {
    /// Persistent reply keyboard; pressing a button sends its label as text.
    Menu(Vec<Vec<String>>),
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<Button>>),
}

impl Keyboard {
    /// Number of buttons.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Menu(rows) => rows.iter().map(Vec::len).sum(),
            Self::Inline(rows) => rows.iter().map(Vec::len).sum(),
        }
    }

    /// Whether there are no buttons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tokens of the inline buttons, in display order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        let rows: &[Vec<Button>] = match self {
            Self::Inline(rows) => rows,
            Self::Menu(_) => &[],
        };
        rows.iter().flatten().map(|button| button.token.as_str())
    }
}

/// An outbound message to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Target channel identifier.
    pub channel: String,
    /// Target chat identifier.
    pub chat_id: String,
    /// Message text.
    pub content: String,
    /// Buttons to show.
    #[serde(default)]
    pub keyboard: Option<Keyboard>,
    /// Edit this platform message instead of sending a new one.
    #[serde(default)]
    pub edit_message_id: Option<String>,
}

impl OutboundMessage {
    /// Create an outbound message.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            keyboard: None,
            edit_message_id: None,
        }
    }

    /// Create a response in the same chat as `msg`.
    pub fn reply_to(msg: &InboundMessage, content: impl Into<String>) -> Self {
        Self::new(msg.channel.clone(), msg.chat_id.clone(), content)
    }

    /// Attach buttons.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Option<Keyboard>) -> Self {
        self.keyboard = keyboard;
        self
    }

    /// Edit an existing message instead of sending a new one.
    #[must_use]
    pub fn editing(mut self, message_id: impl Into<String>) -> Self {
        self.edit_message_id = Some(message_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_text() {
        let msg = InboundMessage::text("telegram", "user123", "chat456", "/start");
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.sender_id, "user123");
        assert_eq!(msg.payload, Payload::Text("/start".to_string()));
        assert_eq!(msg.session_key(), "telegram:chat456");
        assert!(msg.message_id.is_none());
    }

    #[test]
    fn test_cli_line() {
        let msg = InboundMessage::cli("direct", "  @base:EUR ");
        assert_eq!(msg.payload, Payload::Selection("base:EUR".to_string()));
        assert_eq!(msg.session_key(), "cli:direct");

        let msg = InboundMessage::cli("direct", " 50 ");
        assert_eq!(msg.payload, Payload::Text("50".to_string()));
    }

    #[test]
    fn test_outbound_edit() {
        let inbound =
            InboundMessage::selection("telegram", "1", "2", "base:USD").with_message_id("77");
        let keyboard = Keyboard::Inline(vec![vec![Button {
            label: "🇪🇺 EUR".to_string(),
            token: "target:EUR".to_string(),
        }]]);
        let outbound = OutboundMessage::reply_to(&inbound, "Now choose the target currency:")
            .with_keyboard(Some(keyboard))
            .editing("77");

        assert_eq!(outbound.channel, "telegram");
        assert_eq!(outbound.chat_id, "2");
        assert_eq!(outbound.edit_message_id.as_deref(), Some("77"));
        let keyboard = outbound.keyboard.unwrap();
        assert_eq!(keyboard.len(), 1);
        assert_eq!(keyboard.tokens().collect::<Vec<_>>(), vec!["target:EUR"]);
    }

    #[test]
    fn test_menu_keyboard_has_no_tokens() {
        let menu = Keyboard::Menu(vec![vec!["a".to_string()], vec!["b".to_string()]]);
        assert_eq!(menu.len(), 2);
        assert_eq!(menu.tokens().count(), 0);
        assert!(!menu.is_empty());
    }
}
