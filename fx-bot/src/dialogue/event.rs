//! Dialogue input: commands, button selections and free text.

use crate::currency::CurrencyCode;
use crate::events::Payload;
use std::fmt;

/// Main-menu label that starts a conversion from the currency keyboard.
pub const LIST_BUTTON: &str = "Selection of popular currencies";

/// Main-menu label that starts a conversion with typed codes.
pub const MANUAL_BUTTON: &str = "Enter your currency";

/// One inbound event for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueEvent {
    /// Typed text.
    Text(String),
    /// Pressed button token, e.g. `base:USD`.
    Selection(String),
}

impl DialogueEvent {
    /// Text event.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Selection event.
    pub fn selection(token: impl Into<String>) -> Self {
        Self::Selection(token.into())
    }
}

impl From<Payload> for DialogueEvent {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Self::Text(text),
            Payload::Selection(token) => Self::Selection(token),
        }
    }
}

/// Commands accepted in every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start`, `/restart`.
    Start,
    /// `/list` or the list menu button.
    List,
    /// `/manual` or the manual menu button.
    Manual,
    /// `/cancel`.
    Cancel,
    /// `/help`.
    Help,
}

impl Command {
    /// Recognize a command in typed text.
    ///
    /// Slash commands may carry a `@botname` suffix and trailing arguments,
    /// both ignored. Menu labels must match exactly after trimming.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            LIST_BUTTON => return Some(Self::List),
            MANUAL_BUTTON => return Some(Self::Manual),
            _ => {}
        }

        let word = text.strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split_once('@').map_or(word, |(name, _)| name);
        match name.to_ascii_lowercase().as_str() {
            "start" | "restart" => Some(Self::Start),
            "list" => Some(Self::List),
            "manual" => Some(Self::Manual),
            "cancel" => Some(Self::Cancel),
            "help" => Some(Self::Help),
            _ => None,
        }
    }

    /// Whether the command abandons any conversion in progress.
    #[must_use]
    pub const fn resets(self) -> bool {
        !matches!(self, Self::Help)
    }
}

/// Which currency a keyboard was built to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionRole {
    /// The currency converted from.
    Base,
    /// The currency converted to.
    Target,
}

impl SelectionRole {
    /// Token prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Target => "target",
        }
    }
}

/// A decoded button token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Keyboard role.
    pub role: SelectionRole,
    /// Chosen currency.
    pub code: CurrencyCode,
}

impl Selection {
    /// Create a selection.
    #[must_use]
    pub const fn new(role: SelectionRole, code: CurrencyCode) -> Self {
        Self { role, code }
    }

    /// Decode a `role:CODE` token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let (role, code) = token.trim().split_once(':')?;
        let role = match role {
            "base" => SelectionRole::Base,
            "target" => SelectionRole::Target,
            _ => return None,
        };
        Some(Self::new(role, CurrencyCode::parse(code)?))
    }

    /// Encode as a token.
    #[must_use]
    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role.as_str(), self.code)
    }
}
