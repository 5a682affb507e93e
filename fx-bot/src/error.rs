//! Unified error types for fx-bot.
//!
//! Every module reports failures through its own small error enum; all of
//! them convert into [`BotError`], which is what the binary and the gateway
//! propagate.

use std::fmt;

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for fx-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Message bus error.
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// Channel error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Session store error.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Exchange rate lookup error.
    #[error("rates: {0}")]
    Rate(#[from] RateError),

    /// Dialogue invariant violation.
    #[error("dialogue: {0}")]
    Dialogue(#[from] DialogueError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Task join error.
    #[error("task: {0}")]
    Task(String),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<tokio::task::JoinError> for BotError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type alias for fx-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Message Bus Errors
// ============================================================================

/// Error type for message bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Failed to send inbound message.
    #[error("inbound channel closed")]
    InboundClosed,

    /// Failed to send outbound message.
    #[error("outbound channel closed")]
    OutboundClosed,
}

/// Result type for message bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the channel.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Failed to send message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Configuration error.
    #[error("config: {0}")]
    Config(String),

    /// Channel is not connected.
    #[error("not connected")]
    NotConnected,

    /// Internal error.
    #[error("{0}")]
    Internal(String),
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing required field.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing field error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Storage Errors
// ============================================================================

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend unavailable.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Create an unavailable error.
    #[inline]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Rate Lookup Errors
// ============================================================================

/// Error type for exchange rate lookups.
///
/// These never reach the user; the provider logs them and reports the rate
/// as unavailable.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    /// Transport failure, including timeouts.
    #[error("request: {0}")]
    Request(String),

    /// Upstream answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Body could not be decoded.
    #[error("decode: {0}")]
    Decode(String),

    /// Body decoded but had no usable rate for the target.
    #[error("no rate for {base} -> {target}")]
    Missing {
        /// Base currency code.
        base: String,
        /// Target currency code.
        target: String,
    },
}

/// Result type for rate lookups.
pub type RateResult<T> = std::result::Result<T, RateError>;

// ============================================================================
// Dialogue Errors
// ============================================================================

/// Invariant violations detected while processing a dialogue event.
#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    /// Stage requires a field that is not set.
    #[error("stage {stage} reached without {field}")]
    MissingField {
        /// Stage name.
        stage: &'static str,
        /// Missing field name.
        field: &'static str,
    },

    /// Base and target were stored equal.
    #[error("base and target are both {0}")]
    SameCurrency(String),

    /// Session store failed.
    #[error("store: {0}")]
    Store(#[from] StorageError),
}

/// Result type for dialogue operations.
pub type DialogueResult<T> = std::result::Result<T, DialogueError>;

// ============================================================================
// Error Context Extension
// ============================================================================

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped as [`BotError::Internal`].
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped as [`BotError::Internal`].
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<BotError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            BotError::Internal(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            BotError::Internal(format!("{}: {}", f(), err))
        })
    }
}

// ============================================================================
// Display Helpers
// ============================================================================

/// A wrapper that displays errors in a user-friendly format.
#[derive(Debug)]
pub struct DisplayError<'a>(pub &'a BotError);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            BotError::Config(e) => write!(f, "Configuration error: {e}"),
            BotError::Channel(e) => write!(f, "Channel error: {e}"),
            BotError::Bus(e) => write!(f, "Message bus error: {e}"),
            BotError::Storage(e) => write!(f, "Storage error: {e}"),
            BotError::Rate(e) => write!(f, "Exchange rate error: {e}"),
            BotError::Dialogue(e) => write!(f, "Dialogue error: {e}"),
            BotError::Io(e) => write!(f, "IO error: {e}"),
            BotError::Json(e) => write!(f, "JSON error: {e}"),
            BotError::Task(e) => write!(f, "Task error: {e}"),
            BotError::Internal(e) => write!(f, "Internal error: {e}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let bot_err: BotError = BusError::InboundClosed.into();
        assert!(matches!(bot_err, BotError::Bus(_)));

        let bot_err: BotError = ChannelError::NotConnected.into();
        assert!(matches!(bot_err, BotError::Channel(_)));

        let dialogue_err: DialogueError = StorageError::unavailable("down").into();
        let bot_err: BotError = dialogue_err.into();
        assert!(matches!(bot_err, BotError::Dialogue(DialogueError::Store(_))));
    }

    #[tokio::test]
    async fn test_join_error_conversion() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err: BotError = handle.await.unwrap_err().into();
        assert!(matches!(err, BotError::Task(_)));
        assert!(DisplayError(&err).to_string().starts_with("Task error:"));
    }

    #[test]
    fn test_error_helpers() {
        let err = BotError::config("invalid value");
        assert!(matches!(err, BotError::Config(ConfigError::Invalid(_))));

        let err = ChannelError::send("failed");
        assert!(matches!(err, ChannelError::SendFailed(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = RateError::Status {
            status: 404,
            body: "unknown base".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404: unknown base");

        let err = DialogueError::MissingField {
            stage: "awaiting_amount",
            field: "base",
        };
        assert_eq!(err.to_string(), "stage awaiting_amount reached without base");
    }

    #[test]
    fn test_context() {
        let res: std::result::Result<(), BusError> = Err(BusError::OutboundClosed);
        let err = res.context("publishing reply").unwrap_err();
        assert_eq!(
            DisplayError(&err).to_string(),
            "Internal error: publishing reply: bus: outbound channel closed"
        );
    }
}
