//! Terminal channel.
//!
//! Replies are printed to stdout with their keyboards listed underneath.
//! Typed lines are sent as text; a line starting with `@` presses the inline
//! button with that token, e.g. `@base:EUR`.

use crate::bus::MessageBus;
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundMessage, Keyboard, OutboundMessage};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

/// Channel name.
pub const CLI_CHANNEL: &str = "cli";

/// CLI channel configuration.
#[derive(Debug, Clone)]
pub struct CliChannelConfig {
    /// Prompt printed before each input line.
    pub prompt: String,
    /// Chat id of the terminal conversation.
    pub chat_id: String,
}

impl Default for CliChannelConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            chat_id: "direct".to_string(),
        }
    }
}

impl CliChannelConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the chat id.
    #[must_use]
    pub fn chat_id(mut self, id: impl Into<String>) -> Self {
        self.chat_id = id.into();
        self
    }
}

/// Stdout side of the terminal conversation.
#[derive(Debug)]
pub struct CliChannel {
    base: Arc<ChannelBase>,
    config: CliChannelConfig,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
}

impl CliChannel {
    /// Create a CLI channel with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CliChannelConfig::default())
    }

    /// Create a CLI channel.
    #[must_use]
    pub fn with_config(config: CliChannelConfig) -> Self {
        Self {
            base: Arc::new(ChannelBase::new(CLI_CHANNEL)),
            config,
            shutdown_tx: RwLock::new(None),
        }
    }

    /// Render a message and its keyboard as terminal text.
    #[must_use]
    pub fn render(msg: &OutboundMessage) -> String {
        let mut out = msg.content.clone();
        match &msg.keyboard {
            Some(Keyboard::Menu(rows)) => {
                for row in rows {
                    let labels: Vec<String> = row.iter().map(|label| format!("[{label}]")).collect();
                    let _ = write!(out, "\n  {}", labels.join(" "));
                }
            }
            Some(Keyboard::Inline(rows)) => {
                for row in rows {
                    let buttons: Vec<String> = row
                        .iter()
                        .map(|button| format!("@{:<12} {}", button.token, button.label))
                        .collect();
                    let _ = write!(out, "\n  {}", buttons.join("  ").trim_end());
                }
            }
            None => {}
        }
        out
    }

    #[allow(clippy::print_stdout)] // CLI channel intentionally prints to stdout
    fn print_message(msg: &OutboundMessage, prompt: &str) {
        println!("\n{}\n", Self::render(msg));
        print!("{prompt}");
        let _ = std::io::stdout().flush();
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let mut outbound_rx = bus.subscribe_channel(CLI_CHANNEL).await;
        let base = Arc::clone(&self.base);
        let prompt = self.config.prompt.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(msg) = outbound_rx.recv() => {
                        Self::print_message(&msg, &prompt);
                        base.record_sent().await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("CLI output handler shutting down");
                        break;
                    }
                }
            }
        });

        self.base.set_state(ChannelState::Running).await;
        info!("CLI channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("CLI channel stopped");
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        Self::print_message(msg, &self.config.prompt);
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

/// Read stdin until EOF or `exit`, publishing every line.
///
/// Output is printed by a started [`CliChannel`] on the same bus.
///
/// # Errors
///
/// Fails if stdin cannot be read or the bus is closed.
#[allow(clippy::print_stdout)] // CLI intentionally prints to stdout
pub async fn run_interactive(bus: &MessageBus, config: &CliChannelConfig) -> ChannelResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type /start to begin, @<token> to press a button, exit to quit.");
    print!("{}", config.prompt);
    let _ = std::io::stdout().flush();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ChannelError::internal(e.to_string()))?
    {
        let trimmed = line.trim();
        if matches!(trimmed, "exit" | "quit" | "/quit") {
            break;
        }
        if trimmed.is_empty() {
            print!("{}", config.prompt);
            let _ = std::io::stdout().flush();
            continue;
        }

        bus.publish_inbound(InboundMessage::cli(&config.chat_id, trimmed))
            .await
            .map_err(|e| ChannelError::internal(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Button;

    #[tokio::test]
    async fn test_cli_channel_lifecycle() {
        let channel = CliChannel::new();
        let bus = MessageBus::new();

        channel.start(&bus).await.unwrap();
        assert!(channel.is_running().await);
        assert_eq!(channel.name(), CLI_CHANNEL);

        channel.stop().await.unwrap();
        assert_eq!(channel.status().await.state, ChannelState::Stopped);
    }

    #[test]
    fn test_config_builder() {
        let config = CliChannelConfig::new().prompt(">> ").chat_id("test");
        assert_eq!(config.prompt, ">> ");
        assert_eq!(config.chat_id, "test");
    }

    #[test]
    fn test_render_menu() {
        let msg = OutboundMessage::new(CLI_CHANNEL, "direct", "Welcome").with_keyboard(Some(
            Keyboard::Menu(vec![vec!["One".to_string()], vec!["Two".to_string()]]),
        ));
        assert_eq!(CliChannel::render(&msg), "Welcome\n  [One]\n  [Two]");
    }

    #[test]
    fn test_render_inline() {
        let button = |token: &str, label: &str| Button {
            token: token.to_string(),
            label: label.to_string(),
        };
        let msg = OutboundMessage::new(CLI_CHANNEL, "direct", "Pick").with_keyboard(Some(
            Keyboard::Inline(vec![vec![button("base:USD", "USD"), button("base:EUR", "EUR")]]),
        ));
        let rendered = CliChannel::render(&msg);
        assert!(rendered.starts_with("Pick\n  @base:USD"));
        assert!(rendered.contains("@base:EUR"));
        assert!(rendered.ends_with("EUR"));
    }
}
