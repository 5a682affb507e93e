//! Channel trait and shared channel bookkeeping.
//!
//! A channel adapts one messaging platform to the bus: it publishes user
//! input as [`InboundMessage`](crate::events::InboundMessage)s and renders
//! the outbound messages addressed to it.

use crate::bus::MessageBus;
use crate::config::TelegramConfig;
use crate::error::ChannelResult;
use crate::events::OutboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Not started.
    #[default]
    Stopped,
    /// Starting up.
    Starting,
    /// Connected and relaying messages.
    Running,
    /// Shutting down.
    Stopping,
}

/// Snapshot of a channel's health.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Current state.
    pub state: ChannelState,
    /// Inbound messages relayed.
    pub messages_received: u64,
    /// Outbound messages delivered.
    pub messages_sent: u64,
    /// Most recent error.
    pub last_error: Option<String>,
}

impl ChannelStatus {
    /// Running and no error recorded.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.state == ChannelState::Running && self.last_error.is_none()
    }
}

/// A messaging platform adapter.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name; also the `channel` field of its messages.
    fn name(&self) -> &str;

    /// Connect and start relaying.
    ///
    /// Implementations subscribe to `bus.subscribe_channel(self.name())` for
    /// their outbound messages and spawn whatever background tasks they
    /// need.
    async fn start(&self, bus: &MessageBus) -> ChannelResult<()>;

    /// Stop relaying.
    async fn stop(&self) -> ChannelResult<()>;

    /// Deliver one outbound message directly.
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()>;

    /// Current status.
    async fn status(&self) -> ChannelStatus;

    /// Whether the channel is running.
    async fn is_running(&self) -> bool {
        self.status().await.state == ChannelState::Running
    }
}

/// Owns the registered channels and drives their lifecycle.
pub struct ChannelManager {
    channels: RwLock<Vec<Arc<dyn Channel>>>,
    bus: MessageBus,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Create a manager over `bus`.
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Register a channel.
    pub async fn register(&self, channel: impl Channel + 'static) {
        let channel: Arc<dyn Channel> = Arc::new(channel);
        info!(channel = %channel.name(), "channel registered");
        self.channels.write().await.push(channel);
    }

    /// Start every channel. Returns how many started.
    pub async fn start_all(&self) -> usize {
        let channels = self.channels.read().await;
        let mut started = 0;

        for channel in channels.iter() {
            info!(channel = %channel.name(), "starting channel");
            match channel.start(&self.bus).await {
                Ok(()) => started += 1,
                Err(e) => error!(channel = %channel.name(), error = %e, "failed to start channel"),
            }
        }

        started
    }

    /// Stop every channel.
    pub async fn stop_all(&self) {
        let channels = self.channels.read().await;

        for channel in channels.iter() {
            info!(channel = %channel.name(), "stopping channel");
            if let Err(e) = channel.stop().await {
                error!(channel = %channel.name(), error = %e, "failed to stop channel");
            }
        }
    }

    /// Status of every channel.
    pub async fn status_all(&self) -> Vec<ChannelStatus> {
        let channels = self.channels.read().await;
        let mut statuses = Vec::with_capacity(channels.len());

        for channel in channels.iter() {
            statuses.push(channel.status().await);
        }

        statuses
    }

    /// The shared bus.
    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Number of registered channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// State and counters every channel keeps.
pub struct ChannelBase {
    name: String,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    messages_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

impl ChannelBase {
    /// Create bookkeeping for channel `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    /// Move to `state`.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Count a relayed inbound message.
    pub async fn record_received(&self) {
        self.stats.write().await.messages_received += 1;
    }

    /// Count a delivered outbound message.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Remember and log an error.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Build a status snapshot.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;

        ChannelStatus {
            name: self.name.clone(),
            state,
            messages_received: stats.messages_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
        }
    }
}

/// Who may talk to the bot. Empty lists allow everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    senders: Vec<i64>,
    chats: Vec<i64>,
}

impl Allowlist {
    /// Allow everyone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the Telegram config section, skipping non-numeric ids.
    #[must_use]
    pub fn from_config(config: &TelegramConfig) -> Self {
        let parse = |ids: &[String]| -> Vec<i64> {
            ids.iter()
                .filter_map(|id| match id.trim().parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(%id, "ignoring non-numeric allowlist entry");
                        None
                    }
                })
                .collect()
        };
        Self {
            senders: parse(&config.allow_from),
            chats: parse(&config.allow_chats),
        }
    }

    /// Allow a sender.
    #[must_use]
    pub fn allow_sender(mut self, sender: i64) -> Self {
        self.senders.push(sender);
        self
    }

    /// Allow a chat.
    #[must_use]
    pub fn allow_chat(mut self, chat: i64) -> Self {
        self.chats.push(chat);
        self
    }

    /// Whether a message from `sender` in `chat` is accepted.
    #[must_use]
    pub fn is_allowed(&self, sender: i64, chat: i64) -> bool {
        (self.senders.is_empty() || self.senders.contains(&sender))
            && (self.chats.is_empty() || self.chats.contains(&chat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist_empty() {
        assert!(Allowlist::new().is_allowed(1, 2));
    }

    #[test]
    fn test_allowlist_rules() {
        let list = Allowlist::new().allow_sender(10).allow_sender(11);
        assert!(list.is_allowed(10, 99));
        assert!(!list.is_allowed(12, 99));

        let list = list.allow_chat(-500);
        assert!(list.is_allowed(11, -500));
        assert!(!list.is_allowed(11, -501));
    }

    #[test]
    fn test_allowlist_from_config() {
        let config = TelegramConfig {
            allow_from: vec!["42".to_string(), "bob".to_string()],
            allow_chats: vec![" -100 ".to_string()],
            ..TelegramConfig::default()
        };
        let list = Allowlist::from_config(&config);
        assert_eq!(list, Allowlist::new().allow_sender(42).allow_chat(-100));
    }

    #[tokio::test]
    async fn test_channel_base() {
        let base = ChannelBase::new("test");
        assert_eq!(base.name(), "test");
        assert_eq!(base.state().await, ChannelState::Stopped);

        base.set_state(ChannelState::Running).await;
        base.record_received().await;
        base.record_sent().await;

        let status = base.build_status().await;
        assert_eq!(status.messages_received, 1);
        assert_eq!(status.messages_sent, 1);
        assert!(status.healthy());

        base.record_error("boom").await;
        assert!(!base.build_status().await.healthy());
    }
}
