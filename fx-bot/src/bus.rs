//! Async message bus between channels and the dialogue.
//!
//! Channels publish into a single inbound queue that the gateway drains;
//! replies fan out to per-channel subscriptions so each channel only sees
//! its own traffic.

use crate::error::{BusError, BusResult};
use crate::events::{InboundMessage, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, trace, warn};

/// Default capacity for message queues.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Message bus shared by the gateway and every channel.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

struct MessageBusInner {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: RwLock<mpsc::Receiver<InboundMessage>>,
    channel_subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<OutboundMessage>>>>,
    capacity: usize,
    stats: RwLock<BusStats>,
}

/// Message bus counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Inbound messages accepted.
    pub inbound_count: u64,
    /// Outbound messages published.
    pub outbound_count: u64,
    /// Outbound messages no subscriber took.
    pub dropped_count: u64,
}

impl MessageBus {
    /// Create a bus with the default queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a bus with the given queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(MessageBusInner {
                inbound_tx,
                inbound_rx: RwLock::new(inbound_rx),
                channel_subscribers: RwLock::new(HashMap::new()),
                capacity,
                stats: RwLock::new(BusStats::default()),
            }),
        }
    }

    /// Queue a message from a channel.
    ///
    /// # Errors
    ///
    /// Fails if the receiving side was dropped.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> BusResult<()> {
        trace!(
            channel = %msg.channel,
            sender = %msg.sender_id,
            "publishing inbound message"
        );

        self.inner
            .inbound_tx
            .send(msg)
            .await
            .map_err(|_| BusError::InboundClosed)?;

        self.inner.stats.write().await.inbound_count += 1;
        Ok(())
    }

    /// Take the next inbound message. `None` once every sender is gone.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inner.inbound_rx.write().await.recv().await
    }

    /// Deliver a message to the subscribers of its channel.
    ///
    /// # Errors
    ///
    /// Fails if the channel has subscribers and every one of them is gone.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> BusResult<()> {
        trace!(
            channel = %msg.channel,
            chat_id = %msg.chat_id,
            "publishing outbound message"
        );

        let mut delivered = false;
        let mut subscribed = false;
        {
            let subscribers = self.inner.channel_subscribers.read().await;
            if let Some(senders) = subscribers.get(&msg.channel) {
                subscribed = !senders.is_empty();
                for sender in senders {
                    if sender.send(msg.clone()).await.is_ok() {
                        delivered = true;
                    } else {
                        debug!(channel = %msg.channel, "channel subscriber disconnected");
                    }
                }
            }
        }

        let mut stats = self.inner.stats.write().await;
        stats.outbound_count += 1;
        if !delivered {
            stats.dropped_count += 1;
            warn!(channel = %msg.channel, "outbound message had no receiver");
        }
        if subscribed && !delivered {
            return Err(BusError::OutboundClosed);
        }
        Ok(())
    }

    /// Subscribe to outbound messages addressed to `channel`.
    pub async fn subscribe_channel(&self, channel: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.inner
            .channel_subscribers
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(tx);

        debug!(channel = %channel, "channel subscriber registered");
        rx
    }

    /// Current counters.
    pub async fn stats(&self) -> BusStats {
        *self.inner.stats.read().await
    }

    /// Lightweight handle for channels that only publish inbound messages.
    #[must_use]
    pub fn inbound_handle(&self) -> InboundHandle {
        InboundHandle {
            tx: self.inner.inbound_tx.clone(),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Publish-only view of the inbound queue.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    tx: mpsc::Sender<InboundMessage>,
}

impl InboundHandle {
    /// Queue a message.
    ///
    /// # Errors
    ///
    /// Fails if the receiving side was dropped.
    pub async fn publish(&self, msg: InboundMessage) -> BusResult<()> {
        self.tx.send(msg).await.map_err(|_| BusError::InboundClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Payload;

    #[tokio::test]
    async fn test_inbound_flow() {
        let bus = MessageBus::new();

        bus.publish_inbound(InboundMessage::text("test", "sender1", "chat1", "/start"))
            .await
            .unwrap();
        bus.inbound_handle()
            .publish(InboundMessage::selection("test", "sender1", "chat1", "base:USD"))
            .await
            .unwrap();

        let first = bus.consume_inbound().await.unwrap();
        assert_eq!(first.payload, Payload::Text("/start".to_string()));
        let second = bus.consume_inbound().await.unwrap();
        assert_eq!(second.payload, Payload::Selection("base:USD".to_string()));
    }

    #[tokio::test]
    async fn test_channel_subscription() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe_channel("telegram").await;

        bus.publish_outbound(OutboundMessage::new("telegram", "chat1", "For Telegram"))
            .await
            .unwrap();
        bus.publish_outbound(OutboundMessage::new("cli", "direct", "For CLI"))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.content, "For Telegram");
        assert!(rx.try_recv().is_err());

        let stats = bus.stats().await;
        assert_eq!(stats.outbound_count, 2);
        assert_eq!(stats.dropped_count, 1);
    }

    #[tokio::test]
    async fn test_dropped_subscriber() {
        let bus = MessageBus::new();
        drop(bus.subscribe_channel("cli").await);

        let result = bus
            .publish_outbound(OutboundMessage::new("cli", "direct", "lost"))
            .await;
        assert!(matches!(result, Err(BusError::OutboundClosed)));
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MessageBus::new();
        let _rx = bus.subscribe_channel("test").await;

        bus.publish_inbound(InboundMessage::text("test", "s", "c", "in"))
            .await
            .unwrap();
        bus.publish_outbound(OutboundMessage::new("test", "c", "out"))
            .await
            .unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.inbound_count, 1);
        assert_eq!(stats.outbound_count, 1);
        assert_eq!(stats.dropped_count, 0);
    }
}
