//! Gateway service for running the complete bot.
//!
//! The gateway owns the message bus and the channels, and drains the
//! inbound queue into the [`DialogueController`].
//!
//! Each chat gets a worker that applies its events strictly in arrival
//! order, so a button press followed by typed text is never swapped. Rate
//! lookups are handed off to their own task once the session is committed:
//! a slow lookup holds up neither other chats nor the next event in the
//! same chat.

use crate::bus::MessageBus;
use crate::channel::{ChannelManager, ChannelStatus};
use crate::channels::{CliChannel, CliChannelConfig};
use crate::config::BotConfig;
use crate::dialogue::{DialogueController, DialogueEvent, Directive, Handled};
use crate::error::{ChannelError, Result};
use crate::events::{InboundMessage, OutboundMessage};
use crate::rates::ExchangeRateApi;
use crate::session::MemorySessionStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, RwLock, mpsc};
use tracing::{debug, error, info};

#[cfg(feature = "telegram")]
use crate::channels::{TelegramChannel, TelegramChannelConfig};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bot configuration.
    pub bot_config: BotConfig,
    /// Run the Telegram channel.
    pub enable_telegram: bool,
    /// Run the CLI channel.
    pub enable_cli: bool,
    /// CLI channel settings.
    pub cli: CliChannelConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bot_config: BotConfig::default(),
            enable_telegram: true,
            enable_cli: false,
            cli: CliChannelConfig::default(),
        }
    }
}

/// Runs the channels and the dialogue.
pub struct Gateway {
    config: GatewayConfig,
    bus: MessageBus,
    channel_manager: ChannelManager,
    controller: Arc<DialogueController>,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway around `controller`.
    #[must_use]
    pub fn new(controller: Arc<DialogueController>, config: GatewayConfig) -> Self {
        let bus = MessageBus::new();
        Self {
            channel_manager: ChannelManager::new(bus.clone()),
            bus,
            controller,
            config,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Gateway configuration.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The message bus.
    #[must_use]
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// The channel manager.
    #[must_use]
    pub const fn channel_manager(&self) -> &ChannelManager {
        &self.channel_manager
    }

    /// The dialogue controller.
    #[must_use]
    pub const fn controller(&self) -> &Arc<DialogueController> {
        &self.controller
    }

    async fn setup_channels(&self) -> Result<()> {
        if self.config.enable_cli {
            self.channel_manager
                .register(CliChannel::with_config(self.config.cli.clone()))
                .await;
        }

        if self.config.enable_telegram {
            self.setup_telegram().await?;
        }

        Ok(())
    }

    #[cfg(feature = "telegram")]
    async fn setup_telegram(&self) -> Result<()> {
        let config = TelegramChannelConfig::from_config(&self.config.bot_config)?;
        self.channel_manager
            .register(TelegramChannel::new(config))
            .await;
        Ok(())
    }

    #[cfg(not(feature = "telegram"))]
    #[allow(clippy::unused_async)]
    async fn setup_telegram(&self) -> Result<()> {
        Err(crate::error::BotError::config(
            "built without the `telegram` feature",
        ))
    }

    /// Run until Ctrl+C or [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Fails if a channel cannot be configured or none of them starts.
    pub async fn run(&self) -> Result<()> {
        let shutdown = Arc::clone(&self.shutdown);
        self.run_until(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => info!("interrupt received"),
                    Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
                },
                () = shutdown.notified() => {}
            }
        })
        .await
    }

    /// Run until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Fails if a channel cannot be configured or none of them starts.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.setup_channels().await?;

        let registered = self.channel_manager.channel_count().await;
        let started = self.channel_manager.start_all().await;
        if registered > 0 && started == 0 {
            return Err(ChannelError::start("no channel could be started").into());
        }

        *self.running.write().await = true;
        info!(channels = started, "gateway started");

        let mut queues = HashMap::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                msg = self.bus.consume_inbound() => match msg {
                    Some(msg) => self.enqueue(&mut queues, msg),
                    None => break,
                },
            }
        }
        drop(queues);

        info!("gateway stopping");
        self.channel_manager.stop_all().await;
        *self.running.write().await = false;

        let stats = self.bus.stats().await;
        info!(
            inbound = stats.inbound_count,
            outbound = stats.outbound_count,
            dropped = stats.dropped_count,
            "gateway stopped"
        );
        Ok(())
    }

    /// Ask a running gateway to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Hand `msg` to the worker for its chat, starting one if needed.
    fn enqueue(&self, queues: &mut HashMap<String, SessionQueue>, msg: InboundMessage) {
        if queues.len() >= QUEUE_PRUNE_THRESHOLD {
            queues.retain(|_, queue| queue.is_busy());
        }

        let key = msg.session_key();
        if queues.get(&key).is_none_or(|queue| queue.tx.is_closed()) {
            let queue = self.spawn_worker(&key);
            queues.insert(key.clone(), queue);
        }
        let Some(queue) = queues.get(&key) else {
            return;
        };

        queue.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = queue.tx.send(msg) {
            queue.pending.fetch_sub(1, Ordering::AcqRel);
            error!(session = %key, error = %e, "session worker is gone, dropping message");
        }
    }

    fn spawn_worker(&self, key: &str) -> SessionQueue {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundMessage>();
        let pending = Arc::new(AtomicUsize::new(0));

        let controller = Arc::clone(&self.controller);
        let bus = self.bus.clone();
        let counter = Arc::clone(&pending);
        debug!(session = %key, "starting session worker");
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                Self::dispatch(&controller, &bus, msg).await;
                counter.fetch_sub(1, Ordering::AcqRel);
            }
        });

        SessionQueue { tx, pending }
    }

    /// Apply one inbound message to its session and publish the replies.
    ///
    /// Returns once the session is updated. A rate lookup continues in a
    /// task of its own and publishes its result when done.
    pub async fn dispatch(
        controller: &Arc<DialogueController>,
        bus: &MessageBus,
        msg: InboundMessage,
    ) {
        let session = msg.session_key();
        debug!(session = %session, payload = ?msg.payload, "dispatching");

        match controller
            .begin(&session, DialogueEvent::from(msg.payload.clone()))
            .await
        {
            Handled::Done(directives) => Self::publish(bus, &msg, directives).await,
            Handled::Lookup(pending) => {
                let controller = Arc::clone(controller);
                let bus = bus.clone();
                tokio::spawn(async move {
                    let directives = controller.finish(pending).await;
                    Self::publish(&bus, &msg, directives).await;
                });
            }
        }
    }

    async fn publish(bus: &MessageBus, msg: &InboundMessage, directives: Vec<Directive>) {
        for outbound in Self::render(msg, directives) {
            if let Err(e) = bus.publish_outbound(outbound).await {
                error!(chat = %msg.chat_id, error = %e, "failed to publish reply");
            }
        }
    }

    /// Turn directives into messages for the chat `msg` came from.
    ///
    /// Edits target the message that carried the pressed button; without
    /// one they become plain replies.
    #[must_use]
    pub fn render(msg: &InboundMessage, directives: Vec<Directive>) -> Vec<OutboundMessage> {
        directives
            .into_iter()
            .map(|directive| match directive {
                Directive::Reply { text, keyboard } => {
                    OutboundMessage::reply_to(msg, text).with_keyboard(keyboard)
                }
                Directive::Edit { text, keyboard } => {
                    let reply = OutboundMessage::reply_to(msg, text).with_keyboard(keyboard);
                    match &msg.message_id {
                        Some(id) => reply.editing(id.clone()),
                        None => reply,
                    }
                }
            })
            .collect()
    }

    /// Whether the dispatch loop is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Status of every channel.
    pub async fn status(&self) -> Vec<ChannelStatus> {
        self.channel_manager.status_all().await
    }
}

/// Session workers kept before idle ones are stopped.
const QUEUE_PRUNE_THRESHOLD: usize = 1024;

/// Inbound queue of one chat's worker.
struct SessionQueue {
    tx: mpsc::UnboundedSender<InboundMessage>,
    /// Messages sent but not yet fully applied.
    pending: Arc<AtomicUsize>,
}

impl SessionQueue {
    fn is_busy(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }
}

/// Builder for a [`Gateway`].
#[derive(Debug, Default)]
pub struct GatewayBuilder {
    controller: Option<Arc<DialogueController>>,
    config: GatewayConfig,
}

impl GatewayBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this controller instead of one built from the configuration.
    #[must_use]
    pub fn controller(mut self, controller: Arc<DialogueController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Set the bot configuration.
    #[must_use]
    pub fn bot_config(mut self, config: BotConfig) -> Self {
        self.config.bot_config = config;
        self
    }

    /// Enable or disable the Telegram channel.
    #[must_use]
    pub const fn enable_telegram(mut self, enable: bool) -> Self {
        self.config.enable_telegram = enable;
        self
    }

    /// Enable or disable the CLI channel.
    #[must_use]
    pub const fn enable_cli(mut self, enable: bool) -> Self {
        self.config.enable_cli = enable;
        self
    }

    /// Settings for the CLI channel.
    #[must_use]
    pub fn cli_config(mut self, config: CliChannelConfig) -> Self {
        self.config.cli = config;
        self
    }

    /// Build the gateway.
    ///
    /// Without an explicit controller, one is assembled from the
    /// configuration: in-memory sessions, the HTTP rate client and the
    /// configured catalog.
    ///
    /// # Errors
    ///
    /// Fails if the configured currency list is invalid.
    pub fn build(self) -> Result<Gateway> {
        let controller = match self.controller {
            Some(controller) => controller,
            None => Arc::new(controller_from_config(&self.config.bot_config)?),
        };
        Ok(Gateway::new(controller, self.config))
    }
}

/// Assemble the production controller described by `config`.
///
/// # Errors
///
/// Fails if the configured currency list is invalid.
pub fn controller_from_config(config: &BotConfig) -> Result<DialogueController> {
    let catalog = config.catalog()?;
    Ok(DialogueController::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(ExchangeRateApi::from_config(&config.rates)),
        Arc::new(catalog),
    )
    .with_config(&config.dialogue))
}
