//! Telegram channel using teloxide.
//!
//! Text messages become text events. Inline button presses arrive as
//! callback queries: the query is acknowledged at once and forwarded as a
//! selection carrying the id of the message the button sat on, so the reply
//! can edit that message in place.
//!
//! # Setup
//!
//! 1. Create a bot via [@BotFather](https://t.me/botfather)
//! 2. Export the token as `BOT_TOKEN` (or put it in `.env`)
//! 3. Run `fx-bot run`

use crate::bus::{InboundHandle, MessageBus};
use crate::channel::{Allowlist, Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::config::BotConfig;
use crate::error::{ChannelError, ChannelResult, ConfigResult};
use crate::events::{Button, InboundMessage, Keyboard, OutboundMessage};
use crate::util::split_into_chunks;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId,
    ReplyMarkup,
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info};

/// Channel name.
pub const TELEGRAM_CHANNEL: &str = "telegram";

/// Telegram's message length limit.
const MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Who may use the bot.
    pub allowlist: Allowlist,
    /// Maximum message length before splitting.
    pub max_message_length: usize,
}

impl std::fmt::Debug for TelegramChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannelConfig")
            .field("token", &"***")
            .field("allowlist", &self.allowlist)
            .field("max_message_length", &self.max_message_length)
            .finish()
    }
}

impl TelegramChannelConfig {
    /// Configuration for `token` that allows everyone.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            allowlist: Allowlist::new(),
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }

    /// Build from the bot configuration.
    ///
    /// # Errors
    ///
    /// Fails if no token is configured.
    pub fn from_config(config: &BotConfig) -> ConfigResult<Self> {
        Ok(Self::new(config.telegram_token()?)
            .with_allowlist(Allowlist::from_config(&config.telegram)))
    }

    /// Restrict who may use the bot.
    #[must_use]
    pub fn with_allowlist(mut self, allowlist: Allowlist) -> Self {
        self.allowlist = allowlist;
        self
    }
}

/// Telegram channel.
pub struct TelegramChannel {
    base: Arc<ChannelBase>,
    config: TelegramChannelConfig,
    bot: RwLock<Option<Bot>>,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
    dispatcher: RwLock<Option<ShutdownToken>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base", &self.base)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a Telegram channel.
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        Self {
            base: Arc::new(ChannelBase::new(TELEGRAM_CHANNEL)),
            config,
            bot: RwLock::new(None),
            shutdown_tx: RwLock::new(None),
            dispatcher: RwLock::new(None),
        }
    }

    fn inline_markup(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(rows.iter().map(|row| {
            row.iter()
                .map(|button| InlineKeyboardButton::callback(&button.label, &button.token))
                .collect::<Vec<_>>()
        }))
    }

    fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
        match keyboard {
            Keyboard::Menu(rows) => KeyboardMarkup::new(rows.iter().map(|row| {
                row.iter().map(KeyboardButton::new).collect::<Vec<_>>()
            }))
            .resize_keyboard()
            .into(),
            Keyboard::Inline(rows) => Self::inline_markup(rows).into(),
        }
    }

    /// Send or edit one outbound message.
    ///
    /// An edit that Telegram refuses (message too old, text unchanged, too
    /// long) falls back to sending a new message.
    async fn deliver(bot: &Bot, msg: &OutboundMessage, max_len: usize) -> ChannelResult<()> {
        let chat_id = ChatId(
            msg.chat_id
                .parse()
                .map_err(|_| ChannelError::send(format!("invalid chat id: {}", msg.chat_id)))?,
        );

        if let Some(message_id) = msg
            .edit_message_id
            .as_deref()
            .and_then(|id| id.parse::<i32>().ok())
        {
            let mut request = bot.edit_message_text(chat_id, MessageId(message_id), &msg.content);
            if let Some(Keyboard::Inline(rows)) = &msg.keyboard {
                request = request.reply_markup(Self::inline_markup(rows));
            }
            match request.await {
                Ok(_) => return Ok(()),
                Err(e) => debug!(error = %e, "edit refused, sending a new message"),
            }
        }

        let chunks = split_into_chunks(&msg.content, max_len);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut request = bot.send_message(chat_id, chunk);
            if i == last {
                if let Some(keyboard) = &msg.keyboard {
                    request = request.reply_markup(Self::reply_markup(keyboard));
                }
            }
            request
                .await
                .map_err(|e| ChannelError::send(e.to_string()))?;
        }

        Ok(())
    }

    async fn publish(
        inbound: &InboundHandle,
        base: &ChannelBase,
        allowlist: &Allowlist,
        user_id: i64,
        chat_id: i64,
        msg: InboundMessage,
    ) {
        if !allowlist.is_allowed(user_id, chat_id) {
            debug!(user_id, chat_id, "update from unauthorized user or chat");
            return;
        }
        base.record_received().await;
        if let Err(e) = inbound.publish(msg).await {
            base.record_error(format!("failed to publish telegram update: {e}"))
                .await;
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let bot = Bot::new(&self.config.token);
        *self.bot.write().await = Some(bot.clone());

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let mut outbound_rx = bus.subscribe_channel(TELEGRAM_CHANNEL).await;
        let bot_for_output = bot.clone();
        let base_for_output = Arc::clone(&self.base);
        let max_len = self.config.max_message_length;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(msg) = outbound_rx.recv() => {
                        match Self::deliver(&bot_for_output, &msg, max_len).await {
                            Ok(()) => base_for_output.record_sent().await,
                            Err(e) => base_for_output.record_error(e.to_string()).await,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Telegram output handler shutting down");
                        break;
                    }
                }
            }
        });

        let inbound = bus.inbound_handle();
        let base = Arc::clone(&self.base);
        let allowlist = self.config.allowlist.clone();

        let message_handler = {
            let (inbound, base, allowlist) = (inbound.clone(), Arc::clone(&base), allowlist.clone());
            Update::filter_message().endpoint(move |msg: Message| {
                let (inbound, base, allowlist) =
                    (inbound.clone(), Arc::clone(&base), allowlist.clone());
                async move {
                    let user_id = msg
                        .from
                        .as_ref()
                        .map_or(0, |u| i64::try_from(u.id.0).unwrap_or_default());
                    let chat_id = msg.chat.id.0;

                    let Some(text) = msg.text() else {
                        debug!(chat_id, "ignoring non-text message");
                        return Ok::<(), teloxide::RequestError>(());
                    };

                    let inbound_msg = InboundMessage::text(
                        TELEGRAM_CHANNEL,
                        user_id.to_string(),
                        chat_id.to_string(),
                        text,
                    );
                    Self::publish(&inbound, &base, &allowlist, user_id, chat_id, inbound_msg)
                        .await;
                    Ok(())
                }
            })
        };

        let callback_handler =
            Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
                let (inbound, base, allowlist) =
                    (inbound.clone(), Arc::clone(&base), allowlist.clone());
                async move {
                    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                        error!(error = %e, "failed to answer callback query");
                    }

                    let (Some(token), Some(message)) = (query.data, query.message) else {
                        debug!("callback query without data or message");
                        return Ok::<(), teloxide::RequestError>(());
                    };

                    let user_id = i64::try_from(query.from.id.0).unwrap_or_default();
                    let chat_id = message.chat().id.0;
                    let inbound_msg = InboundMessage::selection(
                        TELEGRAM_CHANNEL,
                        user_id.to_string(),
                        chat_id.to_string(),
                        token,
                    )
                    .with_message_id(message.id().0.to_string());

                    Self::publish(&inbound, &base, &allowlist, user_id, chat_id, inbound_msg)
                        .await;
                    Ok(())
                }
            });

        let handler = dptree::entry()
            .branch(message_handler)
            .branch(callback_handler);

        let mut dispatcher = Dispatcher::builder(bot, handler).build();
        *self.dispatcher.write().await = Some(dispatcher.shutdown_token());

        tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        self.base.set_state(ChannelState::Running).await;
        info!("Telegram channel started");

        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
        }

        if let Some(token) = self.dispatcher.write().await.take() {
            match token.shutdown() {
                Ok(done) => done.await,
                Err(e) => debug!(error = %e, "dispatcher was not running"),
            }
        }

        *self.bot.write().await = None;

        self.base.set_state(ChannelState::Stopped).await;
        info!("Telegram channel stopped");

        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        let bot = self.bot.read().await;
        let bot = bot.as_ref().ok_or(ChannelError::NotConnected)?;

        Self::deliver(bot, msg, self.config.max_message_length).await?;
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_config_from_bot_config() {
        let mut config = BotConfig::default();
        assert!(TelegramChannelConfig::from_config(&config).is_err());

        config.telegram.token = Some("123:abc".to_string());
        config.telegram.allow_from = vec!["42".to_string()];
        let tg = TelegramChannelConfig::from_config(&config).unwrap();
        assert_eq!(tg.token, "123:abc");
        assert!(tg.allowlist.is_allowed(42, 1));
        assert!(!tg.allowlist.is_allowed(43, 1));
        assert_eq!(tg.max_message_length, MAX_MESSAGE_LENGTH);
        assert!(!format!("{tg:?}").contains("abc"));
    }

    #[test]
    fn test_inline_markup() {
        let rows = vec![vec![
            Button {
                label: "🇺🇸 USD".to_string(),
                token: "base:USD".to_string(),
            },
            Button {
                label: "🇪🇺 EUR".to_string(),
                token: "base:EUR".to_string(),
            },
        ]];
        let markup = TelegramChannel::inline_markup(&rows);
        assert_eq!(markup.inline_keyboard.len(), 1);
        let first = &markup.inline_keyboard[0][0];
        assert_eq!(first.text, "🇺🇸 USD");
        assert!(matches!(
            &first.kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "base:USD"
        ));
    }

    #[test]
    fn test_reply_markup_kinds() {
        let menu = Keyboard::Menu(vec![vec!["Enter your currency".to_string()]]);
        assert!(matches!(
            TelegramChannel::reply_markup(&menu),
            ReplyMarkup::Keyboard(_)
        ));

        let inline = Keyboard::Inline(vec![]);
        assert!(matches!(
            TelegramChannel::reply_markup(&inline),
            ReplyMarkup::InlineKeyboard(_)
        ));
    }

    #[tokio::test]
    async fn test_send_requires_start() {
        let channel = TelegramChannel::new(TelegramChannelConfig::new("123:abc"));
        let result = channel
            .send(&OutboundMessage::new(TELEGRAM_CHANNEL, "1", "hi"))
            .await;
        assert!(matches!(result, Err(ChannelError::NotConnected)));
        assert_eq!(channel.status().await.state, ChannelState::Stopped);
    }
}
