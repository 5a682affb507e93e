//! FX Bot - a currency conversion chat bot.
//!
//! Users walk through a short dialogue (base currency, target currency,
//! amount) and get the converted value back, priced with a live exchange
//! rate. The same dialogue runs over Telegram and over a local terminal.
//!
//! # Architecture
//!
//! - **Message Bus** ([`bus`]) - Async queue between channels and the dialogue
//! - **Channels** ([`channels`]) - Platform integrations (CLI, Telegram)
//! - **Dialogue** ([`dialogue`]) - Conversation state machine and replies
//! - **Session** ([`session`]) - Per-user dialogue state
//! - **Rates** ([`rates`]) - Exchange rate providers
//! - **Gateway** ([`gateway`]) - Wires channels to the dialogue
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fx_bot::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let controller = DialogueController::new(
//!         Arc::new(MemorySessionStore::new()),
//!         Arc::new(StaticRates::new()),
//!         Arc::new(CurrencyCatalog::builtin()),
//!     );
//!     let replies = controller.handle("cli:direct", DialogueEvent::text("/start")).await;
//!     assert_eq!(replies.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` - Enable Telegram bot support via teloxide (default)

pub mod bus;
pub mod channel;
pub mod channels;
pub mod config;
pub mod currency;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod gateway;
pub mod rates;
pub mod session;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{
        BotError, BusError, BusResult, ChannelError, ChannelResult, ConfigError, ConfigResult,
        DialogueError, DialogueResult, ErrorContext, RateError, RateResult, Result, StorageError,
        StorageResult,
    };

    pub use crate::bus::{BusStats, InboundHandle, MessageBus};

    pub use crate::channel::{
        Allowlist, Channel, ChannelBase, ChannelManager, ChannelState, ChannelStatus,
    };
    pub use crate::channels::{CliChannel, CliChannelConfig, run_interactive};
    #[cfg(feature = "telegram")]
    pub use crate::channels::{TelegramChannel, TelegramChannelConfig};

    pub use crate::config::{
        BotConfig, ConfigIssue, DialogueConfig, IssueLevel, RatesConfig, TelegramConfig,
        config_path, init_config, load_config, load_config_from, save_config,
    };

    pub use crate::currency::{CurrencyCatalog, CurrencyCode, CurrencyEntry, CurrencyInfo};

    pub use crate::dialogue::{
        Command, DialogueController, DialogueEvent, Directive, Selection, SelectionRole,
        transition,
    };

    pub use crate::events::{Button, InboundMessage, Keyboard, OutboundMessage, Payload};

    pub use crate::gateway::{Gateway, GatewayBuilder, GatewayConfig, controller_from_config};

    pub use crate::rates::{ExchangeRateApi, RateProvider, StaticRates};

    pub use crate::session::{MemorySessionStore, Session, SessionStore, Stage};

    pub use crate::util::{generate_message_id, split_into_chunks};
}
