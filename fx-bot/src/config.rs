//! Bot configuration.
//!
//! Configuration is a JSON file (default `~/.fx-bot/config.json`) where every
//! field is optional, overlaid with environment variables. The only value
//! that must come from somewhere is the Telegram bot token, and only when the
//! Telegram channel runs.

use crate::currency::{CurrencyCatalog, CurrencyEntry};
use crate::error::{ConfigError, ConfigResult};
use crate::rates::DEFAULT_API_URL;
use crate::util::home_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Primary environment variable for the bot token.
pub const TOKEN_ENV: &str = "BOT_TOKEN";

/// Fallback environment variable for the bot token.
pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable overriding the rates endpoint.
pub const RATES_URL_ENV: &str = "FX_BOT_RATES_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram channel settings.
    pub telegram: TelegramConfig,
    /// Rate lookup settings.
    pub rates: RatesConfig,
    /// Dialogue settings.
    pub dialogue: DialogueConfig,
    /// Replacement currency list; `None` keeps the built-in catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currencies: Option<Vec<CurrencyEntry>>,
}

/// Telegram channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the channel runs.
    pub enabled: bool,
    /// Bot token; usually supplied through `BOT_TOKEN` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Allowed user ids. Empty means everyone.
    pub allow_from: Vec<String>,
    /// Allowed chat ids. Empty means every chat.
    pub allow_chats: Vec<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            allow_from: Vec::new(),
            allow_chats: Vec::new(),
        }
    }
}

/// Rate lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Endpoint; the base code is appended as a path segment.
    pub api_url: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl RatesConfig {
    /// HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dialogue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Upper bound on one rate lookup, in seconds.
    pub lookup_timeout_secs: u64,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_secs: 10,
        }
    }
}

impl DialogueConfig {
    /// Upper bound on one rate lookup.
    #[must_use]
    pub const fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// Works, but probably not what was intended.
    Warning,
    /// The bot cannot start with this value.
    Error,
}

/// A problem found by [`BotConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.level {
            IssueLevel::Warning => "warning",
            IssueLevel::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

impl BotConfig {
    /// Overlay process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay variables from an arbitrary lookup.
    ///
    /// `BOT_TOKEN` wins over `TELEGRAM_BOT_TOKEN`, which wins over the file.
    /// Empty values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(TOKEN_ENV).or_else(|| non_empty(TELEGRAM_TOKEN_ENV)) {
            self.telegram.token = Some(token);
        }
        if let Some(url) = non_empty(RATES_URL_ENV) {
            self.rates.api_url = url;
        }
    }

    /// The Telegram bot token.
    ///
    /// # Errors
    ///
    /// Fails if no token was configured.
    pub fn telegram_token(&self) -> ConfigResult<&str> {
        self.telegram
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::missing(format!("{TOKEN_ENV} (Telegram bot token)")))
    }

    /// Build the currency catalog this configuration describes.
    ///
    /// # Errors
    ///
    /// Fails if a replacement currency list is invalid.
    pub fn catalog(&self) -> ConfigResult<CurrencyCatalog> {
        self.currencies
            .as_deref()
            .map_or_else(|| Ok(CurrencyCatalog::builtin()), CurrencyCatalog::from_entries)
    }

    /// Check the configuration without starting anything.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.telegram.enabled && self.telegram_token().is_err() {
            issues.push(ConfigIssue::error(
                "telegram.token",
                format!("no bot token; set {TOKEN_ENV}"),
            ));
        }
        for (field, ids) in [
            ("telegram.allow_from", &self.telegram.allow_from),
            ("telegram.allow_chats", &self.telegram.allow_chats),
        ] {
            for id in ids.iter().filter(|id| id.parse::<i64>().is_err()) {
                issues.push(ConfigIssue::warning(
                    field,
                    format!("not a numeric id, ignored: {id}"),
                ));
            }
        }

        if !self.rates.api_url.starts_with("http://") && !self.rates.api_url.starts_with("https://")
        {
            issues.push(ConfigIssue::error(
                "rates.api_url",
                format!("not an http(s) URL: {}", self.rates.api_url),
            ));
        }
        if self.rates.timeout_secs == 0 {
            issues.push(ConfigIssue::error("rates.timeout_secs", "must be positive"));
        }
        if self.dialogue.lookup_timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                "dialogue.lookup_timeout_secs",
                "must be positive",
            ));
        }

        if let Err(e) = self.catalog() {
            issues.push(ConfigIssue::error("currencies", e.to_string()));
        }

        issues
    }

    /// Whether [`validate`](Self::validate) found any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|issue| issue.level == IssueLevel::Error)
    }
}

/// Directory holding the configuration file.
#[must_use]
pub fn config_dir() -> PathBuf {
    home_dir().join(".fx-bot")
}

/// Default configuration file path.
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load the configuration from the default path.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub async fn load_config() -> ConfigResult<BotConfig> {
    load_config_from(&config_path()).await
}

/// Load the configuration from `path`. A missing file yields defaults.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub async fn load_config_from(path: &Path) -> ConfigResult<BotConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            debug!(path = %path.display(), "loaded config");
            Ok(serde_json::from_str(&content)?)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(BotConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Fails on IO or serialization errors.
pub async fn save_config(config: &BotConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// Write a default configuration to the default path.
///
/// # Errors
///
/// Fails on IO or serialization errors.
pub async fn init_config() -> ConfigResult<PathBuf> {
    let path = config_path();
    save_config(&BotConfig::default(), &path).await?;
    Ok(path)
}
