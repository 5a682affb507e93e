//! FX Bot CLI - currency conversion chat bot.
//!
//! Runs the bot on Telegram or in the terminal, and exposes a few one-shot
//! helpers for checking rates and configuration.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Args, Parser, Subcommand};
use fx_bot::channels::{CliChannelConfig, run_interactive};
use fx_bot::config::{BotConfig, IssueLevel, config_path, init_config, load_config_from};
use fx_bot::currency::CurrencyCode;
use fx_bot::dialogue::{conversion_line, parse_amount};
use fx_bot::error::{BotError, DisplayError, ErrorContext, Result};
use fx_bot::gateway::GatewayBuilder;
use fx_bot::rates::{ExchangeRateApi, convert};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// FX Bot - convert currencies from a chat
#[derive(Parser)]
#[command(name = "fx-bot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "FX_BOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitArgs),

    /// Run the bot on Telegram
    Run(RunArgs),

    /// Talk to the bot in this terminal
    Chat(ChatArgs),

    /// Look up one exchange rate and exit
    Rate(RateArgs),

    /// List the currencies offered on the keyboard
    Currencies,

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// Also serve the dialogue on this terminal
    #[arg(long)]
    cli: bool,
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Prompt printed before each input line
    #[arg(short, long, default_value = "> ")]
    prompt: String,
}

/// Arguments for the rate command
#[derive(Args)]
struct RateArgs {
    /// Base currency code
    base: String,

    /// Target currency code
    target: String,

    /// Amount to convert
    #[arg(default_value = "1")]
    amount: String,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", DisplayError(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "fx_bot={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(config_path);
    match cli.command {
        Commands::Init(args) => cmd_init(args, path).await,
        Commands::Run(args) => cmd_run(args, path).await,
        Commands::Chat(args) => cmd_chat(args, path).await,
        Commands::Rate(args) => cmd_rate(args, path).await,
        Commands::Currencies => cmd_currencies(path).await,
        Commands::Config(args) => cmd_config(args, path).await,
    }
}

/// Load the file at `path`, then overlay the environment.
async fn load(path: &Path) -> Result<BotConfig> {
    let mut config = load_config_from(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

/// Print validation issues and fail if any of them is fatal.
fn check(config: &BotConfig) -> Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.level {
            IssueLevel::Warning => tracing::warn!("{issue}"),
            IssueLevel::Error => tracing::error!("{issue}"),
        }
    }
    if issues.iter().any(|issue| issue.level == IssueLevel::Error) {
        return Err(BotError::config("invalid configuration"));
    }
    Ok(())
}

/// Initialize configuration.
async fn cmd_init(args: InitArgs, path: PathBuf) -> Result<()> {
    if path.exists() && !args.force {
        println!("Configuration already exists at: {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    let written = if path == config_path() {
        init_config().await?
    } else {
        fx_bot::config::save_config(&BotConfig::default(), &path).await?;
        path
    };

    println!("Configuration created: {}", written.display());
    println!();
    println!("Next steps:");
    println!("  1. export BOT_TOKEN=<telegram bot token>");
    println!("  2. fx-bot run");

    Ok(())
}

/// Run the bot on Telegram.
async fn cmd_run(args: RunArgs, path: PathBuf) -> Result<()> {
    let config = load(&path).await?;
    check(&config)?;

    tracing::info!("Starting FX Bot...");

    let cli_config = CliChannelConfig::default();
    let gateway = GatewayBuilder::new()
        .enable_telegram(config.telegram.enabled)
        .enable_cli(args.cli)
        .cli_config(cli_config.clone())
        .bot_config(config)
        .build()?;

    if args.cli {
        return serve_terminal(gateway, &cli_config).await;
    }

    println!("Bot running. Press Ctrl+C to stop.\n");
    gateway.run().await
}

/// Run the dialogue in this terminal only.
async fn cmd_chat(args: ChatArgs, path: PathBuf) -> Result<()> {
    let mut config = load(&path).await?;
    config.telegram.enabled = false;
    check(&config)?;

    let cli_config = CliChannelConfig::new().prompt(args.prompt);
    let gateway = GatewayBuilder::new()
        .enable_telegram(false)
        .enable_cli(true)
        .cli_config(cli_config.clone())
        .bot_config(config)
        .build()?;

    println!("FX Bot Chat | type 'exit' to quit\n");
    serve_terminal(gateway, &cli_config).await
}

/// Run `gateway` in the background and feed it stdin until the user quits.
async fn serve_terminal(
    gateway: fx_bot::gateway::Gateway,
    cli_config: &CliChannelConfig,
) -> Result<()> {
    let gateway = Arc::new(gateway);
    let background = Arc::clone(&gateway);
    let handle = tokio::spawn(async move { background.run().await });

    let input = run_interactive(gateway.bus(), cli_config).await;

    gateway.shutdown();
    handle.await??;
    input.map_err(BotError::from)
}

/// Print one conversion using the live rate.
async fn cmd_rate(args: RateArgs, path: PathBuf) -> Result<()> {
    let config = load(&path).await?;

    let parse = |input: &str| {
        CurrencyCode::parse(input)
            .ok_or_else(|| BotError::config(format!("not a currency code: {input}")))
    };
    let base = parse(&args.base)?;
    let target = parse(&args.target)?;
    let amount = parse_amount(&args.amount)
        .ok_or_else(|| BotError::config(format!("not a positive amount: {}", args.amount)))?;

    let api = ExchangeRateApi::from_config(&config.rates);
    let rate = api.try_fetch_rate(base, target).await?;
    let result = convert(amount, rate)
        .ok_or_else(|| BotError::internal("conversion result out of range"))?;

    println!("{}", conversion_line(amount, base, result, target));
    println!("rate: {rate}");
    Ok(())
}

/// List the keyboard currencies.
async fn cmd_currencies(path: PathBuf) -> Result<()> {
    let config = load(&path).await?;
    let catalog = config.catalog()?;

    for info in catalog.iter() {
        println!("{}  {}", info.button_label(), info.name);
    }
    Ok(())
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, path: PathBuf) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            let mut config = load(&path).await?;
            if config.telegram.token.is_some() {
                config.telegram.token = Some("***".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Validate => {
            let config = load(&path).await?;
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            }
            for issue in &issues {
                println!("{issue}");
            }
            if config.has_errors() {
                return Err(BotError::config("invalid configuration"));
            }
        }
    }

    Ok(())
}
