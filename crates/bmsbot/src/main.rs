//! bmsbot - chat bridge for BMS health
//!
//! Streams health transitions from the BMS change feed into chat channels
//! and answers health queries from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bms_router::{LogNotifier, Notifier};
use bmsbot::commands::CommandRegistry;
use bmsbot::config::{BotConfig, SAMPLE_CONFIG};
use bmsbot::{build_consumer, build_router, HttpHealthSource, SlackNotifier};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bmsbot")]
#[command(about = "Chat bridge for BMS health")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream health transitions to chat
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "bmsbot.toml")]
        config: PathBuf,

        /// Slack bot token; transitions are only logged when absent
        #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
        slack_token: Option<String>,

        /// Channel that receives every transition, overriding the file
        #[arg(long)]
        alert_channel: Option<String>,
    },

    /// Print the health of everything, a pattern, or one resource
    Health {
        /// Resource name or pattern
        target: Option<String>,

        /// Path to config file
        #[arg(short, long, default_value = "bmsbot.toml")]
        config: PathBuf,
    },

    /// Answer a chat mention, e.g. `ask "<@U123> health of tenant1-prod"`
    Ask {
        /// Mention text
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,

        /// Path to config file
        #[arg(short, long, default_value = "bmsbot.toml")]
        config: PathBuf,
    },

    /// Answer a pick from the overview's select menu
    Select {
        /// Selected option value (a resource name)
        value: String,

        /// Path to config file
        #[arg(short, long, default_value = "bmsbot.toml")]
        config: PathBuf,
    },

    /// Validate a config file
    CheckConfig {
        /// Path to config file
        #[arg(short, long, default_value = "bmsbot.toml")]
        config: PathBuf,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "bmsbot.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Run {
            config,
            slack_token,
            alert_channel,
        } => {
            run_bot(config, slack_token, alert_channel).await?;
        }

        Commands::Health { target, config } => {
            health(&config, target.as_deref()).await?;
        }

        Commands::Ask { text, config } => {
            ask(&config, &text.join(" ")).await?;
        }

        Commands::Select { value, config } => {
            select(&config, &value).await?;
        }

        Commands::CheckConfig { config } => {
            check_config(&config)?;
        }

        Commands::InitConfig { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

/// Crates whose logs are shown at `info` unless `RUST_LOG` says otherwise.
const LOG_TARGETS: &[&str] = &["bmsbot", "bms_router", "bms_proto"];

fn log_filter() -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}=info").parse()?);
    }
    Ok(filter)
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = log_filter()?;

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }

    Ok(())
}

async fn run_bot(
    config_path: PathBuf,
    slack_token: Option<String>,
    alert_channel: Option<String>,
) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting bmsbot");

    let mut config = BotConfig::from_file(&config_path)?;
    if alert_channel.is_some() {
        config.alert_channel = alert_channel;
        config.validate()?;
    }
    info!(
        source = %config.source,
        routes = config.route_specs().len(),
        "loaded config"
    );

    let notifier: Arc<dyn Notifier> = match slack_token {
        Some(token) => Arc::new(SlackNotifier::new(&config.slack.api_base, token)?),
        None => {
            warn!("no slack token configured, transitions will only be logged");
            Arc::new(LogNotifier::default())
        }
    };

    let router = Arc::new(build_router(&config, notifier)?);
    let source = Arc::new(HttpHealthSource::new(&config.source)?);
    let mut consumer = build_consumer(&config, source, router)?;

    info!(url = %consumer.url(), "consuming change feed");
    tokio::select! {
        result = consumer.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}

fn command_registry(config_path: &Path) -> anyhow::Result<CommandRegistry> {
    let config = BotConfig::from_file(config_path)?;
    let source = Arc::new(HttpHealthSource::new(&config.source)?);
    Ok(CommandRegistry::new(source))
}

async fn health(config_path: &Path, target: Option<&str>) -> anyhow::Result<()> {
    let reply = command_registry(config_path)?.health(target).await;
    println!("{}", reply.render_text());

    Ok(())
}

async fn ask(config_path: &Path, text: &str) -> anyhow::Result<()> {
    let reply = command_registry(config_path)?.dispatch(text).await;
    println!("{}", reply.render_text());

    Ok(())
}

async fn select(config_path: &Path, value: &str) -> anyhow::Result<()> {
    let reply = command_registry(config_path)?.select_action(value).await;
    println!("{}", reply.render_text());

    Ok(())
}

fn check_config(config_path: &Path) -> anyhow::Result<()> {
    let config = BotConfig::from_file(config_path)?;

    println!("Config OK: {}", config_path.display());
    println!("  source:         {}", config.source);
    println!("  accepted kinds: {}", config.accepted_kinds.join(", "));
    println!(
        "  reconnect:      {}s .. {}s",
        config.reconnect.initial_wait_secs, config.reconnect.max_wait_secs
    );
    println!("  routes:         {}", config.route_specs().len());

    Ok(())
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    std::fs::write(output, SAMPLE_CONFIG)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Edit the routes, export SLACK_BOT_TOKEN, then run:");
    println!("  bmsbot run --config {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_joins_mention_words() {
        let cli = Cli::try_parse_from(["bmsbot", "ask", "<@U123>", "health", "of", "tenant1-prod"])
            .unwrap();
        let Commands::Ask { text, config } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(text.join(" "), "<@U123> health of tenant1-prod");
        assert_eq!(config, PathBuf::from("bmsbot.toml"));
    }

    #[test]
    fn test_ask_requires_text() {
        assert!(Cli::try_parse_from(["bmsbot", "ask"]).is_err());
    }

    #[test]
    fn test_select_takes_value() {
        let cli = Cli::try_parse_from(["bmsbot", "select", "tenant1-dev", "-c", "bot.toml"]).unwrap();
        let Commands::Select { value, config } = cli.command else {
            panic!("expected select");
        };
        assert_eq!(value, "tenant1-dev");
        assert_eq!(config, PathBuf::from("bot.toml"));
    }

    #[test]
    fn test_log_filter_covers_every_crate() {
        let filter = log_filter().unwrap().to_string();
        for target in LOG_TARGETS {
            assert!(filter.contains(&format!("{target}=info")), "{filter}");
        }
    }
}
