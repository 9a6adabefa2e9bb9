//! keepsafed: keepsafe vault server
//!
//! Usage:
//!   keepsafed [--config /etc/keepsafe/config.toml] [--log info] [--log-format json]

use anyhow::Result;
use clap::{Parser, ValueEnum};
use keepsafe_core::config::KeepsafeConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "keepsafed", version, about = "keepsafe vault server")]
struct Cli {
    /// Path to keepsafe configuration file
    #[arg(
        long,
        short = 'c',
        env = "KEEPSAFE_CONFIG",
        default_value = "/etc/keepsafe/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to server.log_level
    #[arg(long, env = "KEEPSAFE_LOG")]
    log: Option<String>,

    /// Log format; defaults to server.log_format
    #[arg(long, env = "KEEPSAFE_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config comes first so its log settings can apply; its warnings wait
    // until a subscriber is installed
    let (config, warnings) = KeepsafeConfig::load_deferred(&cli.config)?;

    let level = cli.log.as_deref().unwrap_or(&config.server.log_level);
    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.server.log_format.eq_ignore_ascii_case("text") {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    });
    init_logging(level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        config_found = cli.config.exists(),
        "keepsafed starting"
    );
    for w in &warnings {
        w.log();
    }

    keepsafed::daemon::run(config).await
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
