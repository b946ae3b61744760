//! TensorBin CLI - upload, browse and download model files

mod commands;
mod config;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use commands::{App, Commands};
use config::CliConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tensorbin_http::{
    AuthService, FileService, FileTokenStore, SessionEvent, TensorbinClientBuilder,
};
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "tensorbin")]
#[command(about = "Upload, browse and download model files on TensorBin")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Configuration file (defaults to <config dir>/tensorbin/config.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the configuration
    #[arg(long, global = true, env = "TENSORBIN_API_URL")]
    api_url: Option<String>,

    /// Timeout for each request in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into(), cli.log_file.as_deref())?;

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = Some(timeout);
    }
    config.validate()?;
    debug!(?config, "Loaded configuration");

    let token_path = config.token_path();
    let client = TensorbinClientBuilder::from_config(&config.client_config())
        .token_store(Arc::new(FileTokenStore::open(token_path)))
        .on_session_event(|event| match event {
            SessionEvent::LoginRequired => {
                eprintln!("You are not signed in. Run `tensorbin login` first.");
            }
            SessionEvent::RefreshFailed => {
                eprintln!("Your session has expired. Run `tensorbin login` to sign in again.");
            }
        })
        .build()
        .context("Failed to create API client")?;

    let app = App {
        auth: AuthService::new(client.clone()),
        files: FileService::new(client),
        per_page: config.per_page,
        json: cli.json,
    };

    if let Err(e) = cli.command.execute(&app).await {
        error!("Command failed: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
