//! Rinq Client CLI Entry Point
//!
//! Connects to a Rinq peer and prints the connection lifecycle.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rinq_client::cli::config::{Config, LoggingConfig};
use rinq_client::connection::subprotocol::Encoding;
use rinq_client::{
    CloseFrame, ConnectionBuilder, ConnectionEvent, ConnectionHandler, Payload, SubprotocolList,
};

#[derive(Parser)]
#[command(name = "rinq-client")]
#[command(author, version, about = "Rinq Client - WebSocket endpoint with subprotocol negotiation")]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, env = "RINQ_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a peer and print lifecycle events
    Connect {
        /// Peer URL, overrides the configured endpoint
        #[arg(short, long)]
        url: Option<String>,

        /// Offered subprotocol, repeatable, most preferred first
        #[arg(short = 'p', long = "subprotocol")]
        subprotocols: Vec<String>,

        /// Handshake timeout in seconds
        #[arg(short, long)]
        timeout_secs: Option<u64>,

        /// Event output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Write a default configuration file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "rinq-client.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_ref())?;
    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Connect {
            url,
            subprotocols,
            timeout_secs,
            output,
        } => {
            if let Some(url) = url {
                config.endpoint.url = url;
            }
            if !subprotocols.is_empty() {
                config.endpoint.subprotocols = subprotocols;
            }
            if let Some(secs) = timeout_secs {
                config.endpoint.connect_timeout_secs = secs;
            }
            connect(&config, output).await?;
        }
        Commands::InitConfig { path, force } => {
            init_config(&path, force)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Events go to stdout, logs to stderr
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => tracing::subscriber::set_global_default(builder.json().finish())?,
        "compact" => tracing::subscriber::set_global_default(builder.compact().finish())?,
        _ => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

async fn connect(config: &Config, output: OutputFormat) -> Result<()> {
    let connection = ConnectionBuilder::from_config(&config.endpoint)
        .context("Invalid endpoint configuration")?
        .build()
        .context("Failed to create connection")?;
    info!(connection_id = %connection.id(), url = %connection.target(), "Connection created");

    let mut handler = ConsoleHandler { output };
    let summary = connection.dispatch(&mut handler).await;

    if !summary.opened {
        bail!(
            "Connection to {} closed before the handshake completed",
            config.endpoint.url
        );
    }

    info!(
        subprotocol = ?summary.subprotocol,
        messages = summary.messages,
        "Connection finished"
    );
    Ok(())
}

/// Prints lifecycle events to stdout
struct ConsoleHandler {
    output: OutputFormat,
}

impl ConsoleHandler {
    fn print_json(&self, event: &ConnectionEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }
    }
}

#[async_trait]
impl ConnectionHandler for ConsoleHandler {
    async fn on_open(&mut self, subprotocol: Option<&str>) {
        match self.output {
            OutputFormat::Text => {
                let encoding = subprotocol
                    .and_then(Encoding::from_subprotocol)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("open {} (encoding: {})", subprotocol.unwrap_or("-"), encoding);
            }
            OutputFormat::Json => self.print_json(&ConnectionEvent::Opened {
                subprotocol: subprotocol.map(str::to_string),
            }),
        }
    }

    async fn on_message(&mut self, payload: Payload) {
        match self.output {
            OutputFormat::Text => match &payload {
                Payload::Text(text) => println!("message text {} bytes: {}", text.len(), text),
                Payload::Binary(data) => println!("message binary {} bytes", data.len()),
            },
            OutputFormat::Json => self.print_json(&ConnectionEvent::Message { payload }),
        }
    }

    async fn on_close(&mut self, frame: Option<&CloseFrame>) {
        match self.output {
            OutputFormat::Text => match frame {
                Some(frame) => println!("close {} {}", frame.code, frame.reason),
                None => println!("close"),
            },
            OutputFormat::Json => self.print_json(&ConnectionEvent::Closed {
                frame: frame.cloned(),
            }),
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    Config::default_config().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn show_version() {
    println!("rinq-client {}", env!("CARGO_PKG_VERSION"));
    println!("WebSocket client for the Rinq protocol");
    println!();
    println!("Subprotocols (in default preference order):");
    for name in SubprotocolList::rinq().iter() {
        println!("  - {}", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_config_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rinq-client.toml");

        init_config(&path, false).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.endpoint.url, "ws://localhost:8081");
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rinq-client.toml");
        std::fs::write(&path, "[endpoint]\nurl = \"ws://keep.me\"\n").unwrap();

        let err = init_config(&path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(Config::load(&path).unwrap().endpoint.url, "ws://keep.me");

        init_config(&path, true).unwrap();
        assert_eq!(Config::load(&path).unwrap().endpoint.url, "ws://localhost:8081");
    }
}
