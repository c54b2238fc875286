//! wslog: follow a live container log stream over WebSocket.

mod app;
mod config;
mod sink;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, OutputKind};

/// Stream container logs from a logging service and print one line per event
#[derive(Parser, Debug)]
#[command(name = "wslog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Full endpoint URL, e.g. wss://sensor.local/logs
    #[arg(long, conflicts_with_all = ["host", "port", "insecure", "path"])]
    url: Option<String>,

    /// Logging service host
    #[arg(long)]
    host: Option<String>,

    /// Logging service port
    #[arg(long)]
    port: Option<u16>,

    /// Use plain ws:// instead of wss://
    #[arg(long)]
    insecure: bool,

    /// Stream path
    #[arg(long)]
    path: Option<String>,

    /// Where to write log lines
    #[arg(long, value_enum)]
    output: Option<OutputKind>,
}

impl Args {
    /// Applies command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.url = Some(url.clone());
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
            config.url = None;
        }
        if let Some(port) = self.port {
            config.port = Some(port);
            config.url = None;
        }
        if self.insecure {
            config.secure = false;
            config.url = None;
        }
        if let Some(path) = &self.path {
            config.path = path.clone();
            config.url = None;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    // Diagnostics go to stderr; stdout carries only log lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting wslog");

    let endpoint = config.endpoint()?;
    tracing::debug!(url = %endpoint, output = ?config.output, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let stats = rt.block_on(app::run(config, endpoint))?;

    tracing::info!(
        lines = stats.lines,
        malformed = stats.malformed,
        "log stream ended"
    );
    Ok(())
}
