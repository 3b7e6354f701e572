//! wsgate: WebSocket gateway
//!
//! Serves WebSocket connections through the connection adapter and the
//! default dispatcher. Lifecycle observers are registered as extensions at
//! start-up; the application handler echoes every frame back.
//!
//! Usage:
//!   wsgate                                         # Default port 7070
//!   wsgate --port 8080 --idle-timeout 30           # Close connections idle for 30s
//!   wsgate --config wsgate.json                    # Init params from a JSON object
//!   wsgate --init-param websocket.max-buffer-size-bytes=65536

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;
use wsgate_extension::{CapabilityProcessor, ExtensionLoader, Framework, Marker, ProcessorTable};
use wsgate_protocol::{ConfigError, InitParams, keys};
use wsgate_server::{Dispatcher, EchoHandler, LifecycleObserverCapability, LoggingObserver, OBSERVER_MARKER};
use wsgate_transport::{AdapterConfig, TransportConfig, TransportServer};

#[derive(Parser, Debug)]
#[command(name = "wsgate", about = "wsgate: WebSocket gateway")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "7070")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Path WebSocket upgrades are served on
    #[arg(long, default_value = "/ws")]
    path: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "256")]
    max_connections: usize,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// JSON object of init params
    #[arg(long)]
    config: Option<PathBuf>,

    /// Init param as key=value (repeatable, overrides --config)
    #[arg(long = "init-param", value_parser = parse_init_param)]
    init_params: Vec<(String, String)>,

    /// Seconds a connection may stay idle (sets websocket.idle-timeout-seconds)
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Frame buffer limit in bytes (sets websocket.max-buffer-size-bytes)
    #[arg(long)]
    max_buffer_size: Option<usize>,
}

fn parse_init_param(raw: &str) -> Result<(String, String), ConfigError> {
    InitParams::parse_pair(raw)
}

impl Cli {
    /// Config file, then `--init-param`, then the dedicated flags.
    fn init_params(&self) -> Result<InitParams, ConfigError> {
        let mut params = match &self.config {
            Some(path) => InitParams::from_json_file(path)?,
            None => InitParams::new(),
        };
        params.merge(self.init_params.iter().cloned().collect());
        if let Some(secs) = self.idle_timeout {
            params.insert(keys::IDLE_TIMEOUT_SECONDS, secs.to_string());
        }
        if let Some(bytes) = self.max_buffer_size {
            params.insert(keys::MAX_BUFFER_SIZE_BYTES, bytes.to_string());
        }
        Ok(params)
    }
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    if let Some(log_path) = &cli.log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let params = cli.init_params().context("failed to load init params")?;
    let adapter_config =
        AdapterConfig::resolve(&params).context("invalid connection configuration")?;

    // ── Extensions ───────────────────────────────────────────────────────
    let framework = Framework::new(params.clone()).with_span(info_span!("extensions"));
    let table = ProcessorTable::new()
        .bind(OBSERVER_MARKER, CapabilityProcessor::<LifecycleObserverCapability>::new())
        .map_err(|_| anyhow::anyhow!("marker {OBSERVER_MARKER} bound twice"))?;
    let report = ExtensionLoader::new(table).load(
        &framework,
        [(Marker::from(OBSERVER_MARKER), LoggingObserver::class())],
    );
    if !report.is_clean() {
        warn!("{} extension(s) skipped", report.failures().len());
    }
    let registry = framework.seal();

    let dispatcher = Dispatcher::new(EchoHandler, &registry).with_span(info_span!("dispatcher"));

    // ── Transport ────────────────────────────────────────────────────────
    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        path: cli.path.clone(),
        max_connections: Some(cli.max_connections),
    };
    let mut transport = TransportServer::start(transport_config, params, Arc::new(dispatcher))
        .await
        .context("failed to start transport")?;

    println!();
    println!("  wsgate running");
    println!();
    println!("  WebSocket endpoint:  ws://{}:{}{}", cli.hostname, transport.port(), cli.path);
    println!(
        "  Idle timeout:        {}",
        match adapter_config.idle_timeout() {
            Some(limit) => format!("{}s", limit.as_secs()),
            None => "none".into(),
        }
    );
    println!(
        "  Buffer limit:        {}",
        adapter_config
            .buffer_limits()
            .max()
            .map_or_else(|| "host default".to_string(), |n| format!("{n} bytes"))
    );
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;

    info!("Shutting down...");
    transport.stop().await;
    Ok(())
}
