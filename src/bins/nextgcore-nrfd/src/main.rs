//! NextGCore NRF (Network Repository Function)
//!
//! Access token service of the NRF, run either as:
//! - `server`: the authorization server issuing access tokens
//! - `proxy`: one or more proxies forwarding token requests to a remote
//!   authorization server and verifying tokens locally

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use nextgcore_nrfd::{
    nrf_authority_build, nrf_authority_open, nrf_proxy_build, nrf_proxy_open, nrf_sbi_close, AuthProxyConfig,
    AuthServerConfig, NrfSbiServer,
};
use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// NextGCore NRF - OAuth2 access token service
#[derive(Parser, Debug)]
#[command(name = "nextgcore-nrfd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core NRF access token server and proxy", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log file path (appended to, rotated by size)
    #[arg(short = 'l', long, global = true)]
    log_file: Option<String>,

    /// Size of the log file in megabytes before it is rotated
    #[arg(long, global = true, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..=1024 * 1024))]
    log_size: u64,

    /// Number of rotated log files to keep (0 keeps all)
    #[arg(long, global = true, default_value_t = 10)]
    log_backups: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, global = true, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(short = 'm', long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OAuth2 authorization server
    Server {
        /// Configuration file path
        #[arg(short = 'c', long)]
        config: String,
    },
    /// OAuth2 proxy in front of a remote authorization server
    Proxy {
        /// Configuration file path
        #[arg(short = 'c', long)]
        config: String,
    },
}

/// Global shutdown flag
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    log::info!("NextGCore NRF v{} starting...", env!("CARGO_PKG_VERSION"));

    // Set up signal handlers
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let servers = match &args.command {
        Command::Server { config } => start_auth_server(config).await?,
        Command::Proxy { config } => start_auth_proxy(config).await?,
    };

    log::info!("NextGCore NRF ready");

    // Main event loop (async)
    run_event_loop_async(shutdown).await;

    // Graceful shutdown
    log::info!("Shutting down...");
    nrf_sbi_close(&servers).await;
    log::info!("SBI servers stopped");

    log::info!("NextGCore NRF stopped");
    Ok(())
}

async fn start_auth_server(config_path: &str) -> Result<Vec<NrfSbiServer>> {
    log::info!("Loading configuration from {}", config_path);
    let config = AuthServerConfig::load(config_path)
        .with_context(|| format!("Failed to load server configuration {config_path}"))?;
    log::info!("Load configuration:\n{}", config.to_yaml().unwrap_or_default());

    let authority = nrf_authority_build(&config).context("Failed to create token authority")?;
    let server = nrf_authority_open(&config, authority)
        .await
        .context("Failed to start token authority")?;

    Ok(vec![server])
}

async fn start_auth_proxy(config_path: &str) -> Result<Vec<NrfSbiServer>> {
    log::info!("Loading configuration from {}", config_path);
    let config = AuthProxyConfig::load(config_path)
        .with_context(|| format!("Failed to load proxy configuration {config_path}"))?;

    let mut servers = Vec::with_capacity(config.proxies.len());
    for proxy_config in &config.proxies {
        let opened = match nrf_proxy_build(proxy_config) {
            Ok(proxy) => nrf_proxy_open(proxy_config, proxy).await,
            Err(e) => Err(e),
        };
        match opened {
            Ok(server) => servers.push(server),
            Err(e) => {
                nrf_sbi_close(&servers).await;
                return Err(e).with_context(|| format!("Failed to start proxy on {}", proxy_config.listen_addr));
            }
        }
    }

    log::info!("{} proxies started", servers.len());
    Ok(servers)
}

fn parse_log_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" | "warning" => log::LevelFilter::Warn,
        "error" | "fatal" | "panic" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    }
}

/// Size-rotated writer for the log file. Rotated files get `.1`, `.2`, ...
/// suffixes, `.1` being the most recent.
fn log_file_writer(path: &str, size_mb: u64, backups: usize) -> Result<FileRotate<AppendCount>> {
    // surface a bad path here, the rotating writer opens the file lazily
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {path}"))?;

    let max_bytes = usize::try_from(size_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX);
    let max_files = if backups == 0 { usize::MAX } else { backups };

    Ok(FileRotate::new(
        path,
        AppendCount::new(max_files),
        ContentLimit::Bytes(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

/// Initialize logging based on command line arguments
fn init_logging(args: &Args) -> Result<()> {
    let mut builder = env_logger::Builder::new();

    builder.filter_level(parse_log_level(&args.log_level));

    // Configure format
    builder.format_timestamp_millis();

    if let Some(path) = &args.log_file {
        let writer = log_file_writer(path, args.log_size, args.log_backups)?;
        builder.target(env_logger::Target::Pipe(Box::new(writer)));
        builder.write_style(env_logger::WriteStyle::Never);
    } else if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder.init();

    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown_clone.store(true, Ordering::SeqCst);
        SHUTDOWN.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

/// Wait until a shutdown signal arrives
async fn run_event_loop_async(shutdown: Arc<AtomicBool>) {
    log::debug!("Entering async main event loop");

    let mut interval = tokio::time::interval(Duration::from_millis(100));

    while !shutdown.load(Ordering::SeqCst) && !SHUTDOWN.load(Ordering::SeqCst) {
        interval.tick().await;
    }

    log::debug!("Exiting async main event loop");
}
