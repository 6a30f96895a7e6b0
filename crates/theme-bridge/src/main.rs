//! theme-bridge: run either side of the cross-window theme exchange.
//!
//! # Usage
//!
//! ```text
//! theme-bridge [--config <PATH>] [--apply-timeout <SECS>] <COMMAND>
//!
//! Commands:
//!   host   Run the host relay; every stdin line is a theme id sent to guests
//!   guest  Run a guest page connected to a host relay
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                       | Flag               |
//! |--------------------------------|--------------------|
//! | `THEME_BRIDGE_CONFIG`          | `--config`         |
//! | `THEME_BRIDGE_APPLY_TIMEOUT`   | `--apply-timeout`  |
//! | `THEME_BRIDGE_BIND`            | `host --bind`      |
//! | `THEME_BRIDGE_ORIGIN`          | `host --origin`    |
//! | `THEME_BRIDGE_HOST_URL`        | `guest --host-url` |
//! | `THEME_BRIDGE_URL`             | `guest --url`      |
//! | `THEME_BRIDGE_APPLY_DELAY_MS`  | `guest --apply-delay-ms` |
//!
//! Precedence: CLI flag, then environment, then config file, then built-in
//! default.
//!
//! # Example session
//!
//! ```text
//! $ theme-bridge host
//! $ theme-bridge guest --url "https://localhost:7170/grid?page=2"
//! # type "dark" into the host's stdin: the guest logs the switch and
//! # reloads with https://localhost:7170/grid?page=2&theme=dark
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use theme_bridge::application::{run_guest_page, ThemeBackend};
use theme_bridge::domain::BridgeConfig;
use theme_bridge::infrastructure::{
    load_config_file, HostEvent, HostServer, LoggingThemeBackend, WsGuestWindow,
};
use theme_core::{Origin, OriginRegistry};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Origin-checked theme switching between a host page and an embedded guest.
#[derive(Debug, Parser)]
#[command(
    name = "theme-bridge",
    about = "Cross-window theme messenger: host relay and guest page runtime",
    version
)]
struct Cli {
    /// Path to a TOML config file.  A missing file means built-in defaults.
    #[arg(long, global = true, env = "THEME_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds a theme backend may take before the request is abandoned.
    #[arg(long, global = true, env = "THEME_BRIDGE_APPLY_TIMEOUT")]
    apply_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the host relay.  Each line read from stdin is a theme id that is
    /// sent to every connected guest.
    Host {
        /// Socket address to listen on, e.g. `127.0.0.1:8000`.
        #[arg(long, env = "THEME_BRIDGE_BIND")]
        bind: Option<String>,

        /// Origin the host claims, e.g. `http://localhost:8000`.
        #[arg(long, env = "THEME_BRIDGE_ORIGIN")]
        origin: Option<String>,
    },

    /// Run a guest page connected to a host relay.
    Guest {
        /// WebSocket URL of the host relay.
        #[arg(long, env = "THEME_BRIDGE_HOST_URL")]
        host_url: Option<String>,

        /// Initial location of the guest page; its origin selects the
        /// trusted host.
        #[arg(long, env = "THEME_BRIDGE_URL")]
        url: Option<String>,

        /// Simulated theme loading time in milliseconds.
        #[arg(long, default_value_t = 0, env = "THEME_BRIDGE_APPLY_DELAY_MS")]
        apply_delay_ms: u64,
    },
}

impl Cli {
    /// Loads the config file (if any) and applies CLI overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is invalid or an override is not a
    /// valid address, origin, or URL.
    fn to_bridge_config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => BridgeConfig::default(),
        };
        self.apply_overrides(&mut config)?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BridgeConfig) -> anyhow::Result<()> {
        if let Some(secs) = self.apply_timeout {
            config.messenger.apply_timeout = Duration::from_secs(secs);
        }

        match &self.command {
            Command::Host { bind, origin } => {
                if let Some(bind) = bind {
                    config.host.bind_addr = bind
                        .parse::<SocketAddr>()
                        .with_context(|| format!("invalid bind address: '{bind}'"))?;
                }
                if let Some(origin) = origin {
                    config.host.origin = Origin::parse(origin)
                        .with_context(|| format!("invalid host origin: '{origin}'"))?;
                }
            }
            Command::Guest { host_url, url, .. } => {
                if let Some(host_url) = host_url {
                    config.guest.host_url = Url::parse(host_url)
                        .with_context(|| format!("invalid host URL: '{host_url}'"))?;
                }
                if let Some(url) = url {
                    config.guest.url =
                        Url::parse(url).with_context(|| format!("invalid guest URL: '{url}'"))?;
                }
            }
        }
        Ok(())
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls the level; `info` when absent or invalid.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.to_bridge_config()?;

    match cli.command {
        Command::Host { .. } => run_host(config).await,
        Command::Guest { apply_delay_ms, .. } => {
            run_guest(config, Duration::from_millis(apply_delay_ms)).await
        }
    }
}

// ── Host ──────────────────────────────────────────────────────────────────────

async fn run_host(config: BridgeConfig) -> anyhow::Result<()> {
    info!(
        "theme-bridge host starting — bind={}, origin={}",
        config.host.bind_addr, config.host.origin
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let server = HostServer::bind(config.host).await?;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(log_host_events(events_rx));
    tokio::spawn(forward_stdin(server.requester()));

    server.run(events_tx, running).await?;
    info!("theme-bridge host stopped");
    Ok(())
}

/// Plays the host page's part: show the loader while a guest is loading.
async fn log_host_events(mut events: mpsc::UnboundedReceiver<HostEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            HostEvent::GuestConnected { session, peer } => {
                info!("guest {session} connected from {peer}");
            }
            HostEvent::GuestDisconnected { session } => info!("guest {session} disconnected"),
            HostEvent::LoadingStatus {
                session,
                guest_origin,
                loading: true,
            } => info!("guest {session} ({guest_origin}) is loading — loader shown"),
            HostEvent::LoadingStatus {
                session,
                guest_origin,
                loading: false,
            } => info!("guest {session} ({guest_origin}) is ready — loader hidden"),
        }
    }
}

/// Sends every non-empty stdin line as a theme request.
async fn forward_stdin(requests: broadcast::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let theme_id = line.trim();
                if theme_id.is_empty() {
                    continue;
                }
                if requests.send(theme_id.to_string()).is_err() {
                    warn!("no guest connected; theme '{theme_id}' not sent");
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("failed to read stdin: {e}");
                break;
            }
        }
    }
}

// ── Guest ─────────────────────────────────────────────────────────────────────

async fn run_guest(config: BridgeConfig, apply_delay: Duration) -> anyhow::Result<()> {
    info!(
        "theme-bridge guest starting — url={}, host={}",
        config.guest.url, config.guest.host_url
    );
    log_trust_table(&config.messenger.origins);

    let window = WsGuestWindow::connect(&config.guest.host_url, config.guest.url.clone()).await?;
    let backend: Arc<dyn ThemeBackend> = Arc::new(LoggingThemeBackend::new(apply_delay));

    tokio::select! {
        result = run_guest_page(window, backend, config.messenger) => result?,
        _ = tokio::signal::ctrl_c() => info!("received Ctrl+C — stopping guest"),
    }

    info!("theme-bridge guest stopped");
    Ok(())
}

/// Logs the guest-to-host trust table the messenger will enforce.
fn log_trust_table(origins: &OriginRegistry) {
    if origins.is_empty() {
        warn!("trust table is empty; every theme request will be rejected");
        return;
    }
    info!("trusting {} guest origin(s)", origins.len());
    for (guest, host) in origins.iter() {
        debug!("guest {guest} accepts requests from {host}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
