//! PC Remote host entry point.
//!
//! Generates the per-run pairing secret, shows it as a QR code, and runs the
//! host state machine until a command ends the run or Ctrl-C is pressed.
//!
//! # Usage
//!
//! ```text
//! pcremote-host [OPTIONS]
//!
//! Options:
//!   --config <PATH>           Config file [env: PCREMOTE_CONFIG]
//!   --bind <IP>               Address both sockets bind to
//!   --discovery-port <PORT>   UDP discovery port
//!   --control-port <PORT>     TCP control port
//!   --no-qr                   Print the secret as hex only
//!   --allow-shutdown          Let clients power the machine off
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                   -- TOML file, then CLI overrides
//!  └─ create_secret()                 -- fresh secret + derived keys
//!  └─ TerminalQrDisplay::display()
//!  └─ Host::run()
//!       ├─ UdpDiscoveryResponder      (DISCOVER_PC → PC_HERE)
//!       ├─ TcpAcceptor                (CONFIRMED_CONNECTION)
//!       └─ InputCommandDispatcher
//!            ├─ LoggingInputBackend
//!            ├─ pointer actor         (Tokio task)
//!            └─ SystemPower | DisabledPower
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use pcremote_host::application::control_input::{InputCommandDispatcher, PowerControl};
use pcremote_host::application::host::{Host, HostExit};
use pcremote_host::application::pairing::create_secret;
use pcremote_host::application::pointer::spawn_pointer_actor;
use pcremote_host::application::ports::SecretDisplay;
use pcremote_host::application::state::HostEvent;
use pcremote_host::infrastructure::input::LoggingInputBackend;
use pcremote_host::infrastructure::network::{TcpAcceptor, UdpDiscoveryResponder};
use pcremote_host::infrastructure::power::{DisabledPower, SystemPower};
use pcremote_host::infrastructure::secret_display::TerminalQrDisplay;
use pcremote_host::infrastructure::storage::config::{self, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Secure LAN remote-control host.
#[derive(Debug, Parser)]
#[command(name = "pcremote-host", about = "PC Remote host", version)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config dir.
    #[arg(long, env = "PCREMOTE_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the discovery and control sockets to.
    #[arg(long)]
    bind: Option<String>,

    /// UDP port for discovery broadcasts.
    #[arg(long)]
    discovery_port: Option<u16>,

    /// TCP port for the control connection.
    #[arg(long)]
    control_port: Option<u16>,

    /// Print the pairing secret as hex without drawing a QR code.
    #[arg(long)]
    no_qr: bool,

    /// Allow `COMMAND:SHUTDOWN` to power the machine off.
    #[arg(long)]
    allow_shutdown: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => config::load_config().context("failed to load config")?,
        };

        if let Some(bind) = &self.bind {
            cfg.network.bind_address = bind.clone();
        }
        if let Some(port) = self.discovery_port {
            cfg.network.discovery_port = port;
        }
        if let Some(port) = self.control_port {
            cfg.network.control_port = port;
        }
        if self.no_qr {
            cfg.host.show_qr = false;
        }
        if self.allow_shutdown {
            cfg.host.allow_shutdown = true;
        }
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.load_config()?;

    // `RUST_LOG` wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.host.log_level)),
        )
        .init();

    info!("PC Remote host starting");

    let discovery_addr = cfg.discovery_addr()?;
    let control_addr = cfg.control_addr()?;

    let (secret, keys) = create_secret();
    TerminalQrDisplay::new(cfg.host.show_qr).display(&secret);
    drop(secret);

    // ── Command dispatcher ────────────────────────────────────────────────────
    let backend = Arc::new(LoggingInputBackend::new());
    let pointer = spawn_pointer_actor(backend.clone(), cfg.pointer_config());
    let power: Arc<dyn PowerControl> = if cfg.host.allow_shutdown {
        info!("remote shutdown is enabled");
        Arc::new(SystemPower::new())
    } else {
        Arc::new(DisabledPower)
    };
    let dispatcher = InputCommandDispatcher::new(backend, pointer, power);

    // ── Host state machine ────────────────────────────────────────────────────
    let (mut host, events) = Host::new(
        Box::new(UdpDiscoveryResponder::new(discovery_addr)),
        Box::new(TcpAcceptor::new(control_addr)),
        Box::new(dispatcher),
        keys,
        cfg.host_policy(),
    );
    tokio::spawn(log_events(events));

    info!("PC Remote host ready.  Press Ctrl-C to exit.");

    tokio::select! {
        result = host.run() => match result {
            Ok(HostExit::Terminated) => info!("session ended by client"),
            Ok(HostExit::Rejected) => info!("pairing rejected; exiting"),
            Err(e) => {
                error!("host stopped: {e}");
                return Err(e).context("host failed");
            }
        },
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    info!("PC Remote host stopped");
    Ok(())
}

/// Logs host events.  Only command names are logged so typed text never
/// reaches the log.
async fn log_events(mut events: mpsc::UnboundedReceiver<HostEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            HostEvent::StateChanged(state) => debug!(?state, "state changed"),
            HostEvent::ClientConnected { session_id, peer } => {
                debug!(%session_id, ?peer, "client connected")
            }
            HostEvent::PairingRejected { session_id, reason } => {
                debug!(%session_id, %reason, "pairing rejected")
            }
            HostEvent::FrameRejected { session_id, error } => {
                debug!(%session_id, kind = error.kind(), "frame rejected")
            }
            HostEvent::CommandDispatched {
                session_id,
                command,
            } => debug!(%session_id, command = command.name(), "command dispatched"),
            HostEvent::ClientDisconnected { session_id } => {
                debug!(%session_id, "client disconnected")
            }
        }
    }
}
