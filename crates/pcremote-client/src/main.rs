//! PC Remote reference client.
//!
//! Pairs with a host using the hex secret it displays, then reads commands
//! from stdin, one per line, and sends each one as a framed message:
//!
//! ```text
//! $ pcremote-client --secret 3f9a...c1
//! COMMAND:MOUSE_MOVE<10,-4>
//! COMMAND:KEYPRESS<hello>
//! COMMAND:DISCONNECT
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pcremote_client::{discover, RemoteClient};
use pcremote_core::protocol::tokens::{DEFAULT_CONTROL_PORT, DEFAULT_DISCOVERY_PORT};
use pcremote_core::{Command, DerivedKeys, SharedSecret};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "pcremote-client", about = "PC Remote reference client", version)]
struct Cli {
    /// Pairing secret shown by the host, as 64 hex characters.
    #[arg(long, env = "PCREMOTE_SECRET")]
    secret: String,

    /// Host IP address.  Discovered by broadcast when omitted.
    #[arg(long)]
    host: Option<IpAddr>,

    /// Address discovery requests are sent to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::BROADCAST))]
    broadcast: IpAddr,

    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Seconds to wait for any single reply from the host.
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs);
    let secret = SharedSecret::from_hex(&cli.secret).context("invalid --secret")?;
    let keys = DerivedKeys::derive(&secret);

    let host = match cli.host {
        Some(ip) => ip,
        None => {
            let target = SocketAddr::new(cli.broadcast, cli.discovery_port);
            discover(target, timeout)
                .await
                .with_context(|| format!("no host answered discovery on {target}"))?
                .ip()
        }
    };

    let addr = SocketAddr::new(host, cli.control_port);
    let mut client = RemoteClient::connect(addr, keys)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    client.pair(timeout).await.context("pairing failed")?;
    info!("paired; reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("skipping {line:?}: {e}");
                continue;
            }
        };

        client
            .send_and_ack(&command, timeout)
            .await
            .with_context(|| format!("{} was not acknowledged", command.name()))?;
        info!(command = command.name(), "acknowledged");

        if matches!(command, Command::Disconnect | Command::Shutdown) {
            return Ok(());
        }
    }

    client.close().await?;
    Ok(())
}
