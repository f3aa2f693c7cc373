//! Host discovery over UDP broadcast.

use std::net::SocketAddr;
use std::time::Duration;

use pcremote_core::protocol::tokens::{DISCOVERY_REPLY, DISCOVERY_REQUEST};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::ClientError;

/// Sends `DISCOVER_PC` to `target` (usually a broadcast address) and returns
/// the address of the first host that answers `PC_HERE`.
///
/// # Errors
///
/// Returns [`ClientError::Timeout`] if no host answers within `timeout`.
pub async fn discover(target: SocketAddr, timeout: Duration) -> Result<SocketAddr, ClientError> {
    let bind: SocketAddr = if target.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.set_broadcast(true)?;
    socket.send_to(DISCOVERY_REQUEST.as_bytes(), target).await?;
    debug!("sent discovery request to {target}");

    tokio::time::timeout(timeout, wait_for_reply(&socket))
        .await
        .map_err(|_| ClientError::Timeout)?
}

async fn wait_for_reply(socket: &UdpSocket) -> Result<SocketAddr, ClientError> {
    let mut buf = [0u8; 64];
    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        if &buf[..len] == DISCOVERY_REPLY.as_bytes() {
            info!("found host at {src}");
            return Ok(src);
        }
        debug!("ignoring {len}-byte datagram from {src}");
    }
}
