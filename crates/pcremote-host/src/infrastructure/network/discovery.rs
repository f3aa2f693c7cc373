//! UDP broadcast discovery.
//!
//! # How discovery works (for beginners)
//!
//! The client does not know the host's IP address.  It broadcasts the text
//! `DISCOVER_PC` to the whole LAN on the discovery port.  The host, listening
//! on that port, answers `PC_HERE` straight back to the sender.  The client
//! takes the source address of that reply and opens the TCP control
//! connection to it.
//!
//! The responder is single-shot: the socket only exists while the host is in
//! its discovery phase and is released after the first reply.  A second
//! phone broadcasting afterwards gets no answer.

use std::net::SocketAddr;

use async_trait::async_trait;
use pcremote_core::protocol::tokens::{DISCOVERY_REPLY, DISCOVERY_REQUEST};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::application::ports::{DiscoveryError, PresenceResponder};

/// Largest datagram we bother reading; valid requests are 11 bytes.
const RECV_BUFFER_LEN: usize = 512;

/// Answers `DISCOVER_PC` broadcasts on `bind_addr`.
#[derive(Debug, Clone)]
pub struct UdpDiscoveryResponder {
    bind_addr: SocketAddr,
}

impl UdpDiscoveryResponder {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self { bind_addr }
    }
}

#[async_trait]
impl PresenceResponder for UdpDiscoveryResponder {
    async fn await_discovery(&mut self) -> Result<SocketAddr, DiscoveryError> {
        let addr = self.bind_addr;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| DiscoveryError::BindFailed { addr, source })?;
        if let Err(e) = socket.set_broadcast(true) {
            warn!("could not enable broadcast on discovery socket: {e}");
        }
        info!("discovery responder listening on UDP {addr}");

        let mut buf = [0u8; RECV_BUFFER_LEN];
        loop {
            let (len, src) = match socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(e) if is_transient(&e) => {
                    debug!("transient discovery recv error: {e}");
                    continue;
                }
                Err(e) => return Err(DiscoveryError::Recv(e)),
            };

            let Ok(text) = std::str::from_utf8(&buf[..len]) else {
                debug!("ignoring non-UTF-8 datagram from {src}");
                continue;
            };
            if text != DISCOVERY_REQUEST {
                info!("ignoring unexpected discovery message from {src}: {text:?}");
                continue;
            }

            match socket.send_to(DISCOVERY_REPLY.as_bytes(), src).await {
                Ok(_) => {
                    info!("answered discovery request from {src}");
                    return Ok(src);
                }
                Err(e) => warn!("failed to answer discovery request from {src}: {e}"),
            }
        }
    }
}

/// Errors some platforms report on a UDP socket after an unrelated ICMP
/// failure.  The socket itself is still usable.
fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::Interrupted
    )
}
