//! Session states and host events.

use std::net::SocketAddr;

use pcremote_core::{Command, FrameError};
use uuid::Uuid;

use crate::application::pairing::RejectReason;

/// Phase of the current host cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a `DISCOVER_PC` broadcast.
    AwaitingDiscovery,
    /// Waiting for the client's TCP connection.
    AwaitingConnection,
    /// Connected; waiting for the framed pairing confirmation.
    AwaitingPairing,
    /// Paired; processing framed commands.
    AuthenticatedLoop,
    /// The connection has ended.
    Terminated,
}

/// Events published by the host on its event channel.
///
/// Events are informational; dropping the receiver does not affect the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    StateChanged(SessionState),
    ClientConnected {
        session_id: Uuid,
        peer: Option<SocketAddr>,
    },
    PairingRejected {
        session_id: Uuid,
        reason: RejectReason,
    },
    FrameRejected {
        session_id: Uuid,
        error: FrameError,
    },
    CommandDispatched {
        session_id: Uuid,
        command: Command,
    },
    ClientDisconnected {
        session_id: Uuid,
    },
}
