//! Network infrastructure for the client.
//!
//! - **`discovery`** – broadcasts `DISCOVER_PC` and waits for `PC_HERE`.
//! - **`connection`** – the TCP control connection: greeting, pairing, and
//!   framed commands with acknowledgements.

pub mod connection;
pub mod discovery;

use std::net::SocketAddr;

use pcremote_core::FrameError;
use thiserror::Error;

pub use connection::RemoteClient;
pub use discovery::discover;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the host failed.
    #[error("failed to connect to host at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on an established socket.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host did not greet with `CONFIRMED_CONNECTION`.
    #[error("unexpected greeting from host: {0:?}")]
    UnexpectedGreeting(String),

    /// A frame from the host failed to decode.
    #[error("invalid frame from host: {0}")]
    Frame(#[from] FrameError),

    /// The host answered pairing with something other than
    /// `CLIENT_AUTHENTICATED`.
    #[error("pairing failed: host replied {0:?}")]
    PairingFailed(String),

    /// The acknowledgement did not echo the sent message.
    #[error("expected {expected:?}, host replied {actual:?}")]
    UnexpectedReply { expected: String, actual: String },

    /// Nothing arrived in time.
    #[error("timed out waiting for the host")]
    Timeout,

    /// The host closed the connection.
    #[error("connection closed by host")]
    Closed,
}
