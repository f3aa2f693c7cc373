//! Ports: the traits the application layer drives and the infrastructure
//! layer implements.
//!
//! Each network phase of a host run is behind one trait so the state machine
//! in [`crate::application::host`] can be exercised with in-memory doubles.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use pcremote_core::SharedSecret;
use thiserror::Error;

/// Errors raised by a connection or its listener.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection, or it was closed locally.
    #[error("connection closed")]
    Closed,

    /// The control listener could not be bound.
    #[error("failed to bind control listener on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure.
    #[error("transport I/O error: {0}")]
    Failure(#[from] io::Error),
}

/// Errors raised while waiting for a discovery request.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// An I/O error occurred while receiving a datagram.
    #[error("recv error: {0}")]
    Recv(io::Error),
}

/// One bidirectional byte-stream connection to the client.
#[async_trait]
pub trait Transport: Send {
    /// Reads the next chunk of bytes as they arrive.
    ///
    /// End-of-stream is reported as [`TransportError::Closed`], never as an
    /// empty chunk.
    async fn read_chunk(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Writes all of `bytes`.
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Closes the connection.  Calling it again has no effect.
    async fn close(&mut self);

    /// Remote address, when the transport has one.
    fn peer(&self) -> Option<SocketAddr>;
}

/// Accepts one client connection per call.
#[async_trait]
pub trait ConnectionAcceptor: Send {
    /// Waits for a client, confirms the connection, and hands it over.
    ///
    /// # Errors
    ///
    /// Any error returned here is a listener-level failure and ends the
    /// host run.
    async fn accept(&mut self) -> Result<Box<dyn Transport>, TransportError>;
}

/// Answers a single discovery request per call.
#[async_trait]
pub trait PresenceResponder: Send {
    /// Waits for one valid discovery request, replies, and returns the
    /// requester's address.
    async fn await_discovery(&mut self) -> Result<SocketAddr, DiscoveryError>;
}

/// Shows the shared secret to the user for out-of-band transfer.
pub trait SecretDisplay: Send + Sync {
    fn display(&self, secret: &SharedSecret);
}
