//! pcremote-client library entry point.
//!
//! A small reference client for the PC Remote host.  It plays the role the
//! phone app plays in production: it finds the host with a UDP broadcast,
//! opens the TCP control connection, proves it holds the shared secret, and
//! sends framed commands.
//!
//! The host's integration tests drive the host through this crate, so every
//! exchange here mirrors the wire protocol byte for byte.

/// Infrastructure layer: discovery and the control connection.
pub mod infrastructure;

pub use infrastructure::network::{discover, ClientError, RemoteClient};
