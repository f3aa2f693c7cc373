//! Network infrastructure for the host.
//!
//! # Sub-modules
//!
//! - **`discovery`** – Answers one `DISCOVER_PC` UDP broadcast per discovery
//!   phase so the client learns the host's address without manual setup.
//!
//! - **`transport`** – Accepts the client's TCP control connection, sends the
//!   plaintext `CONFIRMED_CONNECTION` token, and wraps the stream as a
//!   [`Transport`](crate::application::ports::Transport).

pub mod discovery;
pub mod transport;

pub use discovery::UdpDiscoveryResponder;
pub use transport::{StreamTransport, TcpAcceptor};
