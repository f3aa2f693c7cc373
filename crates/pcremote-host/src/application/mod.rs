//! Application layer of the host.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the shared
//! protocol crate (`pcremote_core`) and the infrastructure (sockets, files,
//! the terminal, the operating system).
//!
//! Code in this layer:
//!
//! - **Sequences the phases** of a host run: discovery, connection,
//!   pairing, the authenticated command loop, and reconnection.
//! - **Depends on abstractions** (the traits in [`ports`],
//!   [`dispatch`], and [`control_input`]) rather than on concrete sockets or
//!   input APIs, so every phase can be unit-tested with in-memory doubles.
//! - **Contains no OS calls and no direct network I/O**.
//!
//! # Sub-modules
//!
//! - **`ports`** – Traits the infrastructure implements: transport,
//!   connection acceptor, discovery responder, secret display.
//! - **`pairing`** – Creates the per-run secret and verifies the client's
//!   first framed message.
//! - **`session`** – The authenticated command loop for one connection.
//! - **`host`** – The state machine tying the phases together.
//! - **`dispatch`** – The command dispatcher seam.
//! - **`control_input`** – The default dispatcher that turns commands into
//!   synthetic input.
//! - **`pointer`** – Pointer-motion smoothing, run as an owned actor.
//! - **`state`** – Session states and the events the host publishes.

pub mod control_input;
pub mod dispatch;
pub mod host;
pub mod pairing;
pub mod pointer;
pub mod ports;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
