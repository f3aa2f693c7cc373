//! Infrastructure layer for the host.
//!
//! Contains OS-facing adapters: UDP discovery and TCP sockets, input
//! injection backends, power control, the secret display, and
//! configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pcremote_core`, but MUST NOT be imported by the `application` layer.

pub mod input;
pub mod network;
pub mod power;
pub mod secret_display;
pub mod storage;
