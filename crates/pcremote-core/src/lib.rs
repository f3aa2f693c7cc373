//! # pcremote-core
//!
//! Shared library for PC Remote containing the wire tokens, the secure frame
//! codec, key derivation, and the typed remote-control command vocabulary.
//!
//! This crate is used by both the host and the reference client.
//! It has zero dependencies on OS APIs or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! PC Remote lets a phone drive a desktop machine over the local network.
//! The phone finds the desktop with a UDP broadcast, opens a TCP connection,
//! proves it holds a secret the desktop showed as a QR code, and then streams
//! commands ("move the pointer", "type this text", "disconnect").
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`crypto`** – The per-run [`SharedSecret`] and the two subkeys derived
//!   from it with HKDF-SHA256 ([`DerivedKeys`]).
//!
//! - **`protocol`** – How bytes travel over the network.  Every command is
//!   encrypted with AES-256-CBC, authenticated with HMAC-SHA256, rendered as
//!   `hex(iv)|hex(ciphertext)|hex(tag)` and terminated by a newline.  The
//!   [`FrameBuffer`] splits a TCP byte stream back into those lines, and
//!   [`Command`] turns a decrypted line into a typed value.

pub mod crypto;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pcremote_core::DerivedKeys` instead of `pcremote_core::crypto::kdf::DerivedKeys`.
pub use crypto::kdf::{DerivedKeys, KdfError};
pub use crypto::secret::SharedSecret;
pub use protocol::buffer::{FrameBuffer, FrameBufferError};
pub use protocol::command::{Command, CommandError, InputCommand, SpecialKey};
pub use protocol::frame::{decode, decode_line, encode, FrameError, SecureFrame};
