//! Fixed protocol tokens and constants.
//!
//! Everything in this module is part of the wire contract with the handheld
//! client and must stay bit-exact.

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Default UDP port the host listens on for discovery broadcasts.
pub const DEFAULT_DISCOVERY_PORT: u16 = 41234;

/// Default TCP port the host accepts the control connection on.
pub const DEFAULT_CONTROL_PORT: u16 = 41235;

// ── Discovery (plaintext UDP) ─────────────────────────────────────────────────

/// Broadcast probe sent by a client looking for a host.
pub const DISCOVERY_REQUEST: &str = "DISCOVER_PC";

/// Unicast reply sent by the host to the prober.
pub const DISCOVERY_REPLY: &str = "PC_HERE";

// ── Transport handshake (plaintext TCP) ───────────────────────────────────────

/// Sent by the host immediately after accepting a connection.  Not authenticated.
pub const CONNECTION_CONFIRMED: &str = "CONFIRMED_CONNECTION";

// ── Pairing (framed) ──────────────────────────────────────────────────────────

/// Plaintext the client frames once it has scanned the shared secret.
pub const PAIRING_CONFIRMATION: &str = "MASTER_KEY_RECEIVED";

/// Plaintext the host frames back once the confirmation authenticated.
pub const PAIRING_SUCCESS: &str = "CLIENT_AUTHENTICATED";

// ── Commands (framed) ─────────────────────────────────────────────────────────

/// Reserved prefix of every remote-control command.
pub const COMMAND_PREFIX: &str = "COMMAND:";

/// Prefix of the acknowledgement the host frames back for each command.
pub const ACK_PREFIX: &str = "ACK:";

// ── Frame text layout ─────────────────────────────────────────────────────────

/// Separates the iv, ciphertext, and tag fields of a frame.
pub const FIELD_SEPARATOR: char = '|';

/// Terminates each frame on the byte stream.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Builds the acknowledgement plaintext for a received message.
///
/// # Examples
///
/// ```rust
/// use pcremote_core::protocol::tokens::ack_for;
///
/// assert_eq!(ack_for("COMMAND:MOUSE_CLICK"), "ACK:COMMAND:MOUSE_CLICK");
/// ```
pub fn ack_for(plaintext: &str) -> String {
    format!("{ACK_PREFIX}{plaintext}")
}
