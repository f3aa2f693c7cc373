//! Pairing: the per-run secret and the client's proof that it holds it.
//!
//! # How pairing works (for beginners)
//!
//! ```text
//! Host                                   Client
//! ────                                   ──────
//! create_secret()
//! show secret as QR code ───────────────▶ scan QR code
//!                                        derive the same keys
//!              ◀──────────────────────── frame("MASTER_KEY_RECEIVED")
//! verify tag, decrypt
//! frame("CLIENT_AUTHENTICATED") ────────▶
//! ```
//!
//! Only someone who scanned the QR code can produce a frame whose tag
//! verifies.  A frame that fails verification therefore means either a
//! stale client from an earlier host run or somebody tampering with the
//! connection; either way the connection is closed without a reply.

use std::time::Duration;

use pcremote_core::{
    decode_line, encode,
    protocol::frame::TAG_LEN,
    protocol::tokens::{FRAME_DELIMITER, PAIRING_CONFIRMATION, PAIRING_SUCCESS},
    DerivedKeys, FrameBuffer, FrameError, SecureFrame, SharedSecret,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::ports::{Transport, TransportError};

/// Why a pairing attempt was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The confirmation frame failed to decode.
    #[error("confirmation frame rejected: {0}")]
    Frame(FrameError),

    /// The frame decoded but did not carry the expected confirmation.
    #[error("unexpected confirmation message")]
    UnexpectedConfirmation,
}

/// Result of waiting for the client's confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    /// The client proved it holds the secret; the reply has been sent.
    Authenticated,
    /// The confirmation was invalid; the transport has been closed.
    Rejected(RejectReason),
    /// The connection ended (or timed out) before a confirmation arrived;
    /// the transport has been closed.
    Disconnected,
}

/// Generates the shared secret and derives the session keys.
///
/// Called once per host run.  The returned secret is only needed for
/// display; the keys are reused for every connection of the run.
pub fn create_secret() -> (SharedSecret, DerivedKeys) {
    let secret = SharedSecret::generate();
    let keys = DerivedKeys::derive(&secret);
    (secret, keys)
}

/// Verifies the first framed message on a freshly accepted connection.
pub struct PairingManager<'k> {
    keys: &'k DerivedKeys,
    timeout: Option<Duration>,
    max_pending_bytes: usize,
}

impl<'k> PairingManager<'k> {
    pub fn new(keys: &'k DerivedKeys) -> Self {
        Self {
            keys,
            timeout: None,
            max_pending_bytes: pcremote_core::protocol::buffer::DEFAULT_MAX_PENDING_BYTES,
        }
    }

    /// Gives up on a client that does not confirm within `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_pending_bytes(mut self, max_pending_bytes: usize) -> Self {
        self.max_pending_bytes = max_pending_bytes;
        self
    }

    /// Waits for the client's confirmation frame and answers it.
    pub async fn await_confirmation(&self, transport: &mut dyn Transport) -> PairingOutcome {
        let mut buffer = FrameBuffer::with_limit(self.max_pending_bytes);
        self.await_confirmation_buffered(transport, &mut buffer).await
    }

    /// Like [`await_confirmation`](Self::await_confirmation), reading through
    /// a caller-owned buffer so bytes that follow the confirmation are kept
    /// for the command session.
    pub async fn await_confirmation_buffered(
        &self,
        transport: &mut dyn Transport,
        buffer: &mut FrameBuffer,
    ) -> PairingOutcome {
        let line = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read_line(transport, buffer))
                .await
                .unwrap_or_else(|_| {
                    warn!(timeout_secs = limit.as_secs(), "client did not confirm pairing in time");
                    None
                }),
            None => read_line(transport, buffer).await,
        };

        let Some(line) = line else {
            transport.close().await;
            return PairingOutcome::Disconnected;
        };

        let plaintext = match decode_line(&line, self.keys) {
            Ok(text) => text,
            Err(error) => return reject(transport, RejectReason::Frame(error)).await,
        };
        if plaintext != PAIRING_CONFIRMATION {
            return reject(transport, RejectReason::UnexpectedConfirmation).await;
        }

        let reply = encode(PAIRING_SUCCESS, self.keys).to_line();
        if let Err(error) = transport.write_all(reply.as_bytes()).await {
            warn!(%error, "failed to send pairing reply");
            transport.close().await;
            return PairingOutcome::Disconnected;
        }

        info!(peer = ?transport.peer(), "client authenticated");
        PairingOutcome::Authenticated
    }
}

/// Reads until one complete line is buffered.  `None` means the connection
/// ended first.
///
/// Clients may send the confirmation without a trailing delimiter, so a
/// structurally complete frame left undelimited after a read is accepted too.
async fn read_line(transport: &mut dyn Transport, buffer: &mut FrameBuffer) -> Option<Vec<u8>> {
    loop {
        if let Some(line) = buffer.next_line() {
            return Some(line);
        }
        if holds_unterminated_frame(buffer.pending()) {
            return Some(buffer.take_pending());
        }
        match transport.read_chunk().await {
            Ok(chunk) => {
                if let Err(error) = buffer.push(&chunk) {
                    warn!(%error, "discarding oversized data before pairing");
                }
            }
            Err(TransportError::Closed) => {
                info!("client closed the connection before pairing");
                return None;
            }
            Err(error) => {
                warn!(%error, "connection failed before pairing");
                return None;
            }
        }
    }
}

/// True when `pending` has no delimiter and parses as a frame with a
/// full-length tag.
fn holds_unterminated_frame(pending: &[u8]) -> bool {
    if pending.is_empty() || pending.contains(&FRAME_DELIMITER) {
        return false;
    }
    std::str::from_utf8(pending)
        .ok()
        .and_then(|text| SecureFrame::parse(text).ok())
        .is_some_and(|frame| frame.tag().len() == TAG_LEN)
}

async fn reject(transport: &mut dyn Transport, reason: RejectReason) -> PairingOutcome {
    warn!(
        peer = ?transport.peer(),
        %reason,
        "pairing rejected; the key exchange may be compromised"
    );
    transport.close().await;
    PairingOutcome::Rejected(reason)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{frame_line, test_keys, ScriptedTransport};

    #[test]
    fn test_create_secret_derives_keys_from_the_returned_secret() {
        // Arrange / Act
        let (secret, keys) = create_secret();

        // Assert
        let again = DerivedKeys::derive(&secret);
        assert_eq!(keys.confidentiality(), again.confidentiality());
        assert_eq!(keys.integrity(), again.integrity());
    }

    #[tokio::test]
    async fn test_valid_confirmation_authenticates_and_replies() {
        // Arrange
        let keys = test_keys();
        let (mut transport, seen) =
            ScriptedTransport::new(vec![frame_line(PAIRING_CONFIRMATION, &keys)]);

        // Act
        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        // Assert
        assert_eq!(outcome, PairingOutcome::Authenticated);
        assert_eq!(seen.decoded_lines(&keys), vec![PAIRING_SUCCESS.to_string()]);
        assert!(!seen.is_closed());
    }

    #[tokio::test]
    async fn test_confirmation_split_across_reads_is_reassembled() {
        let keys = test_keys();
        let line = frame_line(PAIRING_CONFIRMATION, &keys);
        let (head, tail) = line.split_at(10);
        let (mut transport, _seen) = ScriptedTransport::new(vec![head.to_vec(), tail.to_vec()]);

        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        assert_eq!(outcome, PairingOutcome::Authenticated);
    }

    #[tokio::test]
    async fn test_confirmation_without_trailing_newline_authenticates() {
        // Arrange
        let keys = test_keys();
        let bare = encode(PAIRING_CONFIRMATION, &keys).to_string().into_bytes();
        let (mut transport, seen) = ScriptedTransport::new(vec![bare]);

        // Act
        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        // Assert
        assert_eq!(outcome, PairingOutcome::Authenticated);
        assert_eq!(seen.decoded_lines(&keys), vec![PAIRING_SUCCESS.to_string()]);
        assert!(!seen.is_closed());
    }

    #[tokio::test]
    async fn test_unterminated_confirmation_split_across_reads_waits_for_full_tag() {
        let keys = test_keys();
        let bare = encode(PAIRING_CONFIRMATION, &keys).to_string().into_bytes();
        let (head, tail) = bare.split_at(bare.len() - 6);
        let (mut transport, _seen) = ScriptedTransport::new(vec![head.to_vec(), tail.to_vec()]);

        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        assert_eq!(outcome, PairingOutcome::Authenticated);
    }

    #[tokio::test]
    async fn test_unterminated_frame_with_wrong_key_is_rejected() {
        let host_keys = test_keys();
        let client_keys = DerivedKeys::from_parts(*host_keys.confidentiality(), [0xEE; 32]);
        let bare = encode(PAIRING_CONFIRMATION, &client_keys).to_string().into_bytes();
        let (mut transport, seen) = ScriptedTransport::new(vec![bare]);

        let outcome = PairingManager::new(&host_keys)
            .await_confirmation(&mut transport)
            .await;

        assert_eq!(
            outcome,
            PairingOutcome::Rejected(RejectReason::Frame(FrameError::InvalidAuthentication))
        );
        assert!(seen.is_closed());
    }

    #[tokio::test]
    async fn test_wrong_integrity_key_is_rejected_without_reply() {
        // Arrange
        let host_keys = test_keys();
        let client_keys = DerivedKeys::from_parts(*host_keys.confidentiality(), [0xEE; 32]);
        let (mut transport, seen) =
            ScriptedTransport::new(vec![frame_line(PAIRING_CONFIRMATION, &client_keys)]);

        // Act
        let outcome = PairingManager::new(&host_keys)
            .await_confirmation(&mut transport)
            .await;

        // Assert
        assert_eq!(
            outcome,
            PairingOutcome::Rejected(RejectReason::Frame(FrameError::InvalidAuthentication))
        );
        assert!(seen.written_lines().is_empty(), "nothing may be written on rejection");
        assert!(seen.is_closed());
    }

    #[tokio::test]
    async fn test_authentic_but_unexpected_message_is_rejected() {
        let keys = test_keys();
        let (mut transport, seen) =
            ScriptedTransport::new(vec![frame_line("COMMAND:MOUSE_CLICK", &keys)]);

        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        assert_eq!(outcome, PairingOutcome::Rejected(RejectReason::UnexpectedConfirmation));
        assert!(seen.written_lines().is_empty());
        assert!(seen.is_closed());
    }

    #[tokio::test]
    async fn test_garbage_line_is_rejected_as_malformed() {
        let keys = test_keys();
        let (mut transport, _seen) = ScriptedTransport::new(vec![b"hello there\n".to_vec()]);

        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        assert_eq!(
            outcome,
            PairingOutcome::Rejected(RejectReason::Frame(FrameError::MalformedFrame))
        );
    }

    #[tokio::test]
    async fn test_peer_closing_before_confirmation_is_a_disconnect() {
        let keys = test_keys();
        let (mut transport, seen) = ScriptedTransport::new(vec![b"partial".to_vec()]);

        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        assert_eq!(outcome, PairingOutcome::Disconnected);
        assert!(seen.is_closed());
    }

    #[tokio::test]
    async fn test_failed_reply_write_is_a_disconnect() {
        let keys = test_keys();
        let (transport, seen) = ScriptedTransport::new(vec![frame_line(PAIRING_CONFIRMATION, &keys)]);
        let mut transport = transport.failing_writes();

        let outcome = PairingManager::new(&keys).await_confirmation(&mut transport).await;

        assert_eq!(outcome, PairingOutcome::Disconnected);
        assert!(seen.is_closed());
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        // Arrange: a transport whose read never completes
        struct Silent;
        #[async_trait::async_trait]
        impl Transport for Silent {
            async fn read_chunk(&mut self) -> Result<Vec<u8>, TransportError> {
                std::future::pending().await
            }
            async fn write_all(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
                Ok(())
            }
            async fn close(&mut self) {}
            fn peer(&self) -> Option<std::net::SocketAddr> {
                None
            }
        }
        let keys = test_keys();

        // Act
        let outcome = PairingManager::new(&keys)
            .with_timeout(Some(Duration::from_millis(20)))
            .await_confirmation(&mut Silent)
            .await;

        // Assert
        assert_eq!(outcome, PairingOutcome::Disconnected);
    }

    #[tokio::test]
    async fn test_bytes_after_confirmation_stay_in_the_buffer() {
        let keys = test_keys();
        let mut chunk = frame_line(PAIRING_CONFIRMATION, &keys);
        chunk.extend(frame_line("COMMAND:MOUSE_CLICK", &keys));
        let (mut transport, _seen) = ScriptedTransport::new(vec![chunk]);
        let mut buffer = FrameBuffer::default();

        let outcome = PairingManager::new(&keys)
            .await_confirmation_buffered(&mut transport, &mut buffer)
            .await;

        assert_eq!(outcome, PairingOutcome::Authenticated);
        let next = buffer.next_line().expect("command line must be kept");
        assert_eq!(decode_line(&next, &keys).unwrap(), "COMMAND:MOUSE_CLICK");
    }
}
