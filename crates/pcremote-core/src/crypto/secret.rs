//! The per-run shared secret.
//!
//! # What is the shared secret? (for beginners)
//!
//! When the host starts it draws 32 random bytes from the operating system's
//! cryptographically secure random number generator.  Those bytes are shown
//! on screen as a QR code (hex text) and scanned by the phone.  Because the
//! secret never crosses the network, an eavesdropper on the Wi-Fi cannot
//! learn it, and every session key is derived from it.
//!
//! The secret lives only in memory for one host run.  The buffer is wiped
//! (zeroized) when the value is dropped, and the `Debug` output never prints
//! the bytes.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Length of the shared secret in bytes.
pub const SECRET_LEN: usize = 32;

/// Error returned when parsing a shared secret from its hex form fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretParseError {
    /// The text is not valid hexadecimal.
    #[error("shared secret is not valid hex")]
    InvalidHex,
    /// The decoded secret has the wrong length.
    #[error("shared secret must be {SECRET_LEN} bytes, got {0}")]
    WrongLength(usize),
}

/// A fixed-length random secret transferred to the client out-of-band.
#[derive(Clone)]
pub struct SharedSecret {
    bytes: Zeroizing<[u8; SECRET_LEN]>,
}

impl SharedSecret {
    /// Generates a new secret from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; SECRET_LEN]);
        OsRng.fill_bytes(&mut *bytes);
        Self { bytes }
    }

    /// Wraps existing secret bytes.
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Parses the lowercase or uppercase hex form the client scans.
    ///
    /// # Errors
    ///
    /// Returns [`SecretParseError`] if the text is not hex or has the wrong length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pcremote_core::SharedSecret;
    ///
    /// let secret = SharedSecret::generate();
    /// let parsed = SharedSecret::from_hex(&secret.to_hex()).unwrap();
    /// assert_eq!(parsed.as_bytes(), secret.as_bytes());
    /// ```
    pub fn from_hex(text: &str) -> Result<Self, SecretParseError> {
        let decoded =
            Zeroizing::new(hex::decode(text.trim()).map_err(|_| SecretParseError::InvalidHex)?);
        if decoded.len() != SECRET_LEN {
            return Err(SecretParseError::WrongLength(decoded.len()));
        }
        let mut bytes = Zeroizing::new([0u8; SECRET_LEN]);
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    /// Returns the lowercase hex text used for out-of-band transfer.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.bytes))
    }

    /// Returns the raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
