//! Key derivation functions (HKDF-SHA256).
//!
//! One [`SharedSecret`] is turned into two independent 32-byte subkeys:
//!
//! - the *confidentiality* key (label `"encryption"`) feeds AES-256-CBC;
//! - the *integrity* key (label `"hmac"`) feeds HMAC-SHA256.
//!
//! Both derivations use the same fixed salt.  The distinct labels (HKDF
//! `info`) are what make the two keys independent.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::secret::SharedSecret;

/// Fixed salt shared with every client implementation.
pub const KDF_SALT: &[u8] = b"PCREMOTE_SALT";

/// Domain-separation label of the confidentiality key.
pub const LABEL_ENCRYPTION: &str = "encryption";

/// Domain-separation label of the integrity key.
pub const LABEL_INTEGRITY: &str = "hmac";

/// Length of each derived subkey in bytes.
pub const KEY_LEN: usize = 32;

/// Error type for key derivation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KdfError {
    /// HKDF-SHA256 can expand to at most 255 * 32 bytes.
    #[error("requested {0} bytes of key material; HKDF-SHA256 allows at most 8160")]
    InvalidLength(usize),
}

/// Generic HKDF-SHA256 key derivation per RFC 5869.
///
/// # Errors
///
/// Returns [`KdfError::InvalidLength`] if `output_len` exceeds the HKDF limit.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    hk.expand(info, &mut okm)
        .map_err(|_| KdfError::InvalidLength(output_len))?;
    Ok(okm)
}

/// Derives `output_len` bytes from `secret` under the fixed salt and `label`.
///
/// Pure and deterministic: the same `(secret, label, output_len)` always
/// yields the same bytes.
///
/// # Errors
///
/// Returns [`KdfError::InvalidLength`] if `output_len` exceeds the HKDF limit.
///
/// # Examples
///
/// ```rust
/// use pcremote_core::crypto::kdf::{derive, LABEL_ENCRYPTION, LABEL_INTEGRITY};
///
/// let secret = [7u8; 32];
/// let enc = derive(&secret, LABEL_ENCRYPTION, 32).unwrap();
/// let mac = derive(&secret, LABEL_INTEGRITY, 32).unwrap();
/// assert_ne!(*enc, *mac);
/// assert_eq!(*enc, *derive(&secret, LABEL_ENCRYPTION, 32).unwrap());
/// ```
pub fn derive(secret: &[u8], label: &str, output_len: usize) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    hkdf_sha256(secret, KDF_SALT, label.as_bytes(), output_len)
}

/// The confidentiality and integrity subkeys of one host run.
///
/// Cloning is cheap (64 bytes) and every copy wipes itself on drop.
#[derive(Clone)]
pub struct DerivedKeys {
    confidentiality: Zeroizing<[u8; KEY_LEN]>,
    integrity: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKeys {
    /// Derives both subkeys from the shared secret.
    pub fn derive(secret: &SharedSecret) -> Self {
        Self {
            confidentiality: derive_fixed(secret.as_bytes(), LABEL_ENCRYPTION),
            integrity: derive_fixed(secret.as_bytes(), LABEL_INTEGRITY),
        }
    }

    /// Builds a key pair from raw subkeys.
    pub fn from_parts(confidentiality: [u8; KEY_LEN], integrity: [u8; KEY_LEN]) -> Self {
        Self {
            confidentiality: Zeroizing::new(confidentiality),
            integrity: Zeroizing::new(integrity),
        }
    }

    /// Key for AES-256-CBC.
    pub fn confidentiality(&self) -> &[u8; KEY_LEN] {
        &self.confidentiality
    }

    /// Key for HMAC-SHA256.
    pub fn integrity(&self) -> &[u8; KEY_LEN] {
        &self.integrity
    }
}

impl fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKeys { confidentiality: <redacted>, integrity: <redacted> }")
    }
}

/// Fixed-size derivation; a 32-byte expansion can never hit the HKDF limit.
fn derive_fixed(secret: &[u8], label: &str) -> Zeroizing<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    if hk.expand(label.as_bytes(), &mut *okm).is_err() {
        unreachable!("32 bytes is within the HKDF-SHA256 output limit");
    }
    okm
}

// ── Tests ─────────────────────────────────────────────────────────────────────
