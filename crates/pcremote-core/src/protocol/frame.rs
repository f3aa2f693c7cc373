//! Secure frame codec.
//!
//! Text layout of one frame (without the trailing newline):
//! ```text
//! hex(iv) | hex(ciphertext) | hex(tag)
//! ```
//! - `iv`: 16 random bytes, fresh for every frame.
//! - `ciphertext`: AES-256-CBC with PKCS#7 padding under the confidentiality key.
//! - `tag`: HMAC-SHA256 under the integrity key over `iv || ciphertext`.
//!
//! # Why verify before decrypting? (for beginners)
//!
//! CBC decryption followed by a padding check can leak information about the
//! plaintext if an attacker can tell "bad padding" apart from "bad tag"
//! (a *padding oracle*).  Checking the tag first, in constant time, means a
//! modified frame is rejected before any decryption happens, so every
//! tampered frame produces the same [`FrameError::InvalidAuthentication`].

use std::fmt;

use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use thiserror::Error;

use crate::crypto::kdf::DerivedKeys;
use crate::protocol::tokens::FIELD_SEPARATOR;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Length of the initialisation vector in bytes.
pub const IV_LEN: usize = 16;

/// AES block length in bytes.
pub const BLOCK_LEN: usize = 16;

/// Length of the HMAC-SHA256 tag in bytes.
pub const TAG_LEN: usize = 32;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Wrong field count, invalid hex, or impossible field lengths.
    #[error("malformed frame")]
    MalformedFrame,

    /// The tag does not match `iv || ciphertext` under the integrity key.
    #[error("frame failed authentication")]
    InvalidAuthentication,

    /// The tag verified but the decrypted padding is inconsistent.
    #[error("frame has invalid padding")]
    InvalidPadding,

    /// The decrypted bytes are not valid UTF-8.
    #[error("frame plaintext is not valid UTF-8")]
    InvalidEncoding,
}

impl FrameError {
    /// Stable, log-friendly name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedFrame => "malformed_frame",
            Self::InvalidAuthentication => "invalid_authentication",
            Self::InvalidPadding => "invalid_padding",
            Self::InvalidEncoding => "invalid_encoding",
        }
    }
}

/// One sealed message: IV, ciphertext, and authentication tag.
///
/// A frame is obtained either by sealing a plaintext ([`SecureFrame::seal`]),
/// which always draws a fresh IV, or by parsing wire text
/// ([`SecureFrame::parse`]).  Parsing checks structure only; call
/// [`SecureFrame::open`] to authenticate and decrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureFrame {
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl SecureFrame {
    /// Encrypts and authenticates `plaintext` under `keys` with a fresh IV.
    pub fn seal(plaintext: &str, keys: &DerivedKeys) -> Self {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        seal_bytes(iv, plaintext.as_bytes(), keys)
    }

    /// Parses the `hex|hex|hex` wire text of a frame.
    ///
    /// Surrounding ASCII whitespace (including a trailing `\r\n`) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::MalformedFrame`] if the field count, hex, IV
    /// length, or ciphertext length is wrong.  A tag of the wrong length is
    /// accepted here and rejected by [`SecureFrame::open`].
    pub fn parse(wire: &str) -> Result<Self, FrameError> {
        let text = wire.trim_matches(|c: char| c.is_ascii_whitespace());
        let mut fields = text.split(FIELD_SEPARATOR);
        let (Some(iv_hex), Some(ct_hex), Some(tag_hex), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(FrameError::MalformedFrame);
        };

        let iv: [u8; IV_LEN] = hex::decode(iv_hex)
            .map_err(|_| FrameError::MalformedFrame)?
            .try_into()
            .map_err(|_| FrameError::MalformedFrame)?;
        let ciphertext = hex::decode(ct_hex).map_err(|_| FrameError::MalformedFrame)?;
        let tag = hex::decode(tag_hex).map_err(|_| FrameError::MalformedFrame)?;

        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(FrameError::MalformedFrame);
        }

        Ok(Self { iv, ciphertext, tag })
    }

    /// Verifies the tag and, only if it matches, decrypts the plaintext.
    ///
    /// # Errors
    ///
    /// - [`FrameError::InvalidAuthentication`] if the tag does not verify.
    /// - [`FrameError::InvalidPadding`] if the padding is inconsistent.
    /// - [`FrameError::InvalidEncoding`] if the plaintext is not UTF-8.
    pub fn open(&self, keys: &DerivedKeys) -> Result<String, FrameError> {
        let mut mac = new_mac(keys);
        mac.update(&self.iv);
        mac.update(&self.ciphertext);
        mac.verify_slice(&self.tag)
            .map_err(|_| FrameError::InvalidAuthentication)?;

        let plaintext = Aes256CbcDec::new(&(*keys.confidentiality()).into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&self.ciphertext)
            .map_err(|_| FrameError::InvalidPadding)?;

        String::from_utf8(plaintext).map_err(|_| FrameError::InvalidEncoding)
    }

    /// The initialisation vector.
    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// The ciphertext (a whole number of AES blocks).
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// The authentication tag.
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    /// Wire text followed by the frame delimiter.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for SecureFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            hex::encode(self.iv),
            hex::encode(&self.ciphertext),
            hex::encode(&self.tag),
            sep = FIELD_SEPARATOR
        )
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Seals `plaintext` into a new frame.
///
/// # Examples
///
/// ```rust
/// use pcremote_core::{decode, encode, DerivedKeys, SharedSecret};
///
/// let keys = DerivedKeys::derive(&SharedSecret::generate());
/// let frame = encode("COMMAND:MOUSE_CLICK", &keys);
/// assert_eq!(decode(&frame.to_string(), &keys).unwrap(), "COMMAND:MOUSE_CLICK");
/// ```
pub fn encode(plaintext: &str, keys: &DerivedKeys) -> SecureFrame {
    SecureFrame::seal(plaintext, keys)
}

/// Parses, authenticates, and decrypts one frame of wire text.
///
/// # Errors
///
/// Returns the first [`FrameError`] hit, in the order: structure,
/// authentication, padding, encoding.
pub fn decode(wire: &str, keys: &DerivedKeys) -> Result<String, FrameError> {
    SecureFrame::parse(wire)?.open(keys)
}

/// Like [`decode`], for a raw line taken off the byte stream.
///
/// # Errors
///
/// Non-UTF-8 line bytes are [`FrameError::MalformedFrame`]; otherwise as
/// [`decode`].
pub fn decode_line(line: &[u8], keys: &DerivedKeys) -> Result<String, FrameError> {
    let text = std::str::from_utf8(line).map_err(|_| FrameError::MalformedFrame)?;
    decode(text, keys)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn seal_bytes(iv: [u8; IV_LEN], plaintext: &[u8], keys: &DerivedKeys) -> SecureFrame {
    let ciphertext = Aes256CbcEnc::new(&(*keys.confidentiality()).into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = compute_tag(keys, &iv, &ciphertext);
    SecureFrame { iv, ciphertext, tag }
}

fn compute_tag(keys: &DerivedKeys, iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(keys);
    mac.update(iv);
    mac.update(ciphertext);
    mac.finalize().into_bytes().to_vec()
}

fn new_mac(keys: &DerivedKeys) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(keys.integrity()).expect("HMAC can take key of any size")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
