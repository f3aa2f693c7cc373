//! Key material: the per-run shared secret and the subkeys derived from it.

pub mod kdf;
pub mod secret;
