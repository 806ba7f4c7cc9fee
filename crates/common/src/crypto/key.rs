//! [`KeyMaterial`]: the process-wide field encryption key.
//!
//! # Lifecycle
//!
//! 1. At startup the binary reads the base64 `ENCRYPTION_KEY` from its
//!    configuration and calls [`KeyMaterial::from_base64`].
//! 2. The decoded key is moved into [`AeadCipher::new`](super::AeadCipher::new)
//!    and is never reloaded for the lifetime of the process.
//!
//! # Security invariants
//!
//! - The key is **never** logged, serialised, or included in traces.
//! - The key bytes are zeroed when the value is dropped.

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use zeroize::Zeroize;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Errors produced while loading key material.
///
/// Every variant is fatal at startup: the service must not serve requests
/// without a valid key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// No key was supplied.
    #[error("encryption key is not set")]
    Missing,

    /// The key is not valid standard base64.
    #[error("encryption key is not valid base64")]
    InvalidEncoding,

    /// The decoded key has the wrong length.
    #[error("encryption key must be {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Fixed-size key buffer holding exactly [`KEY_LEN`] bytes.
pub struct KeyMaterial(Box<[u8; KEY_LEN]>);

impl KeyMaterial {
    /// Decode and validate a base64-encoded key.
    ///
    /// Surrounding whitespace is ignored so values copied from `.env` files
    /// with a trailing newline still load.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] for an empty value,
    /// [`KeyError::InvalidEncoding`] if the value is not base64, and
    /// [`KeyError::InvalidLength`] unless it decodes to exactly [`KEY_LEN`] bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(KeyError::Missing);
        }
        let mut decoded = STANDARD
            .decode(encoded)
            .map_err(|_| KeyError::InvalidEncoding)?;
        let result = Self::from_bytes(&decoded);
        decoded.zeroize();
        result
    }

    /// Build key material from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if `bytes` is not [`KEY_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Generate a fresh random key and return it base64-encoded.
///
/// Used once per deployment by the provisioning tool; the running service
/// never calls this.
pub fn generate_key() -> String {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    let encoded = STANDARD.encode(key);
    key.zeroize();
    encoded
}
