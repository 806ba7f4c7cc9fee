//! AES-256-GCM-SIV encryption and decryption of individual string fields.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant.
//! A fresh random nonce is still drawn for every call, so sealing the same
//! plaintext twice yields different tokens.
//!
//! **Do NOT add a decrypt path that skips tag verification.** The tag is the
//! only defence against ciphertext tampering.

use aes_gcm_siv::{
    aead::{generic_array::GenericArray, rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use super::key::KeyMaterial;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the AES-GCM-SIV authentication tag.
pub const TAG_LEN: usize = 16;

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Authentication failed: the token was tampered with, corrupted, or
    /// sealed under a different key.
    #[error("integrity check failed")]
    Integrity,

    /// The token is not decodable or cannot contain a nonce.
    #[error("malformed sealed value: {0}")]
    MalformedInput(&'static str),

    /// AEAD encryption failed (unreachable with a valid key and nonce).
    #[error("aead encryption failed")]
    EncryptionFailed,
}

/// A sealed field value: `base64(nonce || ciphertext || tag)`.
///
/// The empty string is the unencrypted sentinel for an empty plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SealedValue(String);

impl SealedValue {
    /// The sealed form of the empty plaintext.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Wrap a token read back from storage.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Stateless AEAD engine bound to a single key.
///
/// Cloning is cheap enough to do per task, but the usual pattern is to share
/// one instance behind an `Arc`; no method takes `&mut self`.
#[derive(Clone)]
pub struct AeadCipher {
    aead: Aes256GcmSiv,
}

impl AeadCipher {
    /// Build the cipher, taking ownership of the key material.
    pub fn new(key: KeyMaterial) -> Self {
        let aead = Aes256GcmSiv::new(GenericArray::from_slice(key.as_bytes()));
        Self { aead }
    }

    /// Seal a plaintext string.
    ///
    /// A random 96-bit nonce is generated per call via the OS CSPRNG. The
    /// empty string is returned unchanged without touching the cipher.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::EncryptionFailed`] on an internal AEAD error.
    pub fn encrypt(&self, plaintext: &str) -> Result<SealedValue, CipherError> {
        if plaintext.is_empty() {
            return Ok(SealedValue::empty());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&ciphertext);
        Ok(SealedValue(STANDARD.encode(packed)))
    }

    /// Open a sealed token back to plaintext.
    ///
    /// The empty token is returned as the empty string without touching the
    /// cipher.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::MalformedInput`] if the token is not base64 or is
    /// shorter than a nonce, and [`CipherError::Integrity`] if authentication
    /// fails.
    pub fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        if token.is_empty() {
            return Ok(String::new());
        }

        let packed = STANDARD
            .decode(token)
            .map_err(|_| CipherError::MalformedInput("not valid base64"))?;
        if packed.len() < NONCE_LEN {
            return Err(CipherError::MalformedInput("shorter than one nonce"));
        }

        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_LEN);
        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::Integrity)?;

        String::from_utf8(plaintext)
            .map_err(|_| CipherError::MalformedInput("plaintext is not valid UTF-8"))
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AeadCipher([REDACTED])")
    }
}
