//! AES-256-GCM-SIV field encryption primitives.
//!
//! This module is intentionally free of HTTP and storage dependencies.
//! It provides the key material, the AEAD engine, and the field codec used at
//! the persistence boundary.
//!
//! # Sealed value format
//!
//! ```text
//! base64(nonce[12] || ciphertext || tag[16])
//! ```
//!
//! Standard alphabet with padding. The empty string is never encrypted: it is
//! stored and returned as the empty string.

pub mod cipher;
pub mod field;
pub mod key;

pub use cipher::{AeadCipher, CipherError, SealedValue, NONCE_LEN, TAG_LEN};
pub use field::{FieldCodec, FieldError, StoredText};
pub use key::{generate_key, KeyError, KeyMaterial, KEY_LEN};
