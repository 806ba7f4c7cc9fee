//! Field codec applied at the persistence boundary.
//!
//! Everything above the store sees plaintext `String`s; everything written to
//! a protected column goes through [`FieldCodec::seal`]. There is no type that
//! carries an "is encrypted" flag into API responses.

use std::sync::Arc;

use thiserror::Error;

use super::cipher::{AeadCipher, CipherError, SealedValue};

/// Errors produced while sealing or opening a protected column.
///
/// The caller treats these as fatal to the single record operation in
/// progress.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("failed to seal field `{field}`")]
    Seal {
        field: &'static str,
        #[source]
        source: CipherError,
    },

    #[error("failed to open field `{field}`")]
    Open {
        field: &'static str,
        #[source]
        source: CipherError,
    },
}

impl FieldError {
    /// The underlying cipher error.
    pub fn cipher_error(&self) -> &CipherError {
        match self {
            FieldError::Seal { source, .. } | FieldError::Open { source, .. } => source,
        }
    }
}

/// The raw contents of a protected column, tagged by the row's `sealed` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredText {
    /// Written through the codec: a [`SealedValue`] token.
    Sealed(SealedValue),
    /// A legacy row the backfill has not reached yet.
    Plain(String),
}

impl StoredText {
    /// Interpret a column value according to the row's marker.
    pub fn from_column(value: String, sealed: bool) -> Self {
        if sealed {
            StoredText::Sealed(SealedValue::from_token(value))
        } else {
            StoredText::Plain(value)
        }
    }

    /// The exact text held in storage.
    pub fn as_stored(&self) -> &str {
        match self {
            StoredText::Sealed(v) => v.as_str(),
            StoredText::Plain(s) => s,
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, StoredText::Sealed(_))
    }
}

/// Transparent plaintext ⇄ sealed-token conversion for protected fields.
#[derive(Clone, Debug)]
pub struct FieldCodec {
    cipher: Arc<AeadCipher>,
}

impl FieldCodec {
    pub fn new(cipher: Arc<AeadCipher>) -> Self {
        Self { cipher }
    }

    /// Seal `plaintext` for the column named `field`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Seal`] wrapping the cipher failure.
    pub fn seal(&self, field: &'static str, plaintext: &str) -> Result<SealedValue, FieldError> {
        self.cipher
            .encrypt(plaintext)
            .map_err(|source| FieldError::Seal { field, source })
    }

    /// Recover the plaintext of the column named `field`.
    ///
    /// Legacy [`StoredText::Plain`] values are returned as stored.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Open`] if a sealed token fails to decrypt.
    pub fn open(&self, field: &'static str, stored: &StoredText) -> Result<String, FieldError> {
        match stored {
            StoredText::Sealed(token) => self
                .cipher
                .decrypt(token.as_str())
                .map_err(|source| FieldError::Open { field, source }),
            StoredText::Plain(text) => Ok(text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key::{generate_key, KeyMaterial};

    fn codec() -> FieldCodec {
        let key = KeyMaterial::from_base64(&generate_key()).unwrap();
        FieldCodec::new(Arc::new(AeadCipher::new(key)))
    }

    #[test]
    fn seal_then_open_returns_plaintext() {
        let codec = codec();
        let sealed = codec.seal("description", "secret note").unwrap();
        assert_ne!(sealed.as_str(), "secret note");
        let stored = StoredText::Sealed(sealed);
        assert_eq!(codec.open("description", &stored).unwrap(), "secret note");
    }

    #[test]
    fn plain_rows_pass_through() {
        let codec = codec();
        let stored = StoredText::from_column("legacy text".into(), false);
        assert!(!stored.is_sealed());
        assert_eq!(codec.open("notes", &stored).unwrap(), "legacy text");
    }

    #[test]
    fn empty_field_stays_empty() {
        let codec = codec();
        let sealed = codec.seal("notes", "").unwrap();
        assert!(sealed.is_empty());
        let stored = StoredText::from_column(String::new(), true);
        assert_eq!(codec.open("notes", &stored).unwrap(), "");
    }

    #[test]
    fn open_failure_names_the_field() {
        let codec = codec();
        let stored = StoredText::from_column("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(), true);
        let err = codec.open("description", &stored).unwrap_err();
        assert!(err.to_string().contains("description"));
        assert_eq!(err.cipher_error(), &CipherError::Integrity);
    }

    #[test]
    fn sealed_by_another_key_fails() {
        let sealed = codec().seal("description", "x").unwrap();
        let err = codec()
            .open("description", &StoredText::Sealed(sealed))
            .unwrap_err();
        assert!(matches!(err, FieldError::Open { .. }));
    }
}
