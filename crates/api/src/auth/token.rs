//! HS256 bearer token issuance and validation.
//!
//! Tokens are signed, not encrypted: claims are readable by the holder. The
//! signing secret is distinct from the field encryption key.
//!
//! Expiry is checked here rather than by `jsonwebtoken`, so the comparison is
//! strict (`now < exp`) and carries no leeway.

use chrono::{DateTime, Utc};
use common::identity::{Role, User};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `iss` claim of every token this service issues.
pub const ISSUER: &str = "activity-vault";

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    pub iss: String,
}

/// Errors produced while issuing or validating tokens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Signs new bearer tokens.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `user` valid from now.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        self.issue_at(user.id, &user.email, user.role, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = Claims {
            user_id,
            email: email.to_owned(),
            role,
            iat,
            exp: iat.saturating_add(self.ttl_secs),
            iss: ISSUER.to_owned(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

/// Verifies bearer tokens against the signing secret.
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[ISSUER]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Validate `token` as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidSignature`] if the signature does not verify or
    ///   the algorithm is not HS256.
    /// - [`TokenError::Malformed`] for anything that is not a well-formed
    ///   token from this issuer.
    /// - [`TokenError::Expired`] if `now >= exp`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(classify)?;
        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::{Duration, TimeZone};

    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";
    const DAY: u64 = 24 * 60 * 60;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn token_at(now: DateTime<Utc>) -> String {
        TokenIssuer::new(SECRET, DAY)
            .issue_at(7, "ada@example.com", Role::Admin, now)
            .unwrap()
    }

    #[test]
    fn issued_token_validates_with_claims() {
        let claims = TokenValidator::new(SECRET)
            .validate_at(&token_at(t0()), t0())
            .unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let validator = TokenValidator::new(SECRET);
        let token = token_at(t0());
        let expiry = t0() + Duration::hours(24);

        assert!(validator
            .validate_at(&token, expiry - Duration::seconds(1))
            .is_ok());
        assert_eq!(
            validator.validate_at(&token, expiry).unwrap_err(),
            TokenError::Expired
        );
        assert_eq!(
            validator
                .validate_at(&token, expiry + Duration::seconds(1))
                .unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn other_secret_is_invalid_signature() {
        let err = TokenValidator::new(b"another-secret")
            .validate_at(&token_at(t0()), t0())
            .unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn altered_payload_is_invalid_signature() {
        let token = token_at(t0());
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            br#"{"user_id":1,"email":"x@example.com","role":"superadmin","iat":0,"exp":99999999999,"iss":"activity-vault"}"#,
        );
        parts[1] = &forged_claims;
        let forged = parts.join(".");
        assert_eq!(
            TokenValidator::new(SECRET)
                .validate_at(&forged, t0())
                .unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let validator = TokenValidator::new(SECRET);
        for token in ["", "not-a-token", "a.b", "a.b.c"] {
            assert!(
                matches!(validator.validate_at(token, t0()), Err(TokenError::Malformed(_))),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn foreign_issuer_is_malformed() {
        #[derive(Serialize)]
        struct Foreign {
            user_id: i64,
            email: &'static str,
            role: Role,
            iat: i64,
            exp: i64,
            iss: &'static str,
        }
        let now = t0().timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Foreign {
                user_id: 1,
                email: "x@example.com",
                role: Role::User,
                iat: now,
                exp: now + 60,
                iss: "someone-else",
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            TokenValidator::new(SECRET).validate_at(&token, t0()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let now = t0().timestamp();
        let claims = Claims {
            user_id: 1,
            email: "x@example.com".into(),
            role: Role::User,
            iat: now,
            exp: now + 60,
            iss: ISSUER.into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(
            TokenValidator::new(SECRET).validate_at(&token, t0()).unwrap_err(),
            TokenError::InvalidSignature
        );
    }
}
