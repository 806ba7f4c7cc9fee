//! External identity provider: exchanges a Google ID token for a verified
//! identity.

use async_trait::async_trait;
use common::identity::VerifiedIdentity;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider rejected the token (status {0})")]
    Rejected(u16),

    #[error("email address is not verified")]
    EmailNotVerified,

    #[error("token was issued for another audience")]
    AudienceMismatch,

    #[error("token has no subject or email")]
    Incomplete,
}

/// Verifies an identity token and returns who it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Subset of the Google `tokeninfo` response.
///
/// Google encodes `email_verified` as the string `"true"`.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
    #[serde(default)]
    aud: String,
}

impl TokenInfo {
    fn into_identity(self, audience: Option<&str>) -> Result<VerifiedIdentity, IdentityError> {
        if self.email_verified != "true" {
            return Err(IdentityError::EmailNotVerified);
        }
        if let Some(expected) = audience {
            if self.aud != expected {
                return Err(IdentityError::AudienceMismatch);
            }
        }
        if self.sub.is_empty() || self.email.is_empty() {
            return Err(IdentityError::Incomplete);
        }
        Ok(VerifiedIdentity {
            subject: self.sub,
            email: self.email,
            name: self.name,
            picture: self.picture,
        })
    }
}

/// Verifies tokens against Google's `tokeninfo` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTokenInfo {
    client: reqwest::Client,
    endpoint: String,
    audience: Option<String>,
}

impl GoogleTokenInfo {
    pub fn new(endpoint: impl Into<String>, audience: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            audience,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleTokenInfo {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IdentityError::Rejected(status.as_u16()));
        }

        resp.json::<TokenInfo>()
            .await?
            .into_identity(self.audience.as_deref())
    }
}
