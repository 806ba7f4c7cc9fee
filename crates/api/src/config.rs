//! Configuration loading and validation for the API service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated API service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base64 AES-256 field encryption key. **Required.** Validated when the
    /// key material is loaded.
    #[serde(default)]
    pub encryption_key: String,

    /// HMAC secret for signing bearer tokens. **Required.**
    #[serde(default)]
    pub jwt_secret: String,

    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Identity provider token verification endpoint.
    #[serde(default = "default_tokeninfo_url")]
    pub google_tokeninfo_url: String,

    /// Expected `aud` of identity provider tokens. Unchecked when unset.
    #[serde(default)]
    pub google_client_id: Option<String>,

    /// OTLP endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_path() -> String {
    "activity-vault.db".into()
}
fn default_port() -> u16 {
    3005
}
fn default_token_ttl() -> u64 {
    24 * 60 * 60
}
fn default_tokeninfo_url() -> String {
    "https://oauth2.googleapis.com/tokeninfo".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.encryption_key, "ENCRYPTION_KEY")?;
        ensure_non_empty(&self.jwt_secret, "JWT_SECRET")?;
        ensure_non_empty(&self.database_path, "DATABASE_PATH")?;

        if self.jwt_secret.trim() == self.encryption_key.trim() {
            anyhow::bail!("JWT_SECRET must differ from ENCRYPTION_KEY");
        }
        if self.token_ttl_secs == 0 {
            anyhow::bail!("TOKEN_TTL_SECS must be > 0");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("encryption_key", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("database_path", &self.database_path)
            .field("port", &self.port)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("google_tokeninfo_url", &self.google_tokeninfo_url)
            .field("google_client_id", &self.google_client_id)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
