//! Configuration loading and validation for `keytool encrypt-data`.

use anyhow::{Context, Result};
use common::store::validate_identifier;
use serde::Deserialize;

/// Validated backfill configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base64 AES-256 field encryption key. **Required.**
    #[serde(default)]
    pub encryption_key: String,

    /// SQLite database file holding the table to backfill.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Table whose `description` and `notes` columns are encrypted.
    #[serde(default = "default_backfill_table")]
    pub backfill_table: String,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_path() -> String {
    "activity-vault.db".into()
}
fn default_backfill_table() -> String {
    "activities".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build keytool configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise keytool configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.encryption_key.trim().is_empty() {
            anyhow::bail!(
                "ENCRYPTION_KEY not set; generate one with `keytool generate-key` and add it to the environment"
            );
        }
        if self.database_path.trim().is_empty() {
            anyhow::bail!("DATABASE_PATH must not be empty");
        }
        validate_identifier(&self.backfill_table)
            .context("BACKFILL_TABLE is not a plain table name")?;
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("encryption_key", &"[REDACTED]")
            .field("database_path", &self.database_path)
            .field("backfill_table", &self.backfill_table)
            .field("log_level", &self.log_level)
            .finish()
    }
}
