//! `activity-vault` API binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Load the field encryption key and build the cipher.
//! 4. Open the database and bootstrap the schema.
//! 5. Build token issuance/validation and the identity provider.
//! 6. Build the Axum router and start the HTTP server.

mod auth;
mod config;
mod server;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use common::crypto::{AeadCipher, KeyMaterial};
use common::store::Database;
use tracing::info;

use auth::{GoogleTokenInfo, TokenIssuer, TokenValidator};
use config::Config;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.port,
        "activity-vault api starting"
    );

    // -----------------------------------------------------------------------
    // 3. Field encryption key
    // -----------------------------------------------------------------------
    let key = KeyMaterial::from_base64(&cfg.encryption_key).context("ENCRYPTION_KEY rejected")?;
    let cipher = Arc::new(AeadCipher::new(key));

    // -----------------------------------------------------------------------
    // 4. Database
    // -----------------------------------------------------------------------
    let db = Database::open(&cfg.database_path)
        .with_context(|| format!("failed to open database at {}", cfg.database_path))?;

    // -----------------------------------------------------------------------
    // 5. Tokens and identity provider
    // -----------------------------------------------------------------------
    let issuer = TokenIssuer::new(cfg.jwt_secret.as_bytes(), cfg.token_ttl_secs);
    let validator = TokenValidator::new(cfg.jwt_secret.as_bytes());
    let identity = Arc::new(GoogleTokenInfo::new(
        cfg.google_tokeninfo_url.clone(),
        cfg.google_client_id.clone(),
    ));

    // -----------------------------------------------------------------------
    // 6. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(db, cipher, issuer, validator, identity);
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router).await?;

    Ok(())
}
