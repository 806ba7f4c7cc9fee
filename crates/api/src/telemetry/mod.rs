//! Tracing setup: structured JSON logs, with optional span export over OTLP.
//!
//! # Telemetry invariants
//!
//! - **No protected field content, tokens, or key material** may appear in any
//!   span attribute or log field. Log ids, counts, and error kinds only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::init_telemetry;
