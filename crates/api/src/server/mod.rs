//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes, guards, and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.
//! - Render every failure as the `{code, message, detail?}` error body.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
