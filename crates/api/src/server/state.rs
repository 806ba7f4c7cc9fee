//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use common::crypto::{AeadCipher, FieldCodec};
use common::store::{ActivityStore, Database};
use common::ServiceError;
use tracing::error;

use super::error::ApiError;
use crate::auth::{AccessGuard, IdentityProvider, TokenIssuer, TokenValidator};

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed) so
/// that Axum can clone the state for each request.
#[derive(Clone)]
pub struct AppState {
    /// User records.
    pub db: Database,
    /// Activity records, sealed at rest.
    pub activities: ActivityStore,
    pub issuer: Arc<TokenIssuer>,
    pub guard: AccessGuard,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(
        db: Database,
        cipher: Arc<AeadCipher>,
        issuer: TokenIssuer,
        validator: TokenValidator,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let activities = ActivityStore::new(db.clone(), FieldCodec::new(cipher));
        let guard = AccessGuard::new(Arc::new(validator), Arc::new(db.clone()));
        Self {
            db,
            activities,
            issuer: Arc::new(issuer),
            guard,
            identity,
        }
    }
}

/// Run SQLite work on the blocking pool so it never stalls a runtime worker.
pub async fn run_blocking<T, E, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => {
            error!(error = %e, "blocking store task failed");
            Err(ApiError(ServiceError::Internal(e.to_string())))
        }
    }
}
