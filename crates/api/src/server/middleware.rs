//! Axum middleware applied to the router.
//!
//! Route-level guards run the access pipeline and, on success, attach the
//! caller as a [`CurrentUser`] request extension for handlers to extract.
//! Tracing, timeout enforcement, and response compression are applied
//! router-wide in [`super::router`].

use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use common::{identity::User, ServiceError};

use super::{
    error::ApiError,
    state::{run_blocking, AppState},
};
use crate::auth::AccessPolicy;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The authenticated caller, as currently stored.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthenticated("no authenticated caller".into()).into())
    }
}

/// Any authenticated, live user.
pub async fn require_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, AccessPolicy::AUTHENTICATED, None, request, next).await
}

/// Superadmins only.
pub async fn require_superadmin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, AccessPolicy::SUPERADMIN, None, request, next).await
}

/// The activity's owner, or an admin and above.
pub async fn require_activity_access(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, AccessPolicy::OWNER_OR_ADMIN, Some(id), request, next).await
}

async fn enforce(
    state: &AppState,
    policy: AccessPolicy,
    resource: Option<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // User and owner lookups hit SQLite.
    let guard = state.guard.clone();
    let owners = state.activities.clone();
    let user = run_blocking(move || {
        guard.check(authorization.as_deref(), policy, resource.as_deref(), &owners)
    })
    .await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
