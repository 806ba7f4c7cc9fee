//! Axum router construction.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
///
/// Guards are attached per route group with `route_layer`, so unmatched paths
/// fall through to the 404 handler instead of answering 401.
pub fn build(state: AppState) -> Router {
    let session = Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/activities",
            post(handlers::create_activity).get(handlers::list_activities),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_user));

    let activity = Router::new()
        .route(
            "/activities/:id",
            get(handlers::get_activity)
                .put(handlers::update_activity)
                .delete(handlers::delete_activity),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_activity_access,
        ));

    let users = Router::new()
        .route("/users", get(handlers::list_users))
        .route(
            "/users/:id",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route("/users/:id/change_role", put(handlers::change_role))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_superadmin,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/google/verify", post(handlers::verify_google_token))
        .merge(session)
        .merge(activity)
        .merge(users)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}
