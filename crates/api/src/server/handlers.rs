//! Axum request handlers for all service endpoints.
//!
//! Guards run as route layers before these handlers; a handler that extracts
//! [`CurrentUser`] only ever sees an approved, live caller. Store calls go
//! through [`run_blocking`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{
    identity::User,
    protocol::{
        ActivityInput, ApiResponse, ChangeRoleRequest, ErrorResponse, HealthResponse,
        LoginResponse, VerifyTokenRequest,
    },
    store::Activity,
    ServiceError,
};
use tracing::info;

use super::{
    error::ApiError,
    middleware::CurrentUser,
    state::{run_blocking, AppState},
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Path ids that do not parse name nothing, whoever asks.
fn parse_id(raw: &str, entity: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ServiceError::NotFound(format!("{entity} {raw} not found")).into())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// `GET /health`: liveness and readiness check.
///
/// Returns `503 Service Unavailable` when the database does not answer.
pub async fn health(State(state): State<AppState>) -> Response {
    let db = state.db.clone();
    let database = tokio::task::spawn_blocking(move || db.ping())
        .await
        .unwrap_or(false);
    let (status_code, status_str) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        database,
    };
    (status_code, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// `POST /auth/google/verify`: exchange an identity token for a bearer token.
///
/// First-time users are registered with role `user`.
pub async fn verify_google_token(
    State(state): State<AppState>,
    Json(req): Json<VerifyTokenRequest>,
) -> ApiResult<LoginResponse> {
    if req.id_token.trim().is_empty() {
        return Err(ServiceError::BadRequest("id_token is required".into()).into());
    }

    let identity = state.identity.verify(&req.id_token).await?;

    let db = state.db.clone();
    let user = run_blocking(move || -> Result<User, ApiError> {
        match db.find_user_by_google_id(&identity.subject)? {
            Some(existing) if existing.is_deleted() => Err(ApiError(
                ServiceError::Unauthenticated("account has been deleted".into()),
            )),
            Some(existing) => Ok(db.record_login(existing.id)?),
            None => {
                let created = db.create_user(&identity)?;
                info!(user_id = created.id, "registered new user");
                Ok(created)
            }
        }
    })
    .await?;

    let token = state.issuer.issue(&user)?;
    info!(user_id = user.id, role = %user.role, "login");

    Ok(Json(ApiResponse::ok(
        "Login successful",
        LoginResponse { token, user },
    )))
}

/// `GET /auth/me`
pub async fn me(CurrentUser(user): CurrentUser) -> ApiResult<User> {
    Ok(Json(ApiResponse::ok("User retrieved successfully", user)))
}

/// `POST /auth/logout`: tokens are stateless; this only records the activity.
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<()> {
    let db = state.db.clone();
    run_blocking(move || db.record_login(user.id)).await?;
    info!(user_id = user.id, "logout");
    Ok(Json(ApiResponse::message("Logged out successfully")))
}

// ---------------------------------------------------------------------------
// Users (superadmin)
// ---------------------------------------------------------------------------

/// `GET /users`
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let db = state.db.clone();
    let users = run_blocking(move || db.list_users()).await?;
    Ok(Json(ApiResponse::ok("Users retrieved successfully", users)))
}

/// `GET /users/:id`
pub async fn get_user(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<User> {
    let id = parse_id(&raw, "user")?;
    let db = state.db.clone();
    match run_blocking(move || db.find_user(id)).await? {
        Some(user) if !user.is_deleted() => {
            Ok(Json(ApiResponse::ok("User retrieved successfully", user)))
        }
        _ => Err(ServiceError::NotFound(format!("user {id} not found")).into()),
    }
}

/// `PUT /users/:id/change_role`
///
/// Takes effect on the target's next request; outstanding tokens are not
/// reissued.
pub async fn change_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(raw): Path<String>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<User> {
    let id = parse_id(&raw, "user")?;
    let db = state.db.clone();
    let role = req.role;
    let user = run_blocking(move || db.set_role(id, role)).await?;
    info!(actor = actor.id, user_id = id, role = %req.role, "role changed");
    Ok(Json(ApiResponse::ok("User role updated successfully", user)))
}

/// `DELETE /users/:id`: soft delete; the user's tokens stop validating.
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(raw): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&raw, "user")?;
    let db = state.db.clone();
    run_blocking(move || db.soft_delete_user(id)).await?;
    info!(actor = actor.id, user_id = id, "user deleted");
    Ok(Json(ApiResponse::message("User deleted successfully")))
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

fn validate(input: &ActivityInput) -> Result<(), ApiError> {
    if input.description.trim().is_empty() {
        return Err(ServiceError::BadRequest("description is required".into()).into());
    }
    Ok(())
}

/// `POST /activities`: create an activity owned by the caller.
pub async fn create_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ActivityInput>,
) -> Result<(StatusCode, Json<ApiResponse<Activity>>), ApiError> {
    validate(&input)?;
    let activities = state.activities.clone();
    let activity = run_blocking(move || activities.create(user.id, &input)).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Activity created successfully", activity)),
    ))
}

/// `GET /activities`: the caller's own activities, newest first.
pub async fn list_activities(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Activity>> {
    let store = state.activities.clone();
    let activities = run_blocking(move || store.list_for_owner(user.id)).await?;
    Ok(Json(ApiResponse::ok(
        "Activities retrieved successfully",
        activities,
    )))
}

/// `GET /activities/:id`
pub async fn get_activity(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Activity> {
    let id = parse_id(&raw, "activity")?;
    let activities = state.activities.clone();
    let activity = run_blocking(move || activities.get(id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("activity {id} not found")))?;
    Ok(Json(ApiResponse::ok(
        "Activity retrieved successfully",
        activity,
    )))
}

/// `PUT /activities/:id`: replace description and notes.
pub async fn update_activity(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(input): Json<ActivityInput>,
) -> ApiResult<Activity> {
    let id = parse_id(&raw, "activity")?;
    validate(&input)?;
    let activities = state.activities.clone();
    let activity = run_blocking(move || activities.update(id, &input)).await?;
    Ok(Json(ApiResponse::ok("Activity updated successfully", activity)))
}

/// `DELETE /activities/:id`
pub async fn delete_activity(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&raw, "activity")?;
    let activities = state.activities.clone();
    run_blocking(move || activities.delete(id)).await?;
    Ok(Json(ApiResponse::message("Activity deleted successfully")))
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("NOT_FOUND", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
