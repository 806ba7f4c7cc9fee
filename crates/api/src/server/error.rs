//! Mapping from internal errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, store::StoreError, ServiceError};
use tracing::{error, warn};

use crate::auth::{GuardError, IdentityError, TokenError};

/// Handler error; renders as `{code, message, detail?}`.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self.0 {
            ServiceError::BadRequest(d) => {
                ErrorResponse::new(self.0.code(), "Invalid request").with_detail(d)
            }
            ServiceError::Unauthenticated(d) => {
                ErrorResponse::new(self.0.code(), "Authentication required").with_detail(d)
            }
            ServiceError::Forbidden(d) => {
                ErrorResponse::new(self.0.code(), "Access denied").with_detail(d)
            }
            ServiceError::NotFound(d) => {
                ErrorResponse::new(self.0.code(), "Resource not found").with_detail(d)
            }
            // Never echo internals to the client.
            ServiceError::EncryptionFailure(_) => {
                ErrorResponse::new(self.0.code(), "Failed to process protected data")
            }
            ServiceError::Internal(_) => ErrorResponse::new(self.0.code(), "Internal server error"),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Unauthenticated(m) => Self(ServiceError::Unauthenticated(m)),
            GuardError::Forbidden(m) => Self(ServiceError::Forbidden(m)),
            GuardError::NotFound(m) => Self(ServiceError::NotFound(m)),
            GuardError::Lookup(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self(ServiceError::NotFound(err.to_string())),
            StoreError::Field(ref e) => {
                error!(error = %e, "protected field could not be processed");
                Self(ServiceError::EncryptionFailure(e.to_string()))
            }
            StoreError::Sqlite(_) | StoreError::InvalidTableName(_) => {
                error!(error = %err, "storage failure");
                Self(ServiceError::Internal(err.to_string()))
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        error!(error = %err, "token issuance failed");
        Self(ServiceError::Internal(err.to_string()))
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Transport(ref e) => {
                warn!(error = %e, "identity provider unreachable");
                Self(ServiceError::Internal(err.to_string()))
            }
            other => Self(ServiceError::Unauthenticated(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use common::crypto::{CipherError, FieldError};
    use serde_json::Value;

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn guard_errors_keep_distinct_statuses() {
        let (s, body) = render(GuardError::Unauthenticated("token expired".into()).into()).await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert_eq!(body["detail"], "token expired");

        let (s, _) = render(GuardError::Forbidden("no".into()).into()).await;
        assert_eq!(s, StatusCode::FORBIDDEN);

        let (s, _) = render(GuardError::NotFound("gone".into()).into()).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn field_failure_is_opaque_encryption_error() {
        let err = StoreError::Field(FieldError::Open {
            field: "notes",
            source: CipherError::Integrity,
        });
        let (s, body) = render(err.into()).await;
        assert_eq!(s, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "ENCRYPTION_ERROR");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let (s, body) = render(
            StoreError::NotFound {
                entity: "activity",
                id: 4,
            }
            .into(),
        )
        .await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "activity 4 not found");
    }
}
