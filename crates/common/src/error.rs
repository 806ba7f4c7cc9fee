//! Common error types shared across crates.

use thiserror::Error;

/// Client-facing service error.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::Unauthenticated`] → 401
/// - [`ServiceError::Forbidden`] → 403
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::EncryptionFailure`] → 500
/// - [`ServiceError::Internal`] → 500
///
/// "Not authenticated", "forbidden", and "not found" are deliberately distinct
/// variants; callers must never collapse them.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid, or expired credential, or a deleted identity.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Sealing or opening a protected field failed.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Unauthenticated(_) => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::EncryptionFailure(_) => 500,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code placed in the error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::Unauthenticated(_) => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::EncryptionFailure(_) => "ENCRYPTION_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The detail message without the variant prefix.
    pub fn detail(&self) -> &str {
        match self {
            ServiceError::BadRequest(m)
            | ServiceError::Unauthenticated(m)
            | ServiceError::Forbidden(m)
            | ServiceError::NotFound(m)
            | ServiceError::EncryptionFailure(m)
            | ServiceError::Internal(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        assert_eq!(ServiceError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(ServiceError::Unauthenticated("x".into()).http_status(), 401);
        assert_eq!(ServiceError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(ServiceError::NotFound("x".into()).http_status(), 404);
        assert_eq!(
            ServiceError::EncryptionFailure("x".into()).http_status(),
            500
        );
        assert_eq!(ServiceError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn auth_failures_have_distinct_codes() {
        let codes = [
            ServiceError::Unauthenticated("x".into()).code(),
            ServiceError::Forbidden("x".into()).code(),
            ServiceError::NotFound("x".into()).code(),
        ];
        assert_eq!(codes, ["UNAUTHORIZED", "FORBIDDEN", "NOT_FOUND"]);
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::Forbidden("admin access required".into());
        assert!(e.to_string().contains("admin access required"));
        assert_eq!(e.detail(), "admin access required");
    }
}
