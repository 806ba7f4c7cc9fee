//! Request and response bodies of the public JSON API.

use serde::{Deserialize, Serialize};

use crate::identity::{Role, User};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Body of every 2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// A success response without a payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"UNAUTHORIZED"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
    /// Underlying reason, when one is safe to expose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/google/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    /// ID token obtained by the client from the identity provider.
    pub id_token: String,
}

/// Payload of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer credential for the `Authorization` header.
    pub token: String,
    pub user: User,
}

/// Request body for `PUT /users/:id/change_role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// Request body for creating or replacing an activity.
///
/// Both fields are plaintext on the wire; they are sealed before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityInput {
    pub description: String,
    #[serde(default)]
    pub notes: String,
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the database answered a probe query.
    pub database: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_input_notes_default_to_empty() {
        let input: ActivityInput =
            serde_json::from_value(json!({"description": "standup"})).unwrap();
        assert_eq!(input.description, "standup");
        assert_eq!(input.notes, "");
    }

    #[test]
    fn error_response_omits_missing_detail() {
        let e = ErrorResponse::new("FORBIDDEN", "access denied");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v, json!({"code": "FORBIDDEN", "message": "access denied"}));

        let e = e.with_detail("not the owner");
        assert_eq!(e.detail.as_deref(), Some("not the owner"));
    }

    #[test]
    fn message_only_response_has_no_data() {
        let v = serde_json::to_value(ApiResponse::message("Logged out successfully")).unwrap();
        assert_eq!(v, json!({"success": true, "message": "Logged out successfully"}));
    }

    #[test]
    fn change_role_request_parses_lowercase_role() {
        let req: ChangeRoleRequest = serde_json::from_value(json!({"role": "admin"})).unwrap();
        assert_eq!(req.role, Role::Admin);
        assert!(serde_json::from_value::<ChangeRoleRequest>(json!({"role": "root"})).is_err());
    }
}
