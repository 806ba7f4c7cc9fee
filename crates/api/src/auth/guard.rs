//! Request access pipeline: authentication, role check, ownership check.
//!
//! Each stage consumes the previous stage's proof and returns the next, so a
//! request can only reach an ownership decision after it has been
//! authenticated and role-approved:
//!
//! ```text
//! AccessGuard::authenticate ──▶ Authenticated
//!     .require_role(min)    ──▶ RoleApproved
//!     .require_owner_or(..) ──▶ OwnershipApproved
//! ```
//!
//! The identity carried through the pipeline is always the stored user record,
//! never the token claims, so role changes and deletions take effect on the
//! next request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::identity::{Role, User};
use common::store::{ActivityStore, Database, StoreError};
use thiserror::Error;
use tracing::debug;

use super::token::{TokenError, TokenValidator};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was refused.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("identity lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

/// Resolves the user a token refers to.
pub trait UserDirectory: Send + Sync {
    fn resolve(&self, user_id: i64) -> Result<Option<User>, StoreError>;
}

impl UserDirectory for Database {
    fn resolve(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        self.find_user(user_id)
    }
}

/// Resolves the owner of a resource addressed by id.
pub trait OwnerLookup: Send + Sync {
    fn owner_of(&self, resource_id: i64) -> Result<Option<i64>, StoreError>;
}

impl OwnerLookup for ActivityStore {
    fn owner_of(&self, resource_id: i64) -> Result<Option<i64>, StoreError> {
        ActivityStore::owner_of(self, resource_id)
    }
}

/// Role and ownership requirements of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub min_role: Role,
    /// When set, the addressed resource must belong to the caller unless the
    /// caller holds at least this role.
    pub owner_or: Option<Role>,
}

impl AccessPolicy {
    pub const AUTHENTICATED: Self = Self {
        min_role: Role::User,
        owner_or: None,
    };

    pub const SUPERADMIN: Self = Self {
        min_role: Role::Superadmin,
        owner_or: None,
    };

    pub const OWNER_OR_ADMIN: Self = Self {
        min_role: Role::User,
        owner_or: Some(Role::Admin),
    };
}

/// Entry point of the pipeline.
#[derive(Clone)]
pub struct AccessGuard {
    validator: Arc<TokenValidator>,
    users: Arc<dyn UserDirectory>,
}

impl AccessGuard {
    pub fn new(validator: Arc<TokenValidator>, users: Arc<dyn UserDirectory>) -> Self {
        Self { validator, users }
    }

    /// Authenticate the raw `Authorization` header value.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Authenticated, GuardError> {
        self.authenticate_at(authorization, Utc::now())
    }

    /// Authenticate as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// - [`GuardError::Unauthenticated`] if the header is absent or not a
    ///   bearer credential, the token does not validate, or the user it names
    ///   is unknown or deleted.
    /// - [`GuardError::Lookup`] if the user store fails.
    pub fn authenticate_at(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Authenticated, GuardError> {
        let token = authorization
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GuardError::Unauthenticated("missing bearer token".into()))?;

        let claims = self
            .validator
            .validate_at(token, now)
            .map_err(|e| GuardError::Unauthenticated(describe(&e).into()))?;

        match self.users.resolve(claims.user_id)? {
            Some(user) if !user.is_deleted() => Ok(Authenticated { user }),
            Some(_) => {
                debug!(user_id = claims.user_id, "token names a deleted user");
                Err(GuardError::Unauthenticated("user no longer exists".into()))
            }
            None => {
                debug!(user_id = claims.user_id, "token names an unknown user");
                Err(GuardError::Unauthenticated("user no longer exists".into()))
            }
        }
    }

    /// Run the full pipeline for `policy`.
    ///
    /// `resource` is the raw path id of the addressed resource, if any.
    pub fn check(
        &self,
        authorization: Option<&str>,
        policy: AccessPolicy,
        resource: Option<&str>,
        owners: &dyn OwnerLookup,
    ) -> Result<User, GuardError> {
        let approved = self.authenticate(authorization)?.require_role(policy.min_role)?;
        match policy.owner_or {
            Some(elevated) => Ok(approved
                .require_owner_or(elevated, resource, owners)?
                .into_user()),
            None => Ok(approved.into_user()),
        }
    }
}

fn describe(err: &TokenError) -> &'static str {
    match err {
        TokenError::Expired => "token expired",
        TokenError::InvalidSignature => "invalid token signature",
        TokenError::Malformed(_) | TokenError::Signing(_) => "malformed token",
    }
}

/// The caller presented a valid token for a live user.
#[derive(Debug)]
pub struct Authenticated {
    user: User,
}

impl Authenticated {
    /// Require the caller's stored role to be at least `required`.
    pub fn require_role(self, required: Role) -> Result<RoleApproved, GuardError> {
        if self.user.role.at_least(required) {
            Ok(RoleApproved { user: self.user })
        } else {
            Err(GuardError::Forbidden(format!(
                "requires role {required} or higher"
            )))
        }
    }
}

/// The caller passed the route's role requirement.
#[derive(Debug)]
pub struct RoleApproved {
    user: User,
}

impl RoleApproved {
    /// Require the caller to own the resource unless they hold `elevated`.
    ///
    /// Elevated callers are approved without a lookup, as is any caller on a
    /// collection route where `resource` is `None`. Otherwise a non-numeric
    /// id, or an id with no resource behind it, is [`GuardError::NotFound`],
    /// and someone else's resource is [`GuardError::Forbidden`].
    pub fn require_owner_or(
        self,
        elevated: Role,
        resource: Option<&str>,
        owners: &dyn OwnerLookup,
    ) -> Result<OwnershipApproved, GuardError> {
        if self.user.role.at_least(elevated) {
            return Ok(OwnershipApproved { user: self.user });
        }

        let Some(raw) = resource else {
            return Ok(OwnershipApproved { user: self.user });
        };
        let id = raw
            .parse::<i64>()
            .map_err(|_| GuardError::NotFound("resource not found".into()))?;

        match owners.owner_of(id)? {
            Some(owner) if owner == self.user.id => Ok(OwnershipApproved { user: self.user }),
            Some(_) => Err(GuardError::Forbidden(
                "resource belongs to another user".into(),
            )),
            None => Err(GuardError::NotFound(format!("resource {id} not found"))),
        }
    }

    pub fn into_user(self) -> User {
        self.user
    }
}

/// The caller may act on the addressed resource.
#[derive(Debug)]
pub struct OwnershipApproved {
    user: User,
}

impl OwnershipApproved {
    pub fn into_user(self) -> User {
        self.user
    }
}
