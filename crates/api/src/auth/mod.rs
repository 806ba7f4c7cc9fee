//! Authentication and authorization.
//!
//! # Responsibilities
//! - Issue and validate signed bearer tokens.
//! - Verify identity tokens with the external identity provider.
//! - Decide whether a request may proceed: authenticated, role-approved,
//!   ownership-approved.

pub mod guard;
pub mod identity;
pub mod token;

pub use guard::{AccessGuard, AccessPolicy, GuardError};
pub use identity::{GoogleTokenInfo, IdentityError, IdentityProvider};
pub use token::{TokenError, TokenIssuer, TokenValidator};
