//! Common types, field encryption, storage, and backfill shared across
//! `activity-vault` crates.

pub mod backfill;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod store;

pub use error::ServiceError;
