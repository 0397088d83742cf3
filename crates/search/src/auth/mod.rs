//! Revocable-token authorization.
//!
//! - [`store`] - The shared key-value invalidation store interface
//! - [`validator`] - Token checks against that store
//!
//! A token is valid exactly when no invalidation entry exists for it. Entries
//! are written elsewhere (on logout or explicit revocation) and expire by the
//! store's own TTL policy; this crate only reads them.

pub mod store;
pub mod validator;

pub use store::{InvalidationStore, MemoryInvalidationStore, invalidation_key};
pub use validator::TokenValidator;
