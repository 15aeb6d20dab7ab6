//! Authentication and authorization.
//!
//! # Modules
//!
//! - [`password`]: Argon2id hashing and verification
//! - [`accounts`]: account creation, credential checks and admin updates
//! - [`session`]: opaque session tokens, expiry and sliding renewal
//! - [`permissions`]: permission checks against a user's [`PermissionSet`](crate::types::PermissionSet)
//! - [`middleware`]: session resolution and the deny-by-default route policy
//! - [`current_user`]: extractors for the resolved caller
//!
//! # Sessions
//!
//! A browser holds a random token in the session cookie. The store only ever
//! sees the SHA-256 digest of that token, so a leaked sessions table cannot be
//! replayed. Sessions last `auth.session.lifetime` and are pushed forward by a
//! full lifetime when used inside the last `auth.session.renewal_window`.

pub mod accounts;
pub mod current_user;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod session;
