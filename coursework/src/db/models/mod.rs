//! Database record structures.
//!
//! These are the shapes the [`CredentialStore`](crate::db::handlers::CredentialStore)
//! accepts and returns. The password hash only ever appears in
//! [`users::UserCredentials`], which is consumed by the login path and nothing else.

pub mod sessions;
pub mod submissions;
pub mod users;
