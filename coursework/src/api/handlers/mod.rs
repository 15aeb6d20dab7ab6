//! HTTP request handlers.
//!
//! - [`auth`]: login, registration, logout and the caller's profile
//! - [`users`]: admin user management under `/admin/api`
//!
//! Handlers read the caller from the [`RequestContext`](crate::auth::current_user::RequestContext)
//! that [`crate::auth::middleware`] attaches, and return [`crate::errors::Error`]
//! which converts to a status code and JSON body.

pub mod auth;
pub mod users;
