//! API request and response models.
//!
//! These are the JSON shapes exchanged with clients. They are kept separate
//! from the database records in [`crate::db::models`] so the password hash and
//! other storage details never reach a response.

pub mod auth;
pub mod pagination;
pub mod users;
