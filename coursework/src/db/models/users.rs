//! Database models for users.

use crate::auth::password::HashedPassword;
use crate::types::{PermissionSet, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub username: String,
    pub password_hash: HashedPassword,
    pub permissions: PermissionSet,
}

/// Database request for updating a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub permissions: Option<PermissionSet>,
    pub password_hash: Option<HashedPassword>,
}

/// Database response for a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
}

/// A user together with their stored password hash, for credential checks only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: UserDBResponse,
    pub password_hash: HashedPassword,
}

/// Filter for listing users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}
