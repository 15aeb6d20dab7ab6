//! User management payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::users::UserDBResponse,
    types::{PermissionSet, UserId},
};

/// A user as returned by the API. There is no way to get a password hash out of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            permissions: user.permissions,
            created_at: user.created_at,
        }
    }
}

/// Body of `POST /admin/api/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub username: String,
    pub password: String,
    /// Permission tags. Unknown tags are rejected.
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreatedResponse {
    pub id: UserId,
}

/// Body of `PATCH /admin/api/users/{user_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
}

/// Body of `PUT /admin/api/users/{user_id}/permissions`.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionsUpdate {
    pub permissions: Vec<String>,
}
