//! The credential store trait.

use chrono::{DateTime, Utc};

use crate::{
    db::{
        errors::Result,
        models::{
            sessions::{Session, SessionId, SessionWithUser},
            submissions::{SubmissionCreateDBRequest, SubmissionDBResponse},
            users::{UserCreateDBRequest, UserCredentials, UserDBResponse, UserFilter, UserUpdateDBRequest},
        },
    },
    types::UserId,
};

/// Persistence boundary for users, sessions and the records that cascade with them.
///
/// Implementations must:
/// - reject a duplicate email or username with [`DbError::UniqueViolation`](crate::db::errors::DbError)
///   whose constraint name contains `email` / `username`
/// - make [`delete_user`](CredentialStore::delete_user) all-or-nothing across sessions,
///   submissions and the user row
/// - apply single-row updates atomically
///
/// A store handle is constructed once at startup and shared through
/// [`AppState`](crate::AppState).
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// Lookup used by the login path; the only read that returns the password hash.
    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>>;

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>>;

    async fn insert_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Returns [`DbError::NotFound`](crate::db::errors::DbError::NotFound) if the user does not exist.
    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    /// Delete a user and everything that references it. Returns false if there was no such user.
    async fn delete_user(&self, id: UserId) -> Result<bool>;

    /// Session joined with its owning user.
    async fn find_session_by_id(&self, id: &SessionId) -> Result<Option<SessionWithUser>>;

    async fn insert_session(&self, session: &Session) -> Result<()>;

    async fn update_session_expiry(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<bool>;

    async fn delete_session_by_id(&self, id: &SessionId) -> Result<bool>;

    async fn delete_sessions_by_user(&self, user_id: UserId) -> Result<u64>;

    async fn insert_submission(&self, request: &SubmissionCreateDBRequest) -> Result<SubmissionDBResponse>;

    async fn list_submissions_by_user(&self, user_id: UserId) -> Result<Vec<SubmissionDBResponse>>;
}
