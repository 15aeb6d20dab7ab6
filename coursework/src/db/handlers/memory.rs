//! In-process credential store.
//!
//! Used when the configuration selects `database: { type: memory }` and by the
//! test suite. All state lives behind one [`RwLock`], so every operation,
//! including cascading user deletion, is atomic with respect to the others.

use crate::{
    auth::password::HashedPassword,
    db::{
        errors::{DbError, Result},
        handlers::store::CredentialStore,
        models::{
            sessions::{Session, SessionId, SessionWithUser},
            submissions::{SubmissionCreateDBRequest, SubmissionDBResponse},
            users::{UserCreateDBRequest, UserCredentials, UserDBResponse, UserFilter, UserUpdateDBRequest},
        },
    },
    types::{SubmissionId, UserId},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredUser {
    user: UserDBResponse,
    password_hash: HashedPassword,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, StoredUser>,
    sessions: HashMap<SessionId, Session>,
    submissions: HashMap<SubmissionId, SubmissionDBResponse>,
}

impl State {
    fn check_unique(&self, id: Option<UserId>, email: Option<&str>, username: Option<&str>) -> Result<()> {
        for stored in self.users.values().filter(|s| Some(s.user.id) != id) {
            if email.is_some_and(|e| stored.user.email == e) {
                return Err(unique_violation("users_email_unique"));
            }
            if username.is_some_and(|u| stored.user.username == u) {
                return Err(unique_violation("users_username_unique"));
            }
        }
        Ok(())
    }
}

fn unique_violation(constraint: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some("users".to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

/// [`CredentialStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: RwLock<State>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|s| s.user.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|s| s.user.email == email).map(|s| s.user.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|s| s.user.username == username).map(|s| s.user.clone()))
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|s| s.user.email == email).map(|s| UserCredentials {
            user: s.user.clone(),
            password_hash: s.password_hash.clone(),
        }))
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>> {
        let state = self.state.read().await;
        let mut users: Vec<_> = state.users.values().map(|s| s.user.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let skip = usize::try_from(filter.skip.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit.max(0)).unwrap_or(usize::MAX);
        Ok(users.into_iter().skip(skip).take(limit).collect())
    }

    async fn insert_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut state = self.state.write().await;
        state.check_unique(None, Some(&request.email), Some(&request.username))?;

        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: request.email.clone(),
            username: request.username.clone(),
            permissions: request.permissions.clone(),
            created_at: Utc::now(),
        };
        state.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: request.password_hash.clone(),
            },
        );
        Ok(user)
    }

    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let mut state = self.state.write().await;
        state.check_unique(Some(id), request.email.as_deref(), request.username.as_deref())?;

        let stored = state.users.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(email) = &request.email {
            stored.user.email = email.clone();
        }
        if let Some(username) = &request.username {
            stored.user.username = username.clone();
        }
        if let Some(permissions) = &request.permissions {
            stored.user.permissions = permissions.clone();
        }
        if let Some(password_hash) = &request.password_hash {
            stored.password_hash = password_hash.clone();
        }
        Ok(stored.user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Ok(false);
        }
        state.sessions.retain(|_, s| s.user_id != id);
        state.submissions.retain(|_, s| s.user_id != id);
        Ok(true)
    }

    async fn find_session_by_id(&self, id: &SessionId) -> Result<Option<SessionWithUser>> {
        let state = self.state.read().await;
        Ok(state.sessions.get(id).and_then(|session| {
            state.users.get(&session.user_id).map(|stored| SessionWithUser {
                session: session.clone(),
                user: stored.user.clone(),
            })
        }))
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&session.user_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("sessions_user_id_fkey".to_string()),
                table: Some("sessions".to_string()),
                message: "session references a missing user".to_string(),
            });
        }
        if state.sessions.contains_key(&session.id) {
            return Err(DbError::UniqueViolation {
                constraint: Some("sessions_pkey".to_string()),
                table: Some("sessions".to_string()),
                message: "duplicate session id".to_string(),
            });
        }
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session_expiry(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .sessions
            .get_mut(id)
            .map(|session| session.expires_at = expires_at)
            .is_some())
    }

    async fn delete_session_by_id(&self, id: &SessionId) -> Result<bool> {
        Ok(self.state.write().await.sessions.remove(id).is_some())
    }

    async fn delete_sessions_by_user(&self, user_id: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn insert_submission(&self, request: &SubmissionCreateDBRequest) -> Result<SubmissionDBResponse> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&request.user_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("submissions_user_id_fkey".to_string()),
                table: Some("submissions".to_string()),
                message: "submission references a missing user".to_string(),
            });
        }
        let submission = SubmissionDBResponse {
            id: Uuid::new_v4(),
            exercise_id: request.exercise_id,
            user_id: request.user_id,
            javascript_code: request.javascript_code.clone(),
            html_code: request.html_code.clone(),
            css_code: request.css_code.clone(),
            created_at: Utc::now(),
        };
        state.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn list_submissions_by_user(&self, user_id: UserId) -> Result<Vec<SubmissionDBResponse>> {
        let state = self.state.read().await;
        let mut submissions: Vec<_> = state.submissions.values().filter(|s| s.user_id == user_id).cloned().collect();
        submissions.sort_by_key(|s| s.created_at);
        Ok(submissions)
    }
}
