//! PostgreSQL credential store.

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
    types::{PermissionSet, UserId, abbrev_uuid},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, permissions, created_at";

// Database entity models
#[derive(Debug, FromRow)]
struct User {
    id: UserId,
    email: String,
    username: String,
    permissions: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            permissions: PermissionSet::from_tags(&user.permissions),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserWithHash {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

#[derive(Debug, FromRow)]
struct SessionRow {
    session_id: String,
    expires_at: DateTime<Utc>,
    #[sqlx(flatten)]
    user: User,
}

#[derive(Debug, FromRow)]
struct Submission {
    id: Uuid,
    exercise_id: Uuid,
    user_id: UserId,
    javascript_code: String,
    html_code: String,
    css_code: String,
    created_at: DateTime<Utc>,
}

impl From<Submission> for SubmissionDBResponse {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id,
            exercise_id: s.exercise_id,
            user_id: s.user_id,
            javascript_code: s.javascript_code,
            html_code: s.html_code,
            css_code: s.css_code,
            created_at: s.created_at,
        }
    }
}

/// [`CredentialStore`] backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user_where(&self, column: &str, value: &str) -> Result<Option<UserDBResponse>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&query).bind(value).fetch_optional(&self.pool).await?;
        Ok(user.map(Into::into))
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgCredentialStore {
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query).bind(id).fetch_optional(&self.pool).await?;
        Ok(user.map(Into::into))
    }

    #[instrument(skip_all, err)]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        self.find_user_where("email", email).await
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        self.find_user_where("username", username).await
    }

    #[instrument(skip_all, err)]
    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let query = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserWithHash>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| UserCredentials {
            user: row.user.into(),
            password_hash: HashedPassword::from_stored(row.password_hash),
        }))
    }

    #[instrument(skip(self), fields(skip = filter.skip, limit = filter.limit), err)]
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id OFFSET $1 LIMIT $2");
        let users = sqlx::query_as::<_, User>(&query)
            .bind(filter.skip)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn insert_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        // Always generate a new ID for users
        let user_id = Uuid::new_v4();

        let query = format!(
            "INSERT INTO users (id, email, username, password_hash, permissions) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(&request.email)
            .bind(&request.username)
            .bind(request.password_hash.as_str())
            .bind(request.permissions.to_tags())
            .fetch_one(&self.pool)
            .await?;

        Ok(user.into())
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let query = format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                username = COALESCE($3, username),
                permissions = COALESCE($4, permissions),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(request.email.as_deref())
            .bind(request.username.as_deref())
            .bind(request.permissions.as_ref().map(PermissionSet::to_tags))
            .bind(request.password_hash.as_ref().map(HashedPassword::as_str))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1").bind(id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM submissions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(session_id = %id.abbrev()), err)]
    async fn find_session_by_id(&self, id: &SessionId) -> Result<Option<SessionWithUser>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT s.id AS session_id, s.expires_at, u.id, u.email, u.username, u.permissions, u.created_at
            FROM sessions s
            INNER JOIN users u ON u.id = s.user_id
            WHERE s.id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let user = UserDBResponse::from(row.user);
            SessionWithUser {
                session: Session {
                    id: SessionId::from_digest(row.session_id),
                    user_id: user.id,
                    expires_at: row.expires_at,
                },
                user,
            }
        }))
    }

    #[instrument(skip(self, session), fields(session_id = %session.id.abbrev(), user_id = %abbrev_uuid(&session.user_id)), err)]
    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session.id.as_str())
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %id.abbrev()), err)]
    async fn update_session_expiry(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE sessions SET expires_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(session_id = %id.abbrev()), err)]
    async fn delete_session_by_id(&self, id: &SessionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn delete_sessions_by_user(&self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn insert_submission(&self, request: &SubmissionCreateDBRequest) -> Result<SubmissionDBResponse> {
        let submission = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (id, exercise_id, user_id, javascript_code, html_code, css_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.exercise_id)
        .bind(request.user_id)
        .bind(&request.javascript_code)
        .bind(&request.html_code)
        .bind(&request.css_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(submission.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn list_submissions_by_user(&self, user_id: UserId) -> Result<Vec<SubmissionDBResponse>> {
        let submissions = sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(submissions.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::types::Permission;
    use chrono::Duration;

    fn user_request(email: &str, username: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hash_password("password123").unwrap(),
            permissions: [Permission::CourseView].into_iter().collect(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_insert_and_find_user(pool: PgPool) {
        let store = PgCredentialStore::new(pool);
        let user = store.insert_user(&user_request("alice@example.com", "alice")).await.unwrap();

        let by_email = store.find_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_email, user);
        assert!(by_email.permissions.contains(Permission::CourseView));

        let creds = store.find_credentials_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(creds.user.id, user.id);
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let store = PgCredentialStore::new(pool);
        store.insert_user(&user_request("dup@example.com", "first")).await.unwrap();

        let err = store.insert_user(&user_request("dup@example.com", "second")).await.unwrap_err();
        assert!(err.is_unique_violation_on("email"));

        let err = store.insert_user(&user_request("other@example.com", "first")).await.unwrap_err();
        assert!(err.is_unique_violation_on("username"));
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_stored_unknown_tags_are_dropped(pool: PgPool) {
        let store = PgCredentialStore::new(pool.clone());
        let user = store.insert_user(&user_request("tags@example.com", "tags")).await.unwrap();

        sqlx::query("UPDATE users SET permissions = ARRAY['course.view', 'course.superuser'] WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();

        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.permissions.to_tags(), vec!["course.view".to_string()]);
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_session_lifecycle(pool: PgPool) {
        let store = PgCredentialStore::new(pool);
        let user = store.insert_user(&user_request("s@example.com", "sess")).await.unwrap();
        let session = Session {
            id: SessionId::from_digest("ab".repeat(32)),
            user_id: user.id,
            expires_at: Utc::now() + Duration::days(30),
        };
        store.insert_session(&session).await.unwrap();

        let found = store.find_session_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user.id, user.id);
        assert_eq!(found.session.id, session.id);

        let later = Utc::now() + Duration::days(40);
        assert!(store.update_session_expiry(&session.id, later).await.unwrap());
        assert!(store.delete_session_by_id(&session.id).await.unwrap());
        assert!(!store.delete_session_by_id(&session.id).await.unwrap());
        assert!(store.find_session_by_id(&session.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_user_cascades(pool: PgPool) {
        let store = PgCredentialStore::new(pool);
        let user = store.insert_user(&user_request("c@example.com", "cascade")).await.unwrap();
        let session = Session {
            id: SessionId::from_digest("cd".repeat(32)),
            user_id: user.id,
            expires_at: Utc::now() + Duration::days(30),
        };
        store.insert_session(&session).await.unwrap();
        store
            .insert_submission(&SubmissionCreateDBRequest {
                exercise_id: Uuid::new_v4(),
                user_id: user.id,
                javascript_code: "console.log(1)".to_string(),
                html_code: String::new(),
                css_code: String::new(),
            })
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());

        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(store.find_session_by_id(&session.id).await.unwrap().is_none());
        assert!(store.list_submissions_by_user(user.id).await.unwrap().is_empty());
        assert!(!store.delete_user(user.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_update_missing_user_is_not_found(pool: PgPool) {
        let store = PgCredentialStore::new(pool);
        let err = store
            .update_user(Uuid::new_v4(), &UserUpdateDBRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
