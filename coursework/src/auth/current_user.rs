//! Request-scoped identity.
//!
//! [`resolve_session`](crate::auth::middleware::resolve_session) inserts a
//! [`RequestContext`] into every request's extensions. Handlers read it back
//! with the [`RequestContext`] or [`CurrentUser`] extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::trace;

use crate::{
    auth::permissions,
    db::models::{
        sessions::{Session, SessionWithUser},
        users::UserDBResponse,
    },
    errors::Error,
    types::{Permission, PermissionSet},
};

/// Who is making this request, resolved once when the request arrives.
///
/// `permissions` is a snapshot taken at that point; it is what every
/// authorization decision in the request is made against.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<UserDBResponse>,
    pub session: Option<Session>,
    pub permissions: PermissionSet,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(found: SessionWithUser) -> Self {
        Self {
            permissions: found.user.permissions.clone(),
            user: Some(found.user),
            session: Some(found.session),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Error> {
        permissions::require_permission(&self.permissions, permission)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestContext>().cloned().ok_or_else(|| Error::Internal {
            operation: "read request context: session middleware is not installed".to_string(),
        })
    }
}

/// An authenticated caller. Extraction fails with [`Error::Unauthenticated`] for anonymous requests.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserDBResponse,
    pub session: Session,
    pub permissions: PermissionSet,
}

impl CurrentUser {
    pub fn require_permission(&self, permission: Permission) -> Result<(), Error> {
        permissions::require_permission(&self.permissions, permission)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request_parts(parts, state).await?;
        match (context.user, context.session) {
            (Some(user), Some(session)) => Ok(CurrentUser {
                user,
                session,
                permissions: context.permissions,
            }),
            _ => {
                trace!("No authenticated user in request context");
                Err(Error::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::sessions::SessionId;
    use axum::http::Request;
    use chrono::Utc;
    use uuid::Uuid;

    fn found(permissions: PermissionSet) -> SessionWithUser {
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: "ctx@example.com".to_string(),
            username: "ctx".to_string(),
            permissions,
            created_at: Utc::now(),
        };
        SessionWithUser {
            session: Session {
                id: SessionId::from_digest("00".repeat(32)),
                user_id: user.id,
                expires_at: Utc::now(),
            },
            user,
        }
    }

    fn parts_with(context: Option<RequestContext>) -> Parts {
        let (mut parts, _) = Request::new(()).into_parts();
        if let Some(context) = context {
            parts.extensions.insert(context);
        }
        parts
    }

    #[test]
    fn test_anonymous_context_has_nothing() {
        let context = RequestContext::anonymous();
        assert!(!context.is_authenticated());
        assert!(context.permissions.is_empty());
        assert!(matches!(
            context.require_permission(Permission::CourseView),
            Err(Error::Forbidden { .. })
        ));
    }

    #[test]
    fn test_authenticated_context_snapshots_permissions() {
        let context = RequestContext::authenticated(found([Permission::CourseView].into_iter().collect()));
        assert!(context.is_authenticated());
        assert!(context.require_permission(Permission::CourseView).is_ok());
        assert!(context.require_permission(Permission::CourseEdit).is_err());
    }

    #[tokio::test]
    async fn test_current_user_rejects_anonymous() {
        let mut parts = parts_with(Some(RequestContext::anonymous()));
        let err = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[tokio::test]
    async fn test_current_user_from_authenticated_context() {
        let found = found(PermissionSet::all());
        let user_id = found.user.id;
        let mut parts = parts_with(Some(RequestContext::authenticated(found)));

        let current = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(current.user.id, user_id);
        assert_eq!(current.permissions, PermissionSet::all());
    }

    #[tokio::test]
    async fn test_missing_context_is_internal_error() {
        let mut parts = parts_with(None);
        let err = RequestContext::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }
}
