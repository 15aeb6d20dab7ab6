//! Session tokens and the session lifecycle.
//!
//! The client holds an opaque random token in a cookie. The server only ever
//! stores [`derive_session_id`] of that token, so a leaked `sessions` table
//! cannot be turned back into usable cookies.
//!
//! Lifecycle as seen by [`SessionManager::validate_token`]:
//!
//! ```text
//! no row ─────────────────────────────────────────────► None
//! now >= expires_at ──────── delete row ──────────────► None
//! now >= expires_at - renewal_window ── extend ───────► Some(renewed)
//! otherwise ──────────────────────────────────────────► Some(unchanged)
//! ```

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, TimeDelta, Utc};
use rand::prelude::RngExt;
use rand::rng;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::{
    config::SessionConfig,
    db::{
        handlers::CredentialStore,
        models::sessions::{Session, SessionId, SessionWithUser},
    },
    errors::Error,
    types::{UserId, abbrev_uuid},
};

/// Random bytes per token. Encodes to 24 base64url characters.
pub const TOKEN_BYTES: usize = 18;

/// Generate a fresh client token.
pub fn generate_token() -> String {
    let mut token_bytes = [0u8; TOKEN_BYTES];
    rng().fill(&mut token_bytes);

    // Encode as base64url without padding
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// The server-side identifier for a token: lowercase hex SHA-256.
pub fn derive_session_id(token: &str) -> SessionId {
    let digest = Sha256::digest(token.as_bytes());
    SessionId::from_digest(format!("{digest:x}"))
}

/// How long sessions live and when they are extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub lifetime: TimeDelta,
    pub renewal_window: TimeDelta,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            lifetime: TimeDelta::days(30),
            renewal_window: TimeDelta::days(15),
        }
    }
}

impl SessionPolicy {
    pub fn from_config(config: &SessionConfig) -> Result<Self, Error> {
        let convert = |d: std::time::Duration, name: &str| {
            TimeDelta::from_std(d).map_err(|e| Error::Internal {
                operation: format!("convert session {name}: {e}"),
            })
        };
        Ok(Self {
            lifetime: convert(config.lifetime, "lifetime")?,
            renewal_window: convert(config.renewal_window, "renewal window")?,
        })
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.lifetime
    }

    fn needs_renewal(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now >= expires_at - self.renewal_window
    }
}

/// Creates, validates, renews and invalidates sessions against a [`CredentialStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, policy: SessionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Persist a new session for `token`, expiring one lifetime from now.
    #[instrument(skip(self, token), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn create_session(&self, token: &str, user_id: UserId) -> Result<Session, Error> {
        let session = Session {
            id: derive_session_id(token),
            user_id,
            expires_at: self.policy.expiry_from(Utc::now()),
        };
        self.store.insert_session(&session).await?;
        debug!(session_id = %session.id.abbrev(), "Created session");
        Ok(session)
    }

    /// Resolve a token to its live session and user, renewing it if it is close to expiry.
    pub async fn validate_token(&self, token: &str) -> Result<Option<SessionWithUser>, Error> {
        self.validate_token_at(token, Utc::now()).await
    }

    /// [`validate_token`](Self::validate_token) with an explicit clock.
    ///
    /// Only a failed lookup is an error. Garbage-collecting an expired row and
    /// persisting a renewal are best-effort: failures are logged and the
    /// result is computed as if they had not been attempted.
    #[instrument(skip_all, err)]
    pub async fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Option<SessionWithUser>, Error> {
        let id = derive_session_id(token);
        let Some(mut found) = self.store.find_session_by_id(&id).await? else {
            debug!(session_id = %id.abbrev(), "No session for token");
            return Ok(None);
        };

        // Inclusive: a session is dead at the instant it expires
        if now >= found.session.expires_at {
            debug!(session_id = %id.abbrev(), "Session expired, removing");
            if let Err(e) = self.store.delete_session_by_id(&id).await {
                warn!(session_id = %id.abbrev(), error = %e, "Failed to remove expired session");
            }
            return Ok(None);
        }

        if self.policy.needs_renewal(found.session.expires_at, now) {
            let renewed = self.policy.expiry_from(now);
            match self.store.update_session_expiry(&id, renewed).await {
                Ok(_) => {
                    debug!(session_id = %id.abbrev(), "Renewed session");
                    found.session.expires_at = renewed;
                }
                Err(e) => warn!(session_id = %id.abbrev(), error = %e, "Failed to renew session"),
            }
        }

        Ok(Some(found))
    }

    /// Delete a session. Returns false if the store failed; never errors.
    #[instrument(skip(self), fields(session_id = %id.abbrev()))]
    pub async fn invalidate_session(&self, id: &SessionId) -> bool {
        match self.store.delete_session_by_id(id).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to invalidate session");
                false
            }
        }
    }
}

/// `Set-Cookie` value carrying a token, expiring with the session.
pub fn session_cookie(config: &SessionConfig, token: &str, expires_at: DateTime<Utc>) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Expires={}; HttpOnly; SameSite={}",
        config.cookie_name,
        token,
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        config.cookie_same_site
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    let mut cookie = format!(
        "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly; SameSite={}",
        config.cookie_name, config.cookie_same_site
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::handlers::MemoryCredentialStore,
        test_utils::{create_test_user, memory_store},
        types::PermissionSet,
    };
    use chrono::TimeZone;

    async fn manager_with_user() -> (SessionManager, Arc<MemoryCredentialStore>, UserId) {
        let store = memory_store();
        let user = create_test_user(store.as_ref(), "session@example.com", "session", PermissionSet::empty()).await;
        let manager = SessionManager::new(store.clone(), SessionPolicy::default());
        (manager, store, user.id)
    }

    /// Insert a session for `token` expiring at `expires_at`.
    async fn seed_session(store: &MemoryCredentialStore, token: &str, user_id: UserId, expires_at: DateTime<Utc>) {
        store
            .insert_session(&Session {
                id: derive_session_id(token),
                user_id,
                expires_at,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_ne!(token1, token2);
        assert_eq!(token1.len(), 24);
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!token1.contains('='));
    }

    #[test]
    fn test_derive_session_id_is_hex_sha256() {
        let id = derive_session_id("abc");
        assert_eq!(id.as_str(), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(derive_session_id("abc"), id);
        assert_ne!(derive_session_id("abd"), id);
    }

    #[tokio::test]
    async fn test_create_then_validate_is_unchanged() {
        let (manager, _store, user_id) = manager_with_user().await;
        let token = generate_token();

        let session = manager.create_session(&token, user_id).await.unwrap();
        assert_ne!(session.id.as_str(), token);

        let found = manager.validate_token(&token).await.unwrap().unwrap();
        assert_eq!(found.session, session);
        assert_eq!(found.user.id, user_id);
    }

    #[tokio::test]
    async fn test_session_inside_window_is_renewed() {
        let (manager, store, user_id) = manager_with_user().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        seed_session(&store, "renew-me", user_id, now + TimeDelta::days(10)).await;

        let found = manager.validate_token_at("renew-me", now).await.unwrap().unwrap();
        assert_eq!(found.session.expires_at, now + TimeDelta::days(30));

        // Persisted, not just returned
        let stored = store.find_session_by_id(&derive_session_id("renew-me")).await.unwrap().unwrap();
        assert_eq!(stored.session.expires_at, now + TimeDelta::days(30));
    }

    #[tokio::test]
    async fn test_renewal_window_boundary() {
        let (manager, store, user_id) = manager_with_user().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        // Exactly at the window edge: renewed
        seed_session(&store, "edge", user_id, now + TimeDelta::days(15)).await;
        let found = manager.validate_token_at("edge", now).await.unwrap().unwrap();
        assert_eq!(found.session.expires_at, now + TimeDelta::days(30));

        // One second outside the window: untouched
        let outside = now + TimeDelta::days(15) + TimeDelta::seconds(1);
        seed_session(&store, "outside", user_id, outside).await;
        let found = manager.validate_token_at("outside", now).await.unwrap().unwrap();
        assert_eq!(found.session.expires_at, outside);
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_and_stays_gone() {
        let (manager, store, user_id) = manager_with_user().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        seed_session(&store, "stale", user_id, now - TimeDelta::seconds(1)).await;

        assert!(manager.validate_token_at("stale", now).await.unwrap().is_none());
        assert!(store.find_session_by_id(&derive_session_id("stale")).await.unwrap().is_none());

        // Idempotent
        assert!(manager.validate_token_at("stale", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry_is_inclusive() {
        let (manager, store, user_id) = manager_with_user().await;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        seed_session(&store, "exact", user_id, now).await;

        assert!(manager.validate_token_at("exact", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_is_none() {
        let (manager, _store, _user_id) = manager_with_user().await;
        assert!(manager.validate_token("never-issued").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_session() {
        let (manager, _store, user_id) = manager_with_user().await;
        let token = generate_token();
        let session = manager.create_session(&token, user_id).await.unwrap();

        assert!(manager.invalidate_session(&session.id).await);
        assert!(manager.validate_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_custom_policy() {
        let store = memory_store();
        let user = create_test_user(store.as_ref(), "p@example.com", "policy", PermissionSet::empty()).await;
        let policy = SessionPolicy {
            lifetime: TimeDelta::hours(2),
            renewal_window: TimeDelta::hours(1),
        };
        let manager = SessionManager::new(store.clone(), policy);
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        seed_session(&store, "short", user.id, now + TimeDelta::minutes(30)).await;

        let found = manager.validate_token_at("short", now).await.unwrap().unwrap();
        assert_eq!(found.session.expires_at, now + TimeDelta::hours(2));
    }

    #[test]
    fn test_session_cookie_format() {
        let config = SessionConfig::default();
        let expires_at = Utc.with_ymd_and_hms(2025, 3, 31, 8, 5, 9).unwrap();

        let cookie = session_cookie(&config, "tok", expires_at);
        assert_eq!(
            cookie,
            "auth-session=tok; Path=/; Expires=Mon, 31 Mar 2025 08:05:09 GMT; HttpOnly; SameSite=Lax"
        );

        let secure = SessionConfig {
            cookie_secure: true,
            ..SessionConfig::default()
        };
        assert!(session_cookie(&secure, "tok", expires_at).ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_format() {
        let cookie = clear_session_cookie(&SessionConfig::default());
        assert!(cookie.starts_with("auth-session=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0"));
    }
}
