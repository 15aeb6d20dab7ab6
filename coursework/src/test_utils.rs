//! Shared fixtures for unit and HTTP tests.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum_test::TestServer;

use crate::{
    AppState, build_router,
    auth::{password::hash_password, session::generate_token},
    config::{Config, DatabaseConfig},
    db::{
        handlers::{CredentialStore, MemoryCredentialStore},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    types::{PermissionSet, UserId},
};

/// Password every user from [`create_test_user`] is created with.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> Config {
    Config {
        database: DatabaseConfig::Memory,
        ..Default::default()
    }
}

pub fn memory_store() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::new())
}

/// Insert a user with [`TEST_PASSWORD`] directly through the store.
pub async fn create_test_user(store: &dyn CredentialStore, email: &str, username: &str, permissions: PermissionSet) -> UserDBResponse {
    let password_hash = hash_password(TEST_PASSWORD).expect("Failed to hash test password");
    store
        .insert_user(&UserCreateDBRequest {
            email: email.to_string(),
            username: username.to_string(),
            password_hash,
            permissions,
        })
        .await
        .expect("Failed to create test user")
}

/// State over a fresh in-memory store.
pub async fn create_test_state(config: Config) -> AppState {
    AppState::from_store(config, memory_store()).expect("Failed to build test state")
}

pub fn create_test_server(state: AppState) -> TestServer {
    TestServer::new(build_router(state)).expect("Failed to create test server")
}

/// Start a session for `user_id` and return a `Cookie` header value carrying its token.
pub async fn session_cookie_header(state: &AppState, user_id: UserId) -> HeaderValue {
    let token = generate_token();
    state
        .sessions
        .create_session(&token, user_id)
        .await
        .expect("Failed to create test session");
    HeaderValue::from_str(&format!("{}={token}", state.config.auth.session.cookie_name)).expect("Invalid cookie header")
}
