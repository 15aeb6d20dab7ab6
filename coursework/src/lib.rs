//! # coursework: authentication core for a course-authoring platform
//!
//! `coursework` is the backend piece of a course-authoring and learning platform
//! that answers two questions for every request: *who is this?* and *is this
//! action allowed?*. Course, lesson and exercise editing live elsewhere and
//! call into this crate.
//!
//! ## Overview
//!
//! Users sign in with an email and password. A successful login creates a
//! server-side session and hands the browser an opaque token in a cookie.
//! Every request passes through two middleware layers: the first resolves the
//! cookie to a user (renewing the session if it is close to expiring), the
//! second denies anonymous access to anything that is not explicitly public.
//! Handlers then check the caller's permission tags before doing any work.
//!
//! ## Architecture
//!
//! ```text
//! request
//!   │
//!   ├─ TraceLayer
//!   ├─ auth::middleware::resolve_session     cookie → RequestContext, Set-Cookie on the way out
//!   ├─ auth::middleware::enforce_route_policy  public? authenticated? else 302 / 401
//!   │
//!   └─ api::handlers::{auth, users}          CurrentUser + permission checks
//!          │
//!          ├─ auth::{accounts, session, password, permissions}
//!          └─ db::handlers::CredentialStore  (Postgres or in-memory)
//! ```
//!
//! ## Routes
//!
//! | Method | Path                                   | Access            |
//! |--------|----------------------------------------|-------------------|
//! | GET    | `/`                                    | public            |
//! | GET    | `/login`                               | public            |
//! | POST   | `/login`                               | public            |
//! | POST   | `/register`                            | public            |
//! | POST   | `/api/auth/logout`                     | session           |
//! | GET    | `/api/profile`                         | session           |
//! | GET    | `/admin/api/users`                     | `user.view`       |
//! | POST   | `/admin/api/users`                     | `user.create`     |
//! | GET    | `/admin/api/users/{user_id}`           | `user.view`       |
//! | PATCH  | `/admin/api/users/{user_id}`           | `user.edit`       |
//! | DELETE | `/admin/api/users/{user_id}`           | `user.delete`     |
//! | PUT    | `/admin/api/users/{user_id}/permissions` | `user.edit`     |
//! | GET    | `/admin/api/permissions`               | `user.view`       |
//!
//! ## Getting Started
//!
//! ```no_run
//! use coursework::{Application, Config};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let app = Application::new(config).await?;
//! app.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! With `database.type: memory` nothing outside the process is needed; with
//! `database.type: external` (or `DATABASE_URL` set) migrations are run
//! against PostgreSQL at startup:
//!
//! ```ignore
//! coursework::migrator().run(&pool).await?;
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};

use crate::{
    api::handlers::{auth as auth_handlers, users},
    auth::{
        accounts::ensure_initial_admin,
        middleware::{enforce_route_policy, resolve_session},
        session::{SessionManager, SessionPolicy},
    },
    cache::QueryCache,
    config::DatabaseConfig,
    db::{
        handlers::{CredentialStore, MemoryCredentialStore, PgCredentialStore},
        models::users::{UserDBResponse, UserFilter},
    },
};

pub use types::UserId;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store.clone())
///     .sessions(SessionManager::new(store, policy))
///     .user_list_cache(QueryCache::new(&config.user_list_cache))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CredentialStore>,
    pub sessions: SessionManager,
    pub user_list_cache: QueryCache<UserFilter, Vec<UserDBResponse>>,
}

impl AppState {
    /// Wire a state from a config and a store.
    pub fn from_store(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self, errors::Error> {
        let policy = SessionPolicy::from_config(&config.auth.session)?;
        let user_list_cache = QueryCache::new(&config.user_list_cache);
        Ok(AppState::builder()
            .sessions(SessionManager::new(store.clone(), policy))
            .store(store)
            .user_list_cache(user_list_cache)
            .config(config)
            .build())
    }
}

/// Get the coursework database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the router with every route behind the session and route-policy layers.
///
/// The layers wrap the fallback too, so unknown paths are subject to the same
/// policy as known ones.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/", get(auth_handlers::home))
        .route("/login", get(auth_handlers::login_page).post(auth_handlers::login))
        .route("/register", post(auth_handlers::register))
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/profile", get(auth_handlers::profile));

    let admin_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{user_id}",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        .route("/users/{user_id}/permissions", put(users::update_permissions))
        .route("/permissions", get(users::list_permissions));

    Router::new()
        .merge(auth_routes)
        .nest("/admin/api", admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(from_fn_with_state(state.clone(), resolve_session))
                .layer(from_fn_with_state(state.clone(), enforce_route_policy)),
        )
        .with_state(state)
}

/// Open the configured store, running migrations for Postgres.
async fn setup_store(config: &Config) -> anyhow::Result<(Arc<dyn CredentialStore>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::External { url, max_connections } => {
            info!(max_connections, "Connecting to external database");
            let pool = PgPoolOptions::new().max_connections(*max_connections).connect(url).await?;
            migrator().run(&pool).await?;
            Ok((Arc::new(PgCredentialStore::new(pool.clone())), Some(pool)))
        }
        DatabaseConfig::Memory => {
            info!("Using in-memory store; nothing will persist across restarts");
            Ok((Arc::new(MemoryCredentialStore::new()), None))
        }
    }
}

/// A configured router bound to its store, ready to serve.
///
/// 1. **Create**: [`Application::new`] opens the store, runs migrations and ensures the admin user
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until shutdown
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind = %config.bind_address(), memory_store = matches!(config.database, DatabaseConfig::Memory), "Starting");

        let (store, pool) = setup_store(&config).await?;
        ensure_initial_admin(store.as_ref(), &config.admin_email, config.admin_password.as_deref()).await?;

        let state = AppState::from_store(config.clone(), store)?;
        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        Ok(())
    }
}
