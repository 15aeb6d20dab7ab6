//! Database layer for users, sessions and submissions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ auth / handlers │  (session manager, account policy, API handlers)
//! └────────┬────────┘
//!          │  Arc<dyn CredentialStore>
//!          ↓
//! ┌─────────────────┐
//! │ CredentialStore │  (db::handlers - Postgres or in-memory)
//! └────────┬────────┘
//!          │
//!          ↓
//! ┌─────────────────┐
//! │     Models      │  (db::models - database records)
//! └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: The [`CredentialStore`](handlers::CredentialStore) trait and its implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Migrations
//!
//! The schema lives in `migrations/` and is embedded with `sqlx::migrate!`; see
//! [`crate::migrator`]. Cascading user deletion is performed inside one
//! transaction by [`PgCredentialStore`](handlers::PgCredentialStore); the
//! `ON DELETE CASCADE` on `sessions.user_id` is a second line.

pub mod errors;
pub mod handlers;
pub mod models;
