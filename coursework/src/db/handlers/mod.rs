//! Credential store implementations.
//!
//! # Available Stores
//!
//! - [`PgCredentialStore`]: PostgreSQL via SQLx, the production store
//! - [`MemoryCredentialStore`]: in-process store for development and tests
//!
//! Both implement [`CredentialStore`], which is the only way the rest of the
//! crate touches persisted users and sessions.
//!
//! # Common Pattern
//!
//! ```ignore
//! use coursework::db::handlers::{CredentialStore, PgCredentialStore};
//!
//! async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PgCredentialStore::new(pool);
//!     if let Some(user) = store.find_user_by_email("user@example.com").await? {
//!         println!("Found user: {}", user.username);
//!     }
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;
pub use store::CredentialStore;
