//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the `MirrorStore` and `SessionStore` ports,
//! backed by PostgreSQL through `diesel-async` and a `bb8` pool.
//!
//! - **Thin adapters**: stores only translate between Diesel rows and domain
//!   types.
//! - **Internal models**: row structs (`models.rs`) and the schema
//!   (`schema.rs`) never leave this module.
//! - **Typed errors**: Diesel and pool failures map onto the ports' error
//!   enums.
//!
//! ```ignore
//! use sync_engine::outbound::persistence::{DbPool, DieselMirrorStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/mirror")).await?;
//! let mirror = DieselMirrorStore::new(pool);
//! ```

mod diesel_mirror_store;
mod diesel_session_store;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_mirror_store::DieselMirrorStore;
pub use diesel_session_store::DieselSessionStore;
pub use migrations::{MigrationError, apply_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
