//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the billing domain ports, built on SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: [`repositories::PgLedgerStore`]
//! and [`repositories::PgStudentDirectory`] implement the port traits the
//! domain defines, hiding every SQL detail from the ledger core.
//!
//! # Consistency
//!
//! A ledger commit runs in one SQL transaction that takes a per-student
//! advisory lock and verifies the optimistic version before applying the
//! mutation. Concurrent mutations of the same student therefore serialize
//! at the database, while different students proceed in parallel.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{DatabaseConfig, PgLedgerStore};
//!
//! let pool = DatabaseConfig::new(url).connect().await?;
//! infra_db::run_migrations(&pool).await?;
//! let store = PgLedgerStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;

pub use pool::{run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use repositories::{PgLedgerStore, PgStudentDirectory};
