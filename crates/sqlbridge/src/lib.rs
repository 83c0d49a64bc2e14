//! Run SQLite-dialect statements unchanged against SQLite or SQL Server.
//!
//! Call sites write parameterized SQLite statements (`?` placeholders,
//! `INTEGER PRIMARY KEY AUTOINCREMENT`, `TEXT`, `INSERT OR REPLACE INTO`)
//! and hand them to an [`Executor`]. When the configured engine is SQL
//! Server the executor rewrites them on the fly:
//!
//! - `CREATE TABLE` gets `IDENTITY`/`NVARCHAR` column types and an
//!   existence guard
//! - `INSERT OR REPLACE INTO` becomes a `MERGE` keyed on the first column,
//!   using the live column list when the statement does not name columns
//! - everything else runs as written
//!
//! # Architecture
//!
//! - **Config** - dialect and connection parameters, read once
//! - **Connection** - one short-lived connection per call (`sqlx` for
//!   SQLite, `tiberius` for SQL Server)
//! - **Introspect** - ordered column names of a table
//! - **Executor** - open, translate, re-bind, execute, close
//! - **Tables** - the fixed set of tables the loader writes
//!
//! Statement analysis lives in [`sqlbridge_core`] and does no I/O.
//!
//! # Example
//!
//! ```rust,no_run
//! use sqlbridge::prelude::*;
//!
//! # async fn run() -> sqlbridge::error::Result<()> {
//! let executor = Executor::new(Config::from_env()?);
//! create_managed_tables(&executor).await?;
//!
//! executor
//!     .write(
//!         "INSERT OR REPLACE INTO privatisationplans (globalid, regnum) VALUES (?, ?)",
//!         vec!["abc".into(), "R1".into()],
//!     )
//!     .await?;
//!
//! let rows = executor
//!     .fetch_all("SELECT regnum FROM privatisationplans WHERE globalid = ?", vec!["abc".into()])
//!     .await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod result;
pub mod tables;

pub use sqlbridge_core;

/// Common imports.
pub mod prelude {
    pub use crate::config::{Config, LookupFailurePolicy, SqlServerAuth, SqlServerConfig};
    pub use crate::connection::Connection;
    pub use crate::error::{Error, Result};
    pub use crate::executor::Executor;
    pub use crate::result::{Outcome, ResultSet, WriteReceipt};
    pub use crate::tables::{create_managed_tables, ManagedTable};
    pub use sqlbridge_core::{Dialect, SqlValue, StatementKind, TranslationPlan};
}
