//! # sqlbridge-core
//!
//! Statement classification and rewriting for running SQLite-flavoured SQL
//! on SQL Server.
//!
//! Call sites write one dialect, SQLite. This crate decides what a statement
//! is and, when the target is SQL Server, produces the equivalent statement
//! along with the parameters it needs:
//!
//! - `CREATE TABLE` gets SQL Server column types and an `IF NOT EXISTS`
//!   catalog guard
//! - `INSERT OR REPLACE INTO` becomes a `MERGE` keyed on the first column
//! - everything else is passed through untouched
//!
//! It does no I/O. The live column list an upsert may need is supplied by
//! the caller as a [`TableSchema`].
//!
//! ## Rewriting an upsert
//!
//! ```rust
//! use sqlbridge_core::{Dialect, SqlValue, Statement, TableSchema, Translator, rebind};
//!
//! let stmt = Statement::parse("INSERT OR REPLACE INTO plans VALUES (?, ?, ?)").unwrap();
//! let schema = TableSchema::new("plans", ["globalid", "regnum", "hostingorg"]);
//!
//! let plan = Translator::new(Dialect::SqlServer)
//!     .translate(&stmt, Some(&schema))
//!     .unwrap();
//! assert!(plan.sql.starts_with("MERGE INTO [plans] AS target"));
//!
//! let values = vec![
//!     SqlValue::from("abc"),
//!     SqlValue::from("R1"),
//!     SqlValue::from("OrgA"),
//! ];
//! // The update branch binds the non-key values a second time.
//! assert_eq!(rebind(values, &plan).unwrap().len(), 5);
//! ```
//!
//! ## Native target
//!
//! ```rust
//! use sqlbridge_core::{Dialect, ParamRule, Translator};
//!
//! let sql = "INSERT OR REPLACE INTO plans VALUES (?, ?)";
//! let plan = Translator::new(Dialect::Sqlite).translate_sql(sql, None).unwrap();
//! assert_eq!(plan.sql, sql);
//! assert_eq!(plan.params, ParamRule::Identity);
//! ```

pub mod dialect;
pub mod error;
pub mod lexer;
pub mod rebind;
pub mod rewrite;
pub mod schema;
pub mod statement;
pub mod value;

pub use dialect::{Dialect, UnknownDialect};
pub use error::TranslateError;
pub use rebind::{count_placeholders, number_placeholders, rebind, RebindError};
pub use rewrite::{ParamRule, TranslationPlan, Translator};
pub use schema::TableSchema;
pub use statement::{classify, Statement, StatementKind, TableName};
pub use value::SqlValue;
