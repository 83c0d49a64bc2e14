//! Error types for statement execution.

use sqlbridge_core::{Dialect, RebindError, TranslateError, UnknownDialect};

/// Errors that can occur while executing a statement.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid connection parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The driver could not establish a connection.
    #[error("Could not connect to {dialect}: {message}")]
    Connection {
        /// The engine being connected to.
        dialect: Dialect,
        /// Driver error message.
        message: String,
    },

    /// The column list of a table could not be read.
    #[error("Could not get column names for table '{table}': {reason}")]
    SchemaLookup {
        /// The table that was looked up.
        table: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// The statement could not be rewritten for the target dialect.
    #[error("Translation failed: {0}")]
    Translate(#[from] TranslateError),

    /// The parameters do not fit the rewritten statement.
    #[error("Parameter binding failed: {0}")]
    Rebind(#[from] RebindError),

    /// The engine rejected the statement.
    #[error("Execution failed: {message}\n  statement: {statement}")]
    Execution {
        /// The statement text sent to the engine.
        statement: String,
        /// Engine error message.
        message: String,
    },

    /// A row handed to a managed table does not match its columns.
    #[error("Invalid row for table '{table}': {message}")]
    InvalidRow {
        /// The managed table.
        table: String,
        /// What is wrong with the row.
        message: String,
    },
}

impl Error {
    /// Creates an execution error for `statement`.
    pub fn execution(statement: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Execution {
            statement: statement.into(),
            message: err.to_string(),
        }
    }
}

impl From<UnknownDialect> for Error {
    fn from(err: UnknownDialect) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result type for statement execution.
pub type Result<T> = std::result::Result<T, Error>;
