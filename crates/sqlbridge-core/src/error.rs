//! Translation errors.

use std::fmt;

use crate::lexer::Span;

/// Errors produced while parsing or rewriting a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The statement has a recognized prefix but an unsupported body.
    Malformed {
        /// What was expected.
        message: String,
        /// Where parsing stopped.
        span: Span,
    },
    /// The upsert has no column list and no schema was supplied for it.
    MissingSchema {
        /// The table whose columns are needed.
        table: String,
    },
    /// The number of columns does not match the number of placeholders.
    ColumnCount {
        /// The table being written.
        table: String,
        /// Placeholders in the `VALUES` clause.
        placeholders: usize,
        /// Columns named by the statement or reported by the schema.
        columns: usize,
    },
}

impl TranslateError {
    /// Creates a malformed-statement error at the given span.
    pub fn malformed(message: impl Into<String>, span: Span) -> Self {
        Self::Malformed {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { message, span } => write!(
                f,
                "Unsupported statement shape: {message} at position {}..{}",
                span.start, span.end
            ),
            Self::MissingSchema { table } => {
                write!(f, "Column list for table '{table}' is required but unknown")
            }
            Self::ColumnCount {
                table,
                placeholders,
                columns,
            } => write!(
                f,
                "Table '{table}' has {columns} column(s) but the statement binds {placeholders} value(s)"
            ),
        }
    }
}

impl std::error::Error for TranslateError {}
