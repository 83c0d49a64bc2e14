//! SQLite to SQL Server statement rewriting.
//!
//! # CREATE TABLE
//!
//! Column types are replaced in place, leaving the rest of the text alone:
//!
//! | SQLite                                 | SQL Server                       |
//! |----------------------------------------|----------------------------------|
//! | `INTEGER PRIMARY KEY AUTOINCREMENT`    | `INT IDENTITY(1,1) PRIMARY KEY`  |
//! | `TEXT` in the primary key              | `NVARCHAR(255)`                  |
//! | any other `TEXT`                       | `NVARCHAR(MAX)`                  |
//!
//! SQL Server cannot index `NVARCHAR(MAX)`, hence the bounded key type.
//! `IF NOT EXISTS` becomes a catalog check around a plain `CREATE TABLE`.
//!
//! # INSERT OR REPLACE
//!
//! Becomes a `MERGE` keyed on the first column. The update clause binds the
//! non-key values a second time, so a row of `C` values needs `2C - 1`
//! parameters, see [`ParamRule::DuplicateNonKey`].

use crate::dialect::Dialect;
use crate::error::TranslateError;
use crate::lexer::Span;
use crate::schema::TableSchema;
use crate::statement::{
    classify, ColumnType, CreateTable, Statement, StatementKind, TableName, UpsertInsert,
};

/// Type for text columns that take part in the primary key.
pub const BOUNDED_TEXT: &str = "NVARCHAR(255)";

/// Type for all other text columns.
pub const UNBOUNDED_TEXT: &str = "NVARCHAR(MAX)";

/// Type for auto-increment integer keys.
pub const IDENTITY_INTEGER: &str = "INT IDENTITY(1,1)";

/// How the caller's parameters map onto the rewritten statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRule {
    /// Parameters are bound as given.
    Identity,
    /// The row of `arity` values is bound, followed by every value but the
    /// first (the primary key) once more.
    DuplicateNonKey {
        /// Number of values in the caller's row.
        arity: usize,
    },
}

impl ParamRule {
    /// Returns how many values the rule produces, if it fixes the count.
    #[must_use]
    pub const fn output_len(&self) -> Option<usize> {
        match self {
            Self::Identity => None,
            Self::DuplicateNonKey { arity } => Some((2 * *arity).saturating_sub(1)),
        }
    }
}

/// A statement ready for the target engine plus its parameter rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationPlan {
    /// Classification of the original statement.
    pub kind: StatementKind,
    /// Statement text in the target dialect.
    pub sql: String,
    /// How to derive the bound parameters.
    pub params: ParamRule,
}

impl TranslationPlan {
    /// A plan that executes `sql` unchanged with unchanged parameters.
    pub fn passthrough(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
            params: ParamRule::Identity,
        }
    }

    /// Returns true if the statement text was changed.
    #[must_use]
    pub fn is_rewritten(&self, original: &str) -> bool {
        self.sql != original
    }
}

/// Rewrites statements for one target dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    target: Dialect,
}

impl Translator {
    /// Creates a translator for `target`.
    #[must_use]
    pub const fn new(target: Dialect) -> Self {
        Self { target }
    }

    /// Returns the target dialect.
    #[must_use]
    pub const fn target(&self) -> Dialect {
        self.target
    }

    /// Returns true if statements must be rewritten for the target.
    #[must_use]
    pub const fn needs_translation(&self) -> bool {
        !self.target.is_native()
    }

    /// Translates a parsed statement.
    ///
    /// `schema` is only consulted for an upsert without a column list; see
    /// [`Statement::schema_request`].
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::MissingSchema`] when an upsert needs a
    /// schema and none was given, and [`TranslateError::ColumnCount`] when
    /// the columns do not match the placeholders.
    pub fn translate(
        &self,
        statement: &Statement<'_>,
        schema: Option<&TableSchema>,
    ) -> Result<TranslationPlan, TranslateError> {
        if !self.needs_translation() {
            return Ok(TranslationPlan::passthrough(
                statement.kind(),
                statement.source(),
            ));
        }

        match statement {
            Statement::Raw(sql) => Ok(TranslationPlan::passthrough(
                StatementKind::RawPassthrough,
                *sql,
            )),
            Statement::CreateTable(ct) => Ok(TranslationPlan::passthrough(
                StatementKind::CreateTable,
                rewrite_create_table(ct),
            )),
            Statement::Upsert(up) => {
                let columns = match (&up.columns, schema) {
                    (Some(explicit), _) => explicit.as_slice(),
                    (None, Some(schema)) => schema.columns.as_slice(),
                    (None, None) => {
                        return Err(TranslateError::MissingSchema {
                            table: up.table.to_string(),
                        });
                    }
                };
                Ok(TranslationPlan {
                    kind: StatementKind::UpsertInsert,
                    sql: rewrite_upsert(up, columns)?,
                    params: ParamRule::DuplicateNonKey {
                        arity: up.placeholders,
                    },
                })
            }
        }
    }

    /// Parses and translates statement text.
    ///
    /// When the target is the native dialect the text is only classified,
    /// never parsed, so the engine sees exactly what the caller wrote.
    ///
    /// # Errors
    ///
    /// See [`Statement::parse`] and [`Translator::translate`].
    pub fn translate_sql(
        &self,
        sql: &str,
        schema: Option<&TableSchema>,
    ) -> Result<TranslationPlan, TranslateError> {
        if !self.needs_translation() {
            return Ok(TranslationPlan::passthrough(classify(sql), sql));
        }
        self.translate(&Statement::parse(sql)?, schema)
    }
}

/// Rewrites a `CREATE TABLE` statement for SQL Server.
#[must_use]
pub fn rewrite_create_table(stmt: &CreateTable<'_>) -> String {
    let mut edits: Vec<(Span, &str)> = Vec::new();

    if let Some(span) = stmt.if_not_exists {
        edits.push((span, ""));
    }

    for column in &stmt.columns {
        match column.rewritable_type {
            Some((ColumnType::Integer, span)) => {
                if let Some(auto) = column.autoincrement {
                    if stmt.is_primary_key(column) {
                        edits.push((span, IDENTITY_INTEGER));
                        edits.push((auto, ""));
                    }
                }
            }
            Some((ColumnType::Text, span)) => {
                let replacement = if stmt.is_primary_key(column) {
                    BOUNDED_TEXT
                } else {
                    UNBOUNDED_TEXT
                };
                edits.push((span, replacement));
            }
            None => {}
        }
    }

    let body = apply_edits(stmt.source, edits);
    if stmt.if_not_exists.is_some() {
        wrap_if_not_exists(&stmt.table, body.trim())
    } else {
        body
    }
}

fn apply_edits(source: &str, mut edits: Vec<(Span, &str)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(source.len() + 16 * edits.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&source[cursor..span.start]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

fn sql_string(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

fn wrap_if_not_exists(table: &TableName, create: &str) -> String {
    let mut condition = format!("TABLE_NAME = {}", sql_string(&table.name));
    if let Some(schema) = &table.schema {
        condition.push_str(&format!(" AND TABLE_SCHEMA = {}", sql_string(schema)));
    }
    format!(
        "IF NOT EXISTS (SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE {condition})\n\
         BEGIN\n    {create}\nEND"
    )
}

/// Rewrites an upsert into a SQL Server `MERGE` over `columns`.
///
/// `columns[0]` is the key. With a single column there is nothing to update
/// and the `WHEN MATCHED` branch is left out.
///
/// # Errors
///
/// Returns [`TranslateError::ColumnCount`] if `columns` does not have one
/// entry per placeholder.
pub fn rewrite_upsert(
    stmt: &UpsertInsert<'_>,
    columns: &[String],
) -> Result<String, TranslateError> {
    if columns.is_empty() || columns.len() != stmt.placeholders {
        return Err(TranslateError::ColumnCount {
            table: stmt.table.to_string(),
            placeholders: stmt.placeholders,
            columns: columns.len(),
        });
    }

    let dialect = Dialect::SqlServer;
    let cols: Vec<String> = columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect();
    let key = &cols[0];
    let placeholders = vec!["?"; cols.len()].join(", ");

    let mut sql = format!(
        "MERGE INTO {target} AS target\n\
         USING (VALUES ({placeholders})) AS source ({columns})\n\
         ON target.{key} = source.{key}\n",
        target = stmt.table.quoted(dialect),
        columns = cols.join(", "),
    );

    if cols.len() > 1 {
        let assignments: Vec<String> = cols[1..].iter().map(|c| format!("{c} = ?")).collect();
        sql.push_str("WHEN MATCHED THEN\n    UPDATE SET ");
        sql.push_str(&assignments.join(", "));
        sql.push('\n');
    }

    let source_values: Vec<String> = cols.iter().map(|c| format!("source.{c}")).collect();
    sql.push_str(&format!(
        "WHEN NOT MATCHED THEN\n    INSERT ({})\n    VALUES ({});",
        cols.join(", "),
        source_values.join(", ")
    ));

    Ok(sql)
}
