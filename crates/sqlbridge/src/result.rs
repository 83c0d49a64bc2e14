//! Statement results.

use serde::Serialize;
use sqlbridge_core::{SqlValue, StatementKind};

/// All rows returned by a query, read eagerly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names in select-list order.
    ///
    /// Empty when the engine did not describe the result, which for SQLite
    /// happens when no row was returned.
    pub columns: Vec<String>,
    /// Row values, one entry per column.
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no row was returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of the column named `name`, ignoring case.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns the value of column `name` in row `row`.
    #[must_use]
    pub fn get(&self, row: usize, name: &str) -> Option<&SqlValue> {
        let index = self.column_index(name)?;
        self.rows.get(row)?.get(index)
    }

    /// Converts the rows into JSON objects keyed by column name.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = row
                    .iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let key = self
                            .columns
                            .get(i)
                            .cloned()
                            .unwrap_or_else(|| format!("column{}", i + 1));
                        (key, serde_json::to_value(value).unwrap_or_default())
                    })
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

/// The outcome of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    /// Classification of the caller's statement.
    #[serde(serialize_with = "serialize_kind")]
    pub kind: StatementKind,
    /// Rows reported as affected by the engine.
    pub rows_affected: u64,
    /// The statement text actually executed.
    pub statement: String,
}

fn serialize_kind<S: serde::Serializer>(kind: &StatementKind, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(kind)
}

/// The result of [`Executor::execute`](crate::executor::Executor::execute).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows of a fetch.
    Rows(ResultSet),
    /// Receipt of a committed write.
    Written(WriteReceipt),
}
