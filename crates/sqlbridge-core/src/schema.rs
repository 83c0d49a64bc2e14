//! Live table structure as reported by the target engine.

/// Column names of a table in declaration order.
///
/// By convention the first column is the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// The table the columns belong to.
    pub table: String,
    /// Column names ordered by ordinal position.
    pub columns: Vec<String>,
}

impl TableSchema {
    /// Creates a schema from a table name and its ordered column names.
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the primary key column.
    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table reported no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
