//! Live column lookup.
//!
//! Column lists are read from the engine on every call and never cached,
//! so a table altered between two calls is seen as it is now.

use sqlbridge_core::{Dialect, SqlValue, TableName, TableSchema};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};

const SQL_SERVER_COLUMNS: &str = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

const SQL_SERVER_COLUMNS_IN_SCHEMA: &str = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_NAME = ? AND TABLE_SCHEMA = ? ORDER BY ORDINAL_POSITION";

const SQLITE_COLUMNS: &str = "SELECT name FROM pragma_table_info(?) ORDER BY cid";

const SQLITE_COLUMNS_IN_SCHEMA: &str = "SELECT name FROM pragma_table_info(?, ?) ORDER BY cid";

/// Returns the ordered column names of `table`.
///
/// # Errors
///
/// Returns [`Error::SchemaLookup`] if the query fails or the table has no
/// columns, which is also how a missing table shows up.
pub async fn columns_of(conn: &mut Connection, table: &TableName) -> Result<TableSchema> {
    let lookup_error = |reason: String| Error::SchemaLookup {
        table: table.to_string(),
        reason,
    };

    let mut params = vec![SqlValue::from(table.name.as_str())];
    if let Some(schema) = &table.schema {
        params.push(SqlValue::from(schema.as_str()));
    }
    let sql = match (conn.dialect(), table.schema.is_some()) {
        (Dialect::SqlServer, false) => SQL_SERVER_COLUMNS,
        (Dialect::SqlServer, true) => SQL_SERVER_COLUMNS_IN_SCHEMA,
        (Dialect::Sqlite, false) => SQLITE_COLUMNS,
        (Dialect::Sqlite, true) => SQLITE_COLUMNS_IN_SCHEMA,
    };

    let rows = conn
        .fetch_all(sql, &params)
        .await
        .map_err(|e| lookup_error(e.to_string()))?;

    let columns: Vec<String> = rows
        .rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter_map(|value| value.as_text().map(str::to_string))
        .collect();

    if columns.is_empty() {
        return Err(lookup_error("table not found or has no columns".into()));
    }

    debug!(table = %table, columns = columns.len(), "Read column list");
    Ok(TableSchema::new(table.name.clone(), columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn open_temp(dir: &tempfile::TempDir) -> Connection {
        Connection::open(&Config::sqlite(dir.path().join("schema.db")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_columns_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open_temp(&dir).await;
        conn.execute(
            "CREATE TABLE plans (globalid TEXT PRIMARY KEY, regnum TEXT, hostingorg TEXT)",
            &[],
        )
        .await
        .unwrap();

        let schema = columns_of(&mut conn, &TableName::new("plans")).await.unwrap();
        assert_eq!(schema.table, "plans");
        assert_eq!(schema.columns, vec!["globalid", "regnum", "hostingorg"]);
        assert_eq!(schema.primary_key(), Some("globalid"));
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_qualified_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open_temp(&dir).await;
        conn.execute("CREATE TABLE t (a TEXT, b TEXT)", &[])
            .await
            .unwrap();

        let table = TableName {
            schema: Some("main".into()),
            name: "t".into(),
        };
        let schema = columns_of(&mut conn, &table).await.unwrap();
        assert_eq!(schema.columns, vec!["a", "b"]);
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_is_lookup_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open_temp(&dir).await;

        let err = columns_of(&mut conn, &TableName::new("nonexistent"))
            .await
            .unwrap_err();
        match err {
            Error::SchemaLookup { table, .. } => assert_eq!(table, "nonexistent"),
            other => panic!("unexpected error: {other}"),
        }
        conn.close().await.unwrap();
    }
}
