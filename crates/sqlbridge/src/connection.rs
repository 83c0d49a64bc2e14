//! Connections to the configured engine.
//!
//! A [`Connection`] is opened for a single call and closed right after it.
//! SQLite goes through `sqlx`, SQL Server through `tiberius` over a tokio
//! TCP stream. Both take `?` placeholders; for SQL Server they are numbered
//! into `@P1`, `@P2`, ... before the statement is sent.

use std::path::Path;

use sqlbridge_core::{number_placeholders, Dialect, SqlValue};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteRow};
use sqlx::{Connection as _, Row, Sqlite, SqliteConnection, TypeInfo, ValueRef};
use tiberius::{AuthMethod, Client, ColumnData, FromSql, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::config::{Config, SqlServerAuth, SqlServerConfig};
use crate::error::{Error, Result};
use crate::result::ResultSet;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// An open connection to either engine.
pub enum Connection {
    /// SQLite database file.
    Sqlite(SqliteConnection),
    /// SQL Server session.
    SqlServer(Box<Client<Compat<TcpStream>>>),
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Connection").field(&self.dialect()).finish()
    }
}

impl Connection {
    /// Opens a connection for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] before any network I/O when SQL
    /// Server parameters are missing, and [`Error::Connection`] when the
    /// driver cannot connect.
    pub async fn open(config: &Config) -> Result<Self> {
        match config.dialect {
            Dialect::Sqlite => open_sqlite(&config.sqlite_path).await,
            Dialect::SqlServer => open_sql_server(config.sql_server_config()?).await,
        }
    }

    /// Returns the dialect of the engine behind this connection.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::SqlServer(_) => Dialect::SqlServer,
        }
    }

    /// Executes a statement and returns the number of affected rows.
    ///
    /// Each statement runs in autocommit mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] if the engine rejects the statement.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        match self {
            Self::Sqlite(conn) => {
                let result = bind_sqlite(sqlx::query(sql), params)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| Error::execution(sql, e))?;
                Ok(result.rows_affected())
            }
            Self::SqlServer(client) => {
                let sql = number_placeholders(sql, Dialect::SqlServer);
                let mut query = Query::new(sql.clone());
                bind_tds(&mut query, params);
                let result = query
                    .execute(&mut **client)
                    .await
                    .map_err(|e| Error::execution(&sql, e))?;
                Ok(result.total())
            }
        }
    }

    /// Runs a query and reads every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] if the engine rejects the statement or
    /// a value cannot be read.
    pub async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        match self {
            Self::Sqlite(conn) => {
                let rows = bind_sqlite(sqlx::query(sql), params)
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| Error::execution(sql, e))?;
                let columns = rows
                    .first()
                    .map(|row| {
                        row.columns()
                            .iter()
                            .map(|c| sqlx::Column::name(c).to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                let rows = rows
                    .iter()
                    .map(decode_sqlite_row)
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| Error::execution(sql, e))?;
                Ok(ResultSet { columns, rows })
            }
            Self::SqlServer(client) => {
                let sql = number_placeholders(sql, Dialect::SqlServer);
                let mut query = Query::new(sql.clone());
                bind_tds(&mut query, params);
                let mut stream = query
                    .query(&mut **client)
                    .await
                    .map_err(|e| Error::execution(&sql, e))?;
                let columns = stream
                    .columns()
                    .await
                    .map_err(|e| Error::execution(&sql, e))?
                    .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
                    .unwrap_or_default();
                let rows = stream
                    .into_first_result()
                    .await
                    .map_err(|e| Error::execution(&sql, e))?
                    .into_iter()
                    .map(|row| row.into_iter().map(decode_tds).collect())
                    .collect();
                Ok(ResultSet { columns, rows })
            }
        }
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the driver reports a failure while
    /// shutting down.
    pub async fn close(self) -> Result<()> {
        let dialect = self.dialect();
        let closed = match self {
            Self::Sqlite(conn) => conn.close().await.map_err(|e| e.to_string()),
            Self::SqlServer(client) => (*client).close().await.map_err(|e| e.to_string()),
        };
        debug!(%dialect, "Connection closed");
        closed.map_err(|message| Error::Connection { dialect, message })
    }
}

async fn open_sqlite(path: &Path) -> Result<Connection> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|e| Error::Connection {
            dialect: Dialect::Sqlite,
            message: e.to_string(),
        })?;
    debug!(path = %path.display(), "Opened SQLite connection");
    Ok(Connection::Sqlite(conn))
}

fn auth_method(auth: &SqlServerAuth) -> Result<AuthMethod> {
    match auth {
        SqlServerAuth::Login { username, password } => {
            Ok(AuthMethod::sql_server(username, password))
        }
        #[cfg(feature = "integrated-auth")]
        SqlServerAuth::Trusted => Ok(AuthMethod::Integrated),
        #[cfg(not(feature = "integrated-auth"))]
        SqlServerAuth::Trusted => Err(Error::Configuration(
            "trusted connections need the `integrated-auth` feature; \
             set SQL_USERNAME and SQL_PASSWORD instead"
                .into(),
        )),
    }
}

async fn open_sql_server(server: &SqlServerConfig) -> Result<Connection> {
    server.validate()?;

    let mut config = tiberius::Config::new();
    config.host(&server.host);
    config.port(server.port);
    config.database(&server.database);
    config.authentication(auth_method(&server.auth)?);
    if server.trust_cert {
        config.trust_cert();
    }

    let connect_error = |e: &dyn std::fmt::Display| Error::Connection {
        dialect: Dialect::SqlServer,
        message: e.to_string(),
    };

    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| connect_error(&e))?;
    tcp.set_nodelay(true).map_err(|e| connect_error(&e))?;
    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| connect_error(&e))?;

    debug!(host = %server.host, database = %server.database, "Opened SQL Server connection");
    Ok(Connection::SqlServer(Box::new(client)))
}

fn bind_sqlite<'q>(mut query: SqliteQuery<'q>, params: &[SqlValue]) -> SqliteQuery<'q> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(n) => query.bind(*n),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(b) => query.bind(b.clone()),
        };
    }
    query
}

fn bind_tds(query: &mut Query<'_>, params: &[SqlValue]) {
    for value in params {
        match value {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(n) => query.bind(*n),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(b) => query.bind(b.clone()),
        }
    }
}

fn decode_sqlite_row(row: &SqliteRow) -> std::result::Result<Vec<SqlValue>, sqlx::Error> {
    (0..row.len()).map(|i| decode_sqlite(row, i)).collect()
}

/// Reads a value by its storage class rather than the declared column type.
fn decode_sqlite(row: &SqliteRow, index: usize) -> std::result::Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    match storage.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index).map(SqlValue::Int),
        "REAL" => row.try_get::<f64, _>(index).map(SqlValue::Float),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(SqlValue::Blob),
        _ => row.try_get::<String, _>(index).map(SqlValue::Text),
    }
}

fn decode_tds(data: ColumnData<'static>) -> SqlValue {
    match data {
        ColumnData::U8(v) => v.map_or(SqlValue::Null, |n| SqlValue::Int(n.into())),
        ColumnData::I16(v) => v.map_or(SqlValue::Null, |n| SqlValue::Int(n.into())),
        ColumnData::I32(v) => v.map_or(SqlValue::Null, |n| SqlValue::Int(n.into())),
        ColumnData::I64(v) => v.map_or(SqlValue::Null, SqlValue::Int),
        ColumnData::F32(v) => v.map_or(SqlValue::Null, |n| SqlValue::Float(n.into())),
        ColumnData::F64(v) => v.map_or(SqlValue::Null, SqlValue::Float),
        ColumnData::Bit(v) => v.map_or(SqlValue::Null, SqlValue::Bool),
        ColumnData::String(v) => v.map_or(SqlValue::Null, |s| SqlValue::Text(s.into_owned())),
        ColumnData::Binary(v) => v.map_or(SqlValue::Null, |b| SqlValue::Blob(b.into_owned())),
        ColumnData::Guid(v) => v.map_or(SqlValue::Null, |g| SqlValue::Text(g.to_string())),
        ColumnData::Numeric(v) => v.map_or(SqlValue::Null, |n| SqlValue::Float(n.into())),
        ColumnData::Xml(v) => v.map_or(SqlValue::Null, |x| {
            SqlValue::Text(x.into_owned().into_string())
        }),
        temporal => decode_temporal(&temporal),
    }
}

/// Date and time values are returned as ISO 8601 text.
fn decode_temporal(data: &ColumnData<'static>) -> SqlValue {
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

    let text = match data {
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .ok()
            .flatten()
            .map(|d| d.format("%Y-%m-%d").to_string()),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .ok()
            .flatten()
            .map(|t| t.format("%H:%M:%S%.f").to_string()),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .ok()
            .flatten()
            .map(|dt| dt.to_rfc3339()),
        _ => NaiveDateTime::from_sql(data)
            .ok()
            .flatten()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
    };
    text.map_or(SqlValue::Null, SqlValue::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_round_trip_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::sqlite(dir.path().join("values.db"));
        let mut conn = Connection::open(&config).await.unwrap();
        assert_eq!(conn.dialect(), Dialect::Sqlite);

        conn.execute(
            "CREATE TABLE v (i INTEGER, r REAL, t TEXT, b BLOB, n TEXT)",
            &[],
        )
        .await
        .unwrap();
        let inserted = conn
            .execute(
                "INSERT INTO v VALUES (?, ?, ?, ?, ?)",
                &[
                    SqlValue::Int(42),
                    SqlValue::Float(1.5),
                    SqlValue::from("text"),
                    SqlValue::Blob(vec![0xde, 0xad]),
                    SqlValue::Null,
                ],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let rs = conn.fetch_all("SELECT * FROM v", &[]).await.unwrap();
        assert_eq!(rs.columns, vec!["i", "r", "t", "b", "n"]);
        assert_eq!(
            rs.rows,
            vec![vec![
                SqlValue::Int(42),
                SqlValue::Float(1.5),
                SqlValue::from("text"),
                SqlValue::Blob(vec![0xde, 0xad]),
                SqlValue::Null,
            ]]
        );
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_execution_error_names_statement() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open(&Config::sqlite(dir.path().join("e.db")))
            .await
            .unwrap();
        let err = conn.execute("SELEC 1", &[]).await.unwrap_err();
        match err {
            Error::Execution { statement, .. } => assert_eq!(statement, "SELEC 1"),
            other => panic!("unexpected error: {other}"),
        }
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_sql_server_requires_configuration() {
        let config = Config {
            dialect: Dialect::SqlServer,
            ..Config::default()
        };
        let err = Connection::open(&config).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_sql_server_missing_parameter_fails_before_connecting() {
        let server = SqlServerConfig::new(
            "",
            "torgi",
            SqlServerAuth::Login {
                username: "sa".into(),
                password: "pw".into(),
            },
        );
        let err = Connection::open(&Config::sql_server(server))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: SQL_SERVER is not set");
    }

    #[test]
    fn test_decode_tds_values() {
        assert_eq!(decode_tds(ColumnData::I32(Some(7))), SqlValue::Int(7));
        assert_eq!(decode_tds(ColumnData::I32(None)), SqlValue::Null);
        assert_eq!(decode_tds(ColumnData::Bit(Some(true))), SqlValue::Bool(true));
        assert_eq!(
            decode_tds(ColumnData::String(Some("OrgA".into()))),
            SqlValue::from("OrgA")
        );
    }
}
