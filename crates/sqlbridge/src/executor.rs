//! Uniform statement execution.
//!
//! Every call follows the same sequence: open a connection, look up the
//! target's columns if an upsert needs them, translate, re-bind the
//! parameters, execute, close. The connection is closed on every path,
//! including failures.

use sqlbridge_core::{
    classify, rebind, Dialect, SqlValue, Statement, TableSchema, TranslationPlan, Translator,
};
use tracing::{debug, warn};

use crate::config::{Config, LookupFailurePolicy};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::introspect::columns_of;
use crate::result::{Outcome, ResultSet, WriteReceipt};

/// Executes SQLite-dialect statements against the configured engine.
#[derive(Debug, Clone)]
pub struct Executor {
    config: Config,
    translator: Translator,
}

impl Executor {
    /// Creates an executor for `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        let translator = Translator::new(config.dialect);
        Self { config, translator }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the dialect statements are executed in.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// Executes `sql` with `params`.
    ///
    /// With `fetch` every row is returned; otherwise the statement is
    /// committed and a [`WriteReceipt`] is returned.
    ///
    /// # Errors
    ///
    /// See [`Executor::fetch_all`] and [`Executor::write`].
    pub async fn execute(&self, sql: &str, params: Vec<SqlValue>, fetch: bool) -> Result<Outcome> {
        if fetch {
            self.fetch_all(sql, params).await.map(Outcome::Rows)
        } else {
            self.write(sql, params).await.map(Outcome::Written)
        }
    }

    /// Runs a query and returns all of its rows.
    ///
    /// # Errors
    ///
    /// Returns any connection, translation or execution error.
    pub async fn fetch_all(&self, sql: &str, params: Vec<SqlValue>) -> Result<ResultSet> {
        let mut conn = Connection::open(&self.config).await?;
        let result = async {
            let (plan, params) = self.prepare(&mut conn, sql, params).await?;
            debug!(kind = %plan.kind, params = params.len(), "Fetching");
            conn.fetch_all(&plan.sql, &params).await
        }
        .await;
        release(conn).await;
        result
    }

    /// Executes a write and commits it.
    ///
    /// # Errors
    ///
    /// Returns any connection, translation or execution error. Rows written
    /// by earlier calls stay committed.
    pub async fn write(&self, sql: &str, params: Vec<SqlValue>) -> Result<WriteReceipt> {
        let mut conn = Connection::open(&self.config).await?;
        let result = async {
            let (plan, params) = self.prepare(&mut conn, sql, params).await?;
            debug!(kind = %plan.kind, params = params.len(), "Writing");
            let rows_affected = conn.execute(&plan.sql, &params).await?;
            Ok::<_, Error>(WriteReceipt {
                kind: plan.kind,
                rows_affected,
                statement: plan.sql,
            })
        }
        .await;
        release(conn).await;
        result
    }

    /// Shows what would be executed for `sql` without executing it.
    ///
    /// A connection is only opened when an upsert needs its target's
    /// columns.
    ///
    /// # Errors
    ///
    /// Returns translation errors, and lookup errors under
    /// [`LookupFailurePolicy::Fail`].
    pub async fn translate(&self, sql: &str) -> Result<TranslationPlan> {
        if !self.translator.needs_translation() {
            return Ok(TranslationPlan::passthrough(classify(sql), sql));
        }
        let statement = Statement::parse(sql)?;
        if statement.schema_request().is_none() {
            return Ok(self.translator.translate(&statement, None)?);
        }

        let mut conn = Connection::open(&self.config).await?;
        let plan = self.plan(&mut conn, &statement).await;
        release(conn).await;
        plan
    }

    /// Translates `sql` with a known column list instead of a live lookup.
    ///
    /// # Errors
    ///
    /// Returns translation errors.
    pub fn translate_with(&self, sql: &str, schema: &TableSchema) -> Result<TranslationPlan> {
        Ok(self.translator.translate_sql(sql, Some(schema))?)
    }

    /// Opens a connection and returns the engine version string.
    ///
    /// # Errors
    ///
    /// Returns connection and execution errors.
    pub async fn server_version(&self) -> Result<String> {
        let sql = match self.dialect() {
            Dialect::Sqlite => "SELECT sqlite_version()",
            Dialect::SqlServer => "SELECT @@VERSION",
        };
        let rs = self.fetch_all(sql, Vec::new()).await?;
        rs.rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|v| v.to_display_string())
            .ok_or_else(|| Error::execution(sql, "no version returned"))
    }

    async fn prepare(
        &self,
        conn: &mut Connection,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<(TranslationPlan, Vec<SqlValue>)> {
        let plan = if self.translator.needs_translation() {
            let statement = Statement::parse(sql)?;
            self.plan(conn, &statement).await?
        } else {
            TranslationPlan::passthrough(classify(sql), sql)
        };
        if plan.is_rewritten(sql) {
            debug!(kind = %plan.kind, statement = %plan.sql, "Rewrote statement");
        }
        let params = rebind(params, &plan)?;
        Ok((plan, params))
    }

    async fn plan(&self, conn: &mut Connection, statement: &Statement<'_>) -> Result<TranslationPlan> {
        let schema = match statement.schema_request() {
            Some(table) => match columns_of(conn, table).await {
                Ok(schema) => Some(schema),
                Err(err) => match self.config.on_lookup_failure {
                    LookupFailurePolicy::Fail => return Err(err),
                    LookupFailurePolicy::Passthrough => {
                        warn!(
                            %table,
                            error = %err,
                            "Could not get column names, executing statement untranslated"
                        );
                        return Ok(TranslationPlan::passthrough(
                            statement.kind(),
                            statement.source(),
                        ));
                    }
                },
            },
            None => None,
        };
        Ok(self.translator.translate(statement, schema.as_ref())?)
    }
}

async fn release(conn: Connection) {
    if let Err(err) = conn.close().await {
        warn!(error = %err, "Failed to close connection");
    }
}

#[cfg(test)]
mod tests {
    use sqlbridge_core::{ParamRule, StatementKind, TranslateError};

    use super::*;

    fn temp_executor(dir: &tempfile::TempDir) -> Executor {
        Executor::new(Config::sqlite(dir.path().join("exec.db")))
    }

    #[tokio::test]
    async fn test_write_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let executor = temp_executor(&dir);

        executor
            .write(
                "CREATE TABLE IF NOT EXISTS plans (globalid TEXT PRIMARY KEY, regnum TEXT)",
                Vec::new(),
            )
            .await
            .unwrap();
        let receipt = executor
            .write(
                "INSERT OR REPLACE INTO plans VALUES (?, ?)",
                vec!["abc".into(), "R1".into()],
            )
            .await
            .unwrap();
        assert_eq!(receipt.kind, StatementKind::UpsertInsert);
        assert_eq!(receipt.rows_affected, 1);
        assert_eq!(receipt.statement, "INSERT OR REPLACE INTO plans VALUES (?, ?)");

        let Outcome::Rows(rs) = executor
            .execute("SELECT globalid, regnum FROM plans", Vec::new(), true)
            .await
            .unwrap()
        else {
            panic!("expected rows");
        };
        assert_eq!(rs.rows, vec![vec![SqlValue::from("abc"), SqlValue::from("R1")]]);
    }

    #[tokio::test]
    async fn test_execution_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let executor = temp_executor(&dir);
        let err = executor
            .fetch_all("SELECT * FROM missing_table", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));

        // The failed call released its connection; the next one works.
        executor.write("CREATE TABLE t (a TEXT)", Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_native_translate_needs_no_connection() {
        let executor = Executor::new(Config::sqlite("/nonexistent/dir/never.db"));
        let plan = executor
            .translate("INSERT OR REPLACE INTO t VALUES (?, ?)")
            .await
            .unwrap();
        assert_eq!(plan.params, ParamRule::Identity);
    }

    #[test]
    fn test_translate_with_known_columns() {
        let executor = Executor::new(Config::default());
        let schema = TableSchema::new("plans", ["globalid", "regnum"]);
        let plan = executor
            .translate_with("INSERT OR REPLACE INTO plans VALUES (?, ?)", &schema)
            .unwrap();
        // SQLite is native, so nothing changes.
        assert_eq!(plan.sql, "INSERT OR REPLACE INTO plans VALUES (?, ?)");
    }

    #[tokio::test]
    async fn test_malformed_upsert_never_reaches_engine() {
        let executor = sql_server_executor(LookupFailurePolicy::Fail);
        let err = executor
            .translate("INSERT OR REPLACE INTO t SELECT * FROM s")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Translate(TranslateError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_sql_server_create_table_translates_offline() {
        let executor = sql_server_executor(LookupFailurePolicy::Fail);
        let plan = executor
            .translate("CREATE TABLE IF NOT EXISTS t (id TEXT PRIMARY KEY, v TEXT)")
            .await
            .unwrap();
        assert_eq!(plan.kind, StatementKind::CreateTable);
        assert!(plan.sql.contains("id NVARCHAR(255) PRIMARY KEY, v NVARCHAR(MAX)"));
    }

    fn sql_server_executor(policy: LookupFailurePolicy) -> Executor {
        let server = crate::config::SqlServerConfig::new(
            "localhost",
            "torgi",
            crate::config::SqlServerAuth::Trusted,
        );
        Executor::new(Config::sql_server(server).with_lookup_failure(policy))
    }

    // The column lookup only depends on the connection, so a SQLite
    // connection stands in for the SQL Server catalog here.
    async fn sqlite_catalog(dir: &tempfile::TempDir) -> Connection {
        let mut conn = Connection::open(&Config::sqlite(dir.path().join("catalog.db")))
            .await
            .unwrap();
        conn.execute(
            "CREATE TABLE plans (globalid TEXT PRIMARY KEY, regnum TEXT, hostingorg TEXT)",
            &[],
        )
        .await
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_upsert_plan_uses_live_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = sqlite_catalog(&dir).await;
        let executor = sql_server_executor(LookupFailurePolicy::Fail);

        let stmt = Statement::parse("INSERT OR REPLACE INTO plans VALUES (?, ?, ?)").unwrap();
        let plan = executor.plan(&mut conn, &stmt).await.unwrap();
        assert_eq!(plan.kind, StatementKind::UpsertInsert);
        assert!(plan.sql.contains("USING (VALUES (?, ?, ?)) AS source ([globalid], [regnum], [hostingorg])"));
        assert_eq!(plan.params, ParamRule::DuplicateNonKey { arity: 3 });
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = sqlite_catalog(&dir).await;
        let executor = sql_server_executor(LookupFailurePolicy::Fail);

        let stmt = Statement::parse("INSERT OR REPLACE INTO ghosts VALUES (?, ?)").unwrap();
        let err = executor.plan(&mut conn, &stmt).await.unwrap_err();
        assert!(matches!(err, Error::SchemaLookup { ref table, .. } if table == "ghosts"));
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_failure_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = sqlite_catalog(&dir).await;
        let executor = sql_server_executor(LookupFailurePolicy::Passthrough);

        let sql = "INSERT OR REPLACE INTO ghosts VALUES (?, ?)";
        let stmt = Statement::parse(sql).unwrap();
        let plan = executor.plan(&mut conn, &stmt).await.unwrap();
        assert_eq!(plan.sql, sql);
        assert_eq!(plan.params, ParamRule::Identity);
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_rebinds_for_merge() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = sqlite_catalog(&dir).await;
        let executor = sql_server_executor(LookupFailurePolicy::Fail);

        let (plan, params) = executor
            .prepare(
                &mut conn,
                "INSERT OR REPLACE INTO plans VALUES (?, ?, ?)",
                vec!["abc".into(), "R1".into(), "OrgA".into()],
            )
            .await
            .unwrap();
        assert_eq!(sqlbridge_core::count_placeholders(&plan.sql), params.len());
        assert_eq!(
            params,
            vec![
                SqlValue::from("abc"),
                SqlValue::from("R1"),
                SqlValue::from("OrgA"),
                SqlValue::from("R1"),
                SqlValue::from("OrgA"),
            ]
        );
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_version() {
        let dir = tempfile::tempdir().unwrap();
        let version = temp_executor(&dir).server_version().await.unwrap();
        assert!(version.starts_with('3'));
    }
}
