//! sqlbridge CLI
//!
//! Runs SQLite-dialect statements against SQLite or SQL Server.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sqlbridge::config::{parse_flag, DEFAULT_SQLITE_PATH, DEFAULT_SQL_DATABASE, DEFAULT_SQL_DRIVER};
use sqlbridge::prelude::*;
use sqlbridge::tables::TIMESTAMP_FORMAT;
use sqlbridge_core::{Statement, TableName, TableSchema};

/// Run SQLite-dialect statements against SQLite or SQL Server.
#[derive(Parser)]
#[command(name = "sqlbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target engine.
    #[arg(long, env = "TORGIDB", default_value = "SQLITE")]
    dialect: Dialect,

    /// SQLite database file.
    #[arg(long, env = "SQLITE_PATH", default_value = DEFAULT_SQLITE_PATH)]
    sqlite_path: PathBuf,

    /// SQL Server host.
    #[arg(long, env = "SQL_SERVER", default_value = "localhost")]
    sql_server: String,

    /// SQL Server port.
    #[arg(long, env = "SQL_PORT", default_value_t = 1433)]
    sql_port: u16,

    /// SQL Server database.
    #[arg(long, env = "SQL_DATABASE", default_value = DEFAULT_SQL_DATABASE)]
    sql_database: String,

    /// SQL Server login name.
    #[arg(long, env = "SQL_USERNAME")]
    sql_username: Option<String>,

    /// SQL Server login password.
    #[arg(long, env = "SQL_PASSWORD", hide_env_values = true)]
    sql_password: Option<String>,

    /// Driver identifier shown in connection strings.
    #[arg(long, env = "SQL_DRIVER", default_value = DEFAULT_SQL_DRIVER)]
    sql_driver: String,

    /// Use trusted (integrated) authentication.
    #[arg(long, env = "SQL_TRUSTED_CONNECTION", action = ArgAction::SetTrue, value_parser = parse_flag)]
    trusted_connection: bool,

    /// Accept the server certificate without validation.
    #[arg(long, env = "SQL_TRUST_CERT", action = ArgAction::SetTrue, value_parser = parse_flag)]
    trust_cert: bool,

    /// What to do when an upsert target's columns cannot be read.
    #[arg(long, env = "SQLBRIDGE_LOOKUP_FAILURE", default_value = "fail")]
    on_lookup_failure: LookupFailurePolicy,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the managed tables.
    Init,

    /// Execute a statement.
    Exec {
        /// Statement text with `?` placeholders.
        sql: String,

        /// Value for the next placeholder; JSON scalars, anything else is text.
        #[arg(short, long = "bind")]
        binds: Vec<String>,

        /// Return rows instead of committing a write.
        #[arg(short, long)]
        fetch: bool,

        /// Output format for fetched rows.
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Upsert one row into a managed table.
    Upsert {
        /// Managed table name.
        table: String,

        /// Row as a JSON object keyed by column name.
        row: String,
    },

    /// Show the statement that would be executed.
    Translate {
        /// Statement text.
        sql: String,

        /// Column list to use instead of a live lookup.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// List the columns of a table.
    Columns {
        /// Table name, optionally schema-qualified.
        table: String,
    },

    /// Check that a connection can be opened.
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
}

impl Cli {
    fn config(&self) -> Config {
        let sql_server = (self.dialect == Dialect::SqlServer).then(|| SqlServerConfig {
            host: self.sql_server.clone(),
            port: self.sql_port,
            database: self.sql_database.clone(),
            driver: self.sql_driver.clone(),
            auth: SqlServerAuth::from_parts(
                self.sql_username.clone(),
                self.sql_password.clone(),
                self.trusted_connection,
            ),
            trust_cert: self.trust_cert,
        });
        Config {
            dialect: self.dialect,
            sqlite_path: self.sqlite_path.clone(),
            sql_server,
            on_lookup_failure: self.on_lookup_failure,
        }
    }
}

fn parse_bind(raw: &str) -> SqlValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Null) => SqlValue::Null,
        Ok(serde_json::Value::Bool(b)) => SqlValue::Bool(b),
        Ok(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(SqlValue::Int)
            .or_else(|| n.as_f64().map(SqlValue::Float))
            .unwrap_or_else(|| SqlValue::from(raw)),
        Ok(serde_json::Value::String(s)) => SqlValue::Text(s),
        _ => SqlValue::from(raw),
    }
}

fn print_table(rs: &ResultSet) {
    let cells: Vec<Vec<String>> = rs
        .rows
        .iter()
        .map(|row| row.iter().map(SqlValue::to_display_string).collect())
        .collect();
    let width = cells
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(rs.columns.len()))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0; width];
    for (i, name) in rs.columns.iter().enumerate() {
        widths[i] = name.chars().count();
    }
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{v:<w$}", w = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    if !rs.columns.is_empty() {
        println!("{}", line(&rs.columns));
        println!("{:-<1$}", "", widths.iter().sum::<usize>() + 3 * width.saturating_sub(1));
    }
    for row in &cells {
        println!("{}", line(row));
    }
    println!("({} row{})", rs.len(), if rs.len() == 1 { "" } else { "s" });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let executor = Executor::new(cli.config());

    match cli.command {
        Commands::Init => {
            info!("Creating tables on {}...", executor.config().describe());
            create_managed_tables(&executor).await?;
            info!("Tables are ready.");
        }

        Commands::Exec {
            sql,
            binds,
            fetch,
            format,
        } => {
            let params = binds.iter().map(|b| parse_bind(b)).collect();
            match executor.execute(&sql, params, fetch).await? {
                Outcome::Rows(rs) => match format {
                    Format::Table => print_table(&rs),
                    Format::Json => println!("{}", serde_json::to_string_pretty(&rs.to_json())?),
                },
                Outcome::Written(receipt) => {
                    info!(
                        "{} statement affected {} row(s).",
                        receipt.kind, receipt.rows_affected
                    );
                }
            }
        }

        Commands::Upsert { table, row } => {
            let Some(managed) = ManagedTable::find(&table) else {
                bail!("'{table}' is not a managed table");
            };
            let value: serde_json::Value =
                serde_json::from_str(&row).context("row must be a JSON object")?;
            let Some(object) = value.as_object() else {
                bail!("row must be a JSON object");
            };
            let now = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
            let params = managed.row_from_json(object, &now)?;
            let receipt = executor.write(&managed.upsert_sql(), params).await?;
            info!(
                "Upserted into {} ({} row(s) affected).",
                managed.name, receipt.rows_affected
            );
        }

        Commands::Translate { sql, columns } => {
            let plan = if columns.is_empty() {
                executor.translate(&sql).await?
            } else {
                let Statement::Upsert(upsert) = Statement::parse(&sql)? else {
                    bail!("--columns only applies to INSERT OR REPLACE statements");
                };
                executor.translate_with(&sql, &TableSchema::new(upsert.table.name, columns))?
            };
            info!("{} statement for {}:", plan.kind, executor.dialect());
            println!("{}", plan.sql);
        }

        Commands::Columns { table } => {
            let name = match table.split_once('.') {
                Some((schema, name)) => TableName {
                    schema: Some(schema.to_string()),
                    name: name.to_string(),
                },
                None => TableName::new(table),
            };
            let mut conn = Connection::open(executor.config()).await?;
            let schema = sqlbridge::introspect::columns_of(&mut conn, &name).await;
            conn.close().await?;
            for column in schema?.columns {
                println!("{column}");
            }
        }

        Commands::Check => {
            info!("Connecting to {}", executor.config().describe());
            let version = executor.server_version().await?;
            info!("Connection successful.");
            println!("{version}");
        }
    }

    Ok(())
}
