//! Connection configuration.
//!
//! The dialect is chosen once, when the [`Config`] is built, and every
//! [`Executor`](crate::executor::Executor) call uses it from then on.
//!
//! | Variable                   | Default                           |
//! |----------------------------|-----------------------------------|
//! | `TORGIDB`                  | `SQLITE`                          |
//! | `SQLITE_PATH`              | `torgi.db`                        |
//! | `SQL_SERVER`               | `localhost`                       |
//! | `SQL_PORT`                 | `1433`                            |
//! | `SQL_DATABASE`             | `torgi`                           |
//! | `SQL_USERNAME`             |                                   |
//! | `SQL_PASSWORD`             |                                   |
//! | `SQL_DRIVER`               | `{ODBC Driver 17 for SQL Server}` |
//! | `SQL_TRUSTED_CONNECTION`   | `no`                              |
//! | `SQL_TRUST_CERT`           | `no`                              |
//! | `SQLBRIDGE_LOOKUP_FAILURE` | `fail`                            |
//!
//! Without both `SQL_USERNAME` and `SQL_PASSWORD` a trusted connection is
//! used.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use sqlbridge_core::Dialect;

use crate::error::{Error, Result};

/// Default SQLite database file.
pub const DEFAULT_SQLITE_PATH: &str = "torgi.db";

/// Default SQL Server host.
pub const DEFAULT_SQL_SERVER: &str = "localhost";

/// Default SQL Server port.
pub const DEFAULT_SQL_PORT: u16 = 1433;

/// Default SQL Server database.
pub const DEFAULT_SQL_DATABASE: &str = "torgi";

/// Default driver identifier.
pub const DEFAULT_SQL_DRIVER: &str = "{ODBC Driver 17 for SQL Server}";

/// What to do when the column list of an upsert target cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupFailurePolicy {
    /// Fail the call with [`Error::SchemaLookup`].
    #[default]
    Fail,
    /// Log a warning and execute the statement untranslated.
    Passthrough,
}

impl fmt::Display for LookupFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fail => "fail",
            Self::Passthrough => "passthrough",
        })
    }
}

impl FromStr for LookupFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "passthrough" => Ok(Self::Passthrough),
            other => Err(Error::Configuration(format!(
                "Unknown lookup failure policy: {other}. Use 'fail' or 'passthrough'."
            ))),
        }
    }
}

/// How to authenticate against SQL Server.
#[derive(Clone, PartialEq, Eq)]
pub enum SqlServerAuth {
    /// SQL Server login.
    Login {
        /// Login name.
        username: String,
        /// Login password.
        password: String,
    },
    /// Trusted (integrated) authentication.
    Trusted,
}

impl SqlServerAuth {
    /// Picks the authentication mode from the configured values.
    ///
    /// A login is used when both a username and a password are given and a
    /// trusted connection was not requested.
    #[must_use]
    pub fn from_parts(username: Option<String>, password: Option<String>, trusted: bool) -> Self {
        match (username, password) {
            (Some(username), Some(password)) if !trusted => Self::Login { username, password },
            _ => Self::Trusted,
        }
    }
}

impl fmt::Debug for SqlServerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Trusted => f.write_str("Trusted"),
        }
    }
}

/// SQL Server connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlServerConfig {
    /// Server host name.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// ODBC driver identifier, shown in connection strings.
    pub driver: String,
    /// Authentication mode.
    pub auth: SqlServerAuth,
    /// Accept the server certificate without validation.
    pub trust_cert: bool,
}

impl SqlServerConfig {
    /// Creates a configuration with the default port and driver.
    pub fn new(host: impl Into<String>, database: impl Into<String>, auth: SqlServerAuth) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SQL_PORT,
            database: database.into(),
            driver: DEFAULT_SQL_DRIVER.to_string(),
            auth,
            trust_cert: false,
        }
    }

    /// Checks that every required parameter is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first missing parameter.
    pub fn validate(&self) -> Result<()> {
        let missing = |what: &str| Err(Error::Configuration(format!("{what} is not set")));
        if self.host.trim().is_empty() {
            return missing("SQL_SERVER");
        }
        if self.database.trim().is_empty() {
            return missing("SQL_DATABASE");
        }
        if self.driver.trim().is_empty() {
            return missing("SQL_DRIVER");
        }
        if let SqlServerAuth::Login { username, password } = &self.auth {
            if username.is_empty() {
                return missing("SQL_USERNAME");
            }
            if password.is_empty() {
                return missing("SQL_PASSWORD");
            }
        }
        Ok(())
    }

    /// Renders the ODBC-style connection string.
    #[must_use]
    pub fn connection_string(&self) -> String {
        self.render(false)
    }

    /// Renders the connection string with the password masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let server = if self.port == DEFAULT_SQL_PORT {
            self.host.clone()
        } else {
            format!("{},{}", self.host, self.port)
        };
        let base = format!(
            "DRIVER={};SERVER={server};DATABASE={}",
            self.driver, self.database
        );
        match &self.auth {
            SqlServerAuth::Login { username, password } => {
                let password = if redact { "***" } else { password.as_str() };
                format!("{base};UID={username};PWD={password}")
            }
            SqlServerAuth::Trusted => format!("{base};Trusted_Connection=yes"),
        }
    }
}

/// Everything needed to open connections for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The engine statements run against.
    pub dialect: Dialect,
    /// SQLite database file.
    pub sqlite_path: PathBuf,
    /// SQL Server parameters, required when `dialect` is SQL Server.
    pub sql_server: Option<SqlServerConfig>,
    /// Behavior when upsert column introspection fails.
    pub on_lookup_failure: LookupFailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::sqlite(DEFAULT_SQLITE_PATH)
    }
}

impl Config {
    /// Configuration for a SQLite database file.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            dialect: Dialect::Sqlite,
            sqlite_path: path.into(),
            sql_server: None,
            on_lookup_failure: LookupFailurePolicy::default(),
        }
    }

    /// Configuration for a SQL Server database.
    #[must_use]
    pub fn sql_server(server: SqlServerConfig) -> Self {
        Self {
            dialect: Dialect::SqlServer,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            sql_server: Some(server),
            on_lookup_failure: LookupFailurePolicy::default(),
        }
    }

    /// Sets the lookup failure policy.
    #[must_use]
    pub const fn with_lookup_failure(mut self, policy: LookupFailurePolicy) -> Self {
        self.on_lookup_failure = policy;
        self
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown dialect, a bad port,
    /// an unrecognized on/off value or an unknown lookup policy.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from a key lookup, see [`Config::from_env`].
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dialect: Dialect = get("TORGIDB").as_deref().unwrap_or("SQLITE").parse()?;
        let sqlite_path = get("SQLITE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH), PathBuf::from);
        let on_lookup_failure = get("SQLBRIDGE_LOOKUP_FAILURE")
            .map(|v| v.parse::<LookupFailurePolicy>())
            .transpose()?
            .unwrap_or_default();

        let sql_server = if dialect == Dialect::SqlServer {
            let port = match get("SQL_PORT") {
                Some(port) => port.trim().parse().map_err(|_| {
                    Error::Configuration(format!("SQL_PORT is not a valid port: {port}"))
                })?,
                None => DEFAULT_SQL_PORT,
            };
            let trusted = get("SQL_TRUSTED_CONNECTION")
                .map(|v| parse_flag(&v))
                .transpose()?
                .unwrap_or(false);
            let trust_cert = get("SQL_TRUST_CERT")
                .map(|v| parse_flag(&v))
                .transpose()?
                .unwrap_or(false);
            Some(SqlServerConfig {
                host: get("SQL_SERVER").unwrap_or_else(|| DEFAULT_SQL_SERVER.to_string()),
                port,
                database: get("SQL_DATABASE").unwrap_or_else(|| DEFAULT_SQL_DATABASE.to_string()),
                driver: get("SQL_DRIVER").unwrap_or_else(|| DEFAULT_SQL_DRIVER.to_string()),
                auth: SqlServerAuth::from_parts(get("SQL_USERNAME"), get("SQL_PASSWORD"), trusted),
                trust_cert,
            })
        } else {
            None
        };

        Ok(Self {
            dialect,
            sqlite_path,
            sql_server,
            on_lookup_failure,
        })
    }

    /// Returns the SQL Server parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if none were configured.
    pub fn sql_server_config(&self) -> Result<&SqlServerConfig> {
        self.sql_server
            .as_ref()
            .ok_or_else(|| Error::Configuration("SQL Server connection is not configured".into()))
    }

    /// Describes the connection target with secrets masked.
    #[must_use]
    pub fn describe(&self) -> String {
        match (self.dialect, &self.sql_server) {
            (Dialect::SqlServer, Some(server)) => server.redacted(),
            (Dialect::SqlServer, None) => String::from("SQL Server (not configured)"),
            (Dialect::Sqlite, _) => format!("SQLite database {}", self.sqlite_path.display()),
        }
    }
}

/// Parses an on/off setting such as `SQL_TRUST_CERT`.
///
/// Accepts `1`/`true`/`yes`/`on` and `0`/`false`/`no`/`off`, in any case.
/// An empty value is off.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for any other value.
pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Configuration(format!(
            "expected one of 1/true/yes/on or 0/false/no/off, got '{other}'"
        ))),
    }
}
