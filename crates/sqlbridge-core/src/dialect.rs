//! Target dialect selection.

use std::fmt;
use std::str::FromStr;

/// The engine a statement is executed against.
///
/// Statements are always written in the [`Dialect::Sqlite`] vocabulary; when
/// the target is [`Dialect::SqlServer`] they are translated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// SQLite, the dialect call sites are written in.
    #[default]
    Sqlite,
    /// Microsoft SQL Server.
    SqlServer,
}

impl Dialect {
    /// Returns the configuration name of the dialect.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "SQLITE",
            Self::SqlServer => "SQLSERVER",
        }
    }

    /// Returns true for the dialect statements are written in.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Sqlite)
    }

    /// Quotes an identifier for this dialect.
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Self::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
            Self::SqlServer => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Returns the bind marker the driver expects for the 1-based `index`.
    #[must_use]
    pub fn bind_marker(&self, index: usize) -> String {
        match self {
            Self::Sqlite => String::from("?"),
            Self::SqlServer => format!("@P{index}"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a dialect name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDialect(pub String);

impl fmt::Display for UnknownDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unsupported database type: {}. Use 'SQLITE' or 'SQLSERVER'.",
            self.0
        )
    }
}

impl std::error::Error for UnknownDialect {}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SQLITE" => Ok(Self::Sqlite),
            "SQLSERVER" | "MSSQL" => Ok(Self::SqlServer),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("sqlite".parse::<Dialect>(), Ok(Dialect::Sqlite));
        assert_eq!(" SqlServer ".parse::<Dialect>(), Ok(Dialect::SqlServer));
        assert_eq!("mssql".parse::<Dialect>(), Ok(Dialect::SqlServer));
        let err = "oracle".parse::<Dialect>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported database type: oracle. Use 'SQLITE' or 'SQLSERVER'."
        );
    }

    #[test]
    fn test_default_is_sqlite() {
        assert_eq!(Dialect::default(), Dialect::Sqlite);
        assert!(Dialect::default().is_native());
        assert!(!Dialect::SqlServer.is_native());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::Sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::SqlServer.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_bind_marker() {
        assert_eq!(Dialect::Sqlite.bind_marker(3), "?");
        assert_eq!(Dialect::SqlServer.bind_marker(3), "@P3");
    }
}
