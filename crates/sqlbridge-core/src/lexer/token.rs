//! Token types for the statement lexer.

use super::Span;

/// Keywords the classifier and rewriters care about.
///
/// Every other word is lexed as [`TokenKind::Identifier`], so the set only
/// needs to cover the statement shapes this crate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    // DML
    Insert,
    Or,
    Replace,
    Into,
    Values,

    // DDL
    Create,
    Table,
    If,
    Not,
    Exists,

    // Constraints
    Primary,
    Key,
    Autoincrement,
    Unique,
    Check,
    Foreign,
    References,
    Constraint,
    Default,
    Null,

    // Types rewritten between dialects
    Integer,
    Text,
}

impl Keyword {
    /// Attempts to parse a keyword from a string (case-insensitive).
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "OR" => Some(Self::Or),
            "REPLACE" => Some(Self::Replace),
            "INTO" => Some(Self::Into),
            "VALUES" => Some(Self::Values),
            "CREATE" => Some(Self::Create),
            "TABLE" => Some(Self::Table),
            "IF" => Some(Self::If),
            "NOT" => Some(Self::Not),
            "EXISTS" => Some(Self::Exists),
            "PRIMARY" => Some(Self::Primary),
            "KEY" => Some(Self::Key),
            "AUTOINCREMENT" => Some(Self::Autoincrement),
            "UNIQUE" => Some(Self::Unique),
            "CHECK" => Some(Self::Check),
            "FOREIGN" => Some(Self::Foreign),
            "REFERENCES" => Some(Self::References),
            "CONSTRAINT" => Some(Self::Constraint),
            "DEFAULT" => Some(Self::Default),
            "NULL" => Some(Self::Null),
            "INTEGER" => Some(Self::Integer),
            "TEXT" => Some(Self::Text),
            _ => None,
        }
    }

    /// Returns the canonical upper-case spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Or => "OR",
            Self::Replace => "REPLACE",
            Self::Into => "INTO",
            Self::Values => "VALUES",
            Self::Create => "CREATE",
            Self::Table => "TABLE",
            Self::If => "IF",
            Self::Not => "NOT",
            Self::Exists => "EXISTS",
            Self::Primary => "PRIMARY",
            Self::Key => "KEY",
            Self::Autoincrement => "AUTOINCREMENT",
            Self::Unique => "UNIQUE",
            Self::Check => "CHECK",
            Self::Foreign => "FOREIGN",
            Self::References => "REFERENCES",
            Self::Constraint => "CONSTRAINT",
            Self::Default => "DEFAULT",
            Self::Null => "NULL",
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
        }
    }
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A recognized keyword.
    Keyword(Keyword),
    /// A bare identifier.
    Identifier(String),
    /// A `"quoted"`, `` `quoted` `` or `[bracketed]` identifier, unescaped.
    QuotedIdentifier(String),
    /// A string literal, unescaped.
    String(String),
    /// A numeric literal, kept as written.
    Number(String),
    /// `?`
    Question,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// Any other single character (operators and the like).
    Symbol(char),
    /// A lexing error.
    Error(String),
    /// End of input.
    Eof,
}

/// A token with its location in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The source location.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is an end-of-file token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns true if this token is the given keyword.
    #[must_use]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.kind, TokenKind::Keyword(k) if k == keyword)
    }

    /// Returns the name this token denotes when used as an identifier.
    ///
    /// Keywords count too: SQLite lets `key` or `text` name a column.
    #[must_use]
    pub fn as_name(&self) -> Option<String> {
        match &self.kind {
            TokenKind::Identifier(name) | TokenKind::QuotedIdentifier(name) => {
                Some(name.clone())
            }
            TokenKind::Keyword(k) => Some(k.as_str().to_ascii_lowercase()),
            _ => None,
        }
    }
}
