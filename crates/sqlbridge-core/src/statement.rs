//! Statement classification and the small parser behind it.
//!
//! Only two statement shapes are understood structurally:
//!
//! ```text
//! CREATE TABLE [IF NOT EXISTS] <table> ( <column-def | table-constraint>, ... ) ...
//! INSERT OR REPLACE INTO <table> [( <col>, ... )] VALUES ( ?, ... ) [;]
//! ```
//!
//! Anything else is [`StatementKind::RawPassthrough`] and is executed as
//! written. A statement that starts like an upsert but does not have the
//! shape above is rejected instead of being guessed at.

use std::fmt;

use crate::dialect::Dialect;
use crate::error::TranslateError;
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};

/// The classification of a statement, derived from its text alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Executed unmodified.
    RawPassthrough,
    /// `CREATE TABLE ...`
    CreateTable,
    /// `INSERT OR REPLACE INTO ...`
    UpsertInsert,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RawPassthrough => "raw",
            Self::CreateTable => "create-table",
            Self::UpsertInsert => "upsert",
        })
    }
}

/// Classifies a statement by its leading tokens.
///
/// Matching is case-insensitive and ignores whitespace and comments.
#[must_use]
pub fn classify(sql: &str) -> StatementKind {
    kind_of(&Lexer::new(sql).tokenize())
}

fn starts_with(tokens: &[Token], keywords: &[Keyword]) -> bool {
    keywords
        .iter()
        .enumerate()
        .all(|(i, kw)| tokens.get(i).is_some_and(|t| t.is_keyword(*kw)))
}

fn kind_of(tokens: &[Token]) -> StatementKind {
    if starts_with(
        tokens,
        &[Keyword::Insert, Keyword::Or, Keyword::Replace, Keyword::Into],
    ) {
        StatementKind::UpsertInsert
    } else if starts_with(tokens, &[Keyword::Create, Keyword::Table]) {
        StatementKind::CreateTable
    } else {
        StatementKind::RawPassthrough
    }
}

/// A possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    /// Schema qualifier (`main`, `dbo`, ...).
    pub schema: Option<String>,
    /// Unqualified table name.
    pub name: String,
}

impl TableName {
    /// Creates an unqualified table name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Renders the name quoted for `dialect`.
    #[must_use]
    pub fn quoted(&self, dialect: Dialect) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                dialect.quote_identifier(schema),
                dialect.quote_identifier(&self.name)
            ),
            None => dialect.quote_identifier(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Column types that differ between the dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `INTEGER`
    Integer,
    /// `TEXT`
    Text,
}

/// A column definition inside `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name, unquoted.
    pub name: String,
    /// The declared type when it is one the rewriter replaces.
    pub rewritable_type: Option<(ColumnType, Span)>,
    /// `PRIMARY KEY` appears in the column definition.
    pub primary_key: bool,
    /// `AUTOINCREMENT` together with the whitespace before it.
    pub autoincrement: Option<Span>,
}

/// A parsed `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable<'a> {
    /// The statement text the spans refer to.
    pub source: &'a str,
    /// The table being created.
    pub table: TableName,
    /// `IF NOT EXISTS` up to the table name, if present.
    pub if_not_exists: Option<Span>,
    /// Column definitions in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Columns named by a table-level `PRIMARY KEY (...)` constraint.
    pub table_primary_key: Vec<String>,
}

impl CreateTable<'_> {
    /// Returns true if `column` is part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self, column: &ColumnDef) -> bool {
        column.primary_key
            || self
                .table_primary_key
                .iter()
                .any(|pk| pk.eq_ignore_ascii_case(&column.name))
    }
}

/// A parsed `INSERT OR REPLACE INTO` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertInsert<'a> {
    /// The statement text.
    pub source: &'a str,
    /// The target table.
    pub table: TableName,
    /// The explicit column list, if the statement has one.
    pub columns: Option<Vec<String>>,
    /// Number of `?` placeholders in `VALUES (...)`.
    pub placeholders: usize,
}

/// A classified statement with the structure its kind needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement<'a> {
    /// Anything this crate does not rewrite.
    Raw(&'a str),
    /// `CREATE TABLE ...`
    CreateTable(CreateTable<'a>),
    /// `INSERT OR REPLACE INTO ...`
    Upsert(UpsertInsert<'a>),
}

impl<'a> Statement<'a> {
    /// Classifies and parses a statement.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::Malformed`] when the statement has a
    /// recognized prefix but a body outside the supported shape.
    pub fn parse(sql: &'a str) -> Result<Self, TranslateError> {
        let tokens = Lexer::new(sql).tokenize();
        let mut parser = Parser::new(&tokens);
        match kind_of(&tokens) {
            StatementKind::RawPassthrough => Ok(Self::Raw(sql)),
            StatementKind::CreateTable => parser.create_table(sql).map(Self::CreateTable),
            StatementKind::UpsertInsert => parser.upsert(sql).map(Self::Upsert),
        }
    }

    /// Returns the statement kind.
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        match self {
            Self::Raw(_) => StatementKind::RawPassthrough,
            Self::CreateTable(_) => StatementKind::CreateTable,
            Self::Upsert(_) => StatementKind::UpsertInsert,
        }
    }

    /// Returns the original statement text.
    #[must_use]
    pub const fn source(&self) -> &'a str {
        match self {
            Self::Raw(sql) => *sql,
            Self::CreateTable(ct) => ct.source,
            Self::Upsert(up) => up.source,
        }
    }

    /// Returns the table whose live column list is needed to rewrite this
    /// statement, if any.
    #[must_use]
    pub const fn schema_request(&self) -> Option<&TableName> {
        match self {
            Self::Upsert(UpsertInsert {
                table,
                columns: None,
                ..
            }) => Some(table),
            _ => None,
        }
    }
}

/// Cursor over a token stream that always ends with `Eof`.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    const fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &'t Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.peek();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    /// Span from the current token to the last token before `Eof`.
    fn rest(&self) -> Span {
        let first = self.peek().span;
        self.tokens
            .iter()
            .rev()
            .find(|t| !t.is_eof())
            .map_or(first, |last| first.merge(last.span))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<&'t Token, TranslateError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(TranslateError::malformed(
                format!("expected {what}"),
                self.peek().span,
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<&'t Token, TranslateError> {
        if self.peek().is_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(TranslateError::malformed(
                format!("expected {}", keyword.as_str()),
                self.peek().span,
            ))
        }
    }

    fn name(&mut self, what: &str) -> Result<String, TranslateError> {
        let token = self.peek();
        match token.as_name() {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(TranslateError::malformed(
                format!("expected {what}"),
                token.span,
            )),
        }
    }

    fn table_name(&mut self) -> Result<TableName, TranslateError> {
        let first = self.name("table name")?;
        if self.check(&TokenKind::Dot) {
            self.advance();
            let name = self.name("table name")?;
            Ok(TableName {
                schema: Some(first),
                name,
            })
        } else {
            Ok(TableName::new(first))
        }
    }

    fn upsert<'s>(&mut self, source: &'s str) -> Result<UpsertInsert<'s>, TranslateError> {
        for kw in [Keyword::Insert, Keyword::Or, Keyword::Replace, Keyword::Into] {
            self.expect_keyword(kw)?;
        }
        let table = self.table_name()?;

        let columns = if self.check(&TokenKind::LeftParen) {
            self.advance();
            let mut names = vec![self.name("column name")?];
            while self.check(&TokenKind::Comma) {
                self.advance();
                names.push(self.name("column name")?);
            }
            self.expect(&TokenKind::RightParen, "')' after column list")?;
            Some(names)
        } else {
            None
        };

        self.expect_keyword(Keyword::Values)?;
        self.expect(&TokenKind::LeftParen, "'(' after VALUES")?;
        let mut placeholders = 0;
        loop {
            self.expect(&TokenKind::Question, "'?' placeholder")?;
            placeholders += 1;
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RightParen, "')' after VALUES list")?;

        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
        if !self.peek().is_eof() {
            return Err(TranslateError::malformed(
                "expected end of statement",
                self.rest(),
            ));
        }

        Ok(UpsertInsert {
            source,
            table,
            columns,
            placeholders,
        })
    }

    fn create_table<'s>(&mut self, source: &'s str) -> Result<CreateTable<'s>, TranslateError> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;

        let if_not_exists = if self.peek().is_keyword(Keyword::If) {
            let start = self.advance().span.start;
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            Some(Span::new(start, self.peek().span.start))
        } else {
            None
        };

        let table = self.table_name()?;
        let mut columns = Vec::new();
        let mut table_primary_key = Vec::new();

        // `CREATE TABLE t AS SELECT ...` has no column list to rewrite.
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            for def in self.column_list()? {
                match def.first().map(|t| &t.kind) {
                    Some(TokenKind::Keyword(
                        Keyword::Constraint
                        | Keyword::Primary
                        | Keyword::Unique
                        | Keyword::Check
                        | Keyword::Foreign,
                    )) => table_primary_key.extend(constraint_primary_key(def)),
                    Some(_) => {
                        if let Some(column) = column_def(def) {
                            columns.push(column);
                        }
                    }
                    None => {}
                }
            }
        }

        Ok(CreateTable {
            source,
            table,
            if_not_exists,
            columns,
            table_primary_key,
        })
    }

    /// Splits the parenthesized body into top-level comma-separated items,
    /// consuming the closing parenthesis.
    fn column_list(&mut self) -> Result<Vec<&'t [Token]>, TranslateError> {
        let mut items = Vec::new();
        let mut depth = 0usize;
        let mut start = self.pos;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen if depth == 0 => {
                    items.push(&self.tokens[start..self.pos]);
                    self.advance();
                    return Ok(items);
                }
                TokenKind::RightParen => depth -= 1,
                TokenKind::Comma if depth == 0 => {
                    items.push(&self.tokens[start..self.pos]);
                    start = self.pos + 1;
                }
                TokenKind::Eof => {
                    return Err(TranslateError::malformed(
                        "unterminated column list",
                        token.span,
                    ));
                }
                _ => {}
            }
            self.advance();
        }
    }
}

fn find_primary_key(tokens: &[Token]) -> Option<usize> {
    tokens
        .windows(2)
        .position(|w| w[0].is_keyword(Keyword::Primary) && w[1].is_keyword(Keyword::Key))
}

fn column_def(tokens: &[Token]) -> Option<ColumnDef> {
    let name = tokens.first()?.as_name()?;

    let rewritable_type = tokens.get(1).and_then(|t| match t.kind {
        TokenKind::Keyword(Keyword::Integer) => Some((ColumnType::Integer, t.span)),
        TokenKind::Keyword(Keyword::Text) => Some((ColumnType::Text, t.span)),
        _ => None,
    });

    let autoincrement = tokens
        .iter()
        .position(|t| t.is_keyword(Keyword::Autoincrement))
        .filter(|&i| i > 0)
        .map(|i| Span::new(tokens[i - 1].span.end, tokens[i].span.end));

    Some(ColumnDef {
        name,
        rewritable_type,
        primary_key: find_primary_key(&tokens[1..]).is_some(),
        autoincrement,
    })
}

/// Column names listed by `[CONSTRAINT name] PRIMARY KEY (a, b, ...)`.
fn constraint_primary_key(tokens: &[Token]) -> Vec<String> {
    let Some(i) = find_primary_key(tokens) else {
        return Vec::new();
    };

    let mut names = Vec::new();
    let mut expect_name = false;
    for token in &tokens[i + 2..] {
        match token.kind {
            TokenKind::LeftParen | TokenKind::Comma => expect_name = true,
            TokenKind::RightParen => break,
            _ if expect_name => {
                names.extend(token.as_name());
                expect_name = false;
            }
            _ => {}
        }
    }
    names
}
