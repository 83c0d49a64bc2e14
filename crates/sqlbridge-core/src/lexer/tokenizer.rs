//! Statement tokenizer.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes SQL statement text.
pub struct Lexer<'a> {
    /// The input source code.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace and comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.peek() == Some('-') && self.peek_next() == Some('-') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                continue;
            }

            break;
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start, self.pos))
    }

    /// Scans an identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }

        let text = &self.input[self.start..self.pos];
        Keyword::from_str(text).map_or_else(
            || self.make_token(TokenKind::Identifier(text.to_string())),
            |keyword| self.make_token(TokenKind::Keyword(keyword)),
        )
    }

    /// Scans a delimited run (string literal or quoted identifier).
    ///
    /// A doubled closing delimiter inside the run stands for one literal
    /// delimiter. Returns `None` when the input ends before the run closes.
    fn scan_delimited(&mut self, close: char) -> Option<String> {
        self.advance(); // opening delimiter
        let mut value = String::new();
        loop {
            match self.advance()? {
                c if c == close => {
                    if self.peek() == Some(close) {
                        self.advance();
                        value.push(close);
                    } else {
                        return Some(value);
                    }
                }
                c => value.push(c),
            }
        }
    }

    fn scan_string(&mut self) -> Token {
        match self.scan_delimited('\'') {
            Some(value) => self.make_token(TokenKind::String(value)),
            None => self.make_token(TokenKind::Error("Unterminated string literal".into())),
        }
    }

    fn scan_quoted_identifier(&mut self, close: char) -> Token {
        match self.scan_delimited(close) {
            Some(name) => self.make_token(TokenKind::QuotedIdentifier(name)),
            None => {
                self.make_token(TokenKind::Error("Unterminated quoted identifier".into()))
            }
        }
    }

    /// Scans a number (integer, decimal or exponent form).
    fn scan_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Number(text.to_string()))
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '\'' => self.scan_string(),
            '"' => self.scan_quoted_identifier('"'),
            '`' => self.scan_quoted_identifier('`'),
            '[' => self.scan_quoted_identifier(']'),
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
            _ => {
                self.advance();
                let kind = match c {
                    '?' => TokenKind::Question,
                    '(' => TokenKind::LeftParen,
                    ')' => TokenKind::RightParen,
                    ',' => TokenKind::Comma,
                    ';' => TokenKind::Semicolon,
                    '.' => TokenKind::Dot,
                    other => TokenKind::Symbol(other),
                };
                self.make_token(kind)
            }
        }
    }

    /// Tokenizes the entire input, ending with an [`TokenKind::Eof`] token.
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
