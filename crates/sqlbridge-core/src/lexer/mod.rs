//! Statement lexer.
//!
//! A hand-written lexer producing spanned tokens. Whitespace and comments are
//! dropped, so matching on tokens is whitespace-collapsed, and keywords are
//! recognized case-insensitively.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Keyword, Token, TokenKind};
pub use tokenizer::Lexer;
