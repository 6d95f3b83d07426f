//! Front end for the expression language: tokens, the scanner and the
//! expression parser.

pub mod error;
pub mod expression;
pub mod lexer;
pub mod token;

pub use error::{LexError, ParseError};
pub use expression::Parser;
pub use lexer::Lexer;
pub use token::{Token, TokenKind, TokenValue};
