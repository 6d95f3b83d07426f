use miette::Diagnostic;
use thiserror::Error;

use crate::codegen::CompileError;
use crate::parser::error::{LexError, ParseError};

/// Any failure from scanning, parsing or compiling an expression
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),
}

impl Error {
    /// Source offset of the failure; compile errors have none
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Lex(e) => Some(e.offset()),
            Error::Parse(e) => Some(e.offset()),
            Error::Compile(_) => None,
        }
    }
}
