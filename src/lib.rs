//! Parser and sandboxing compiler for a small JavaScript-like expression
//! language, plus a parser for event stream selectors.
//!
//! ```ignore
//! let ast = vexpr::parse("datum.value * 2 + offset")?;
//! let out = vexpr::CodeGenerator::builder()
//!     .whitelist(["datum"])
//!     .fieldvar("datum")
//!     .build()
//!     .compile(&ast)?;
//! assert_eq!(out.code, "((datum.value*2)+global[\"offset\"])");
//! ```

pub mod ast;
pub mod codegen;
pub mod error;
pub mod hybrid_regex;
pub mod parser;
pub mod selector;

pub use ast::Expr;
pub use codegen::{CodeGenerator, CompileError, CompileOutput, FunctionDef, GlobalVar};
pub use error::Error;
pub use parser::{LexError, ParseError};
pub use selector::{parse_selector, SelectorParser, Stream};

/// Parse `text` as a single expression
pub fn parse(text: &str) -> Result<Expr, Error> {
    parser::Parser::parse(text)
}
