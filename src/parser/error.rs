use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::selector::SelectorFault;

/// Errors raised while scanning expression text into tokens
#[allow(dead_code)] // Fields are used by miette's derive macros
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum LexError {
    #[error("Unexpected token ILLEGAL")]
    #[diagnostic(code(vexpr::lex::illegal))]
    Illegal {
        #[label("illegal character sequence")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unterminated string literal")]
    #[diagnostic(code(vexpr::lex::unterminated_string))]
    UnterminatedString {
        #[label("missing closing {quote} quote")]
        span: SourceSpan,
        quote: char,
        #[source_code]
        src: String,
    },

    #[error("Invalid regular expression: missing /")]
    #[diagnostic(code(vexpr::lex::unterminated_regex))]
    UnterminatedRegex {
        #[label("regular expression is not closed")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Invalid regular expression")]
    #[diagnostic(code(vexpr::lex::invalid_regex))]
    InvalidRegex {
        #[label("{reason}")]
        span: SourceSpan,
        reason: String,
        #[source_code]
        src: String,
    },

    #[error("Invalid regular expression flags: {flags}")]
    #[diagnostic(
        code(vexpr::lex::invalid_regex_flags),
        help("Valid flags are g, i, m, u and y")
    )]
    InvalidRegexFlags {
        flags: String,
        #[label("invalid flags")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },
}

impl LexError {
    /// Byte offset of the offending scan position
    pub fn offset(&self) -> usize {
        match self {
            LexError::Illegal { span, .. }
            | LexError::UnterminatedString { span, .. }
            | LexError::UnterminatedRegex { span, .. }
            | LexError::InvalidRegex { span, .. }
            | LexError::InvalidRegexFlags { span, .. } => span.offset(),
        }
    }
}

/// Errors raised while building an AST from tokens, or while splitting an
/// event selector into streams
#[allow(dead_code)] // Fields are used by miette's derive macros
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    #[diagnostic(
        code(vexpr::parse::unexpected_end),
        help("The expression is incomplete")
    )]
    UnexpectedEnd {
        /// Scan position, which the label may sit one character before
        at: usize,
        #[label("input ends here")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unexpected number")]
    #[diagnostic(code(vexpr::parse::unexpected_number))]
    UnexpectedNumber {
        #[label("unexpected number")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unexpected string")]
    #[diagnostic(code(vexpr::parse::unexpected_string))]
    UnexpectedString {
        #[label("unexpected string")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unexpected identifier")]
    #[diagnostic(code(vexpr::parse::unexpected_identifier))]
    UnexpectedIdentifier {
        #[label("unexpected identifier")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unexpected reserved word")]
    #[diagnostic(code(vexpr::parse::unexpected_reserved))]
    UnexpectedReserved {
        #[label("reserved word")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unexpected token {token}")]
    #[diagnostic(code(vexpr::parse::unexpected_token))]
    UnexpectedToken {
        token: String,
        #[label("unexpected token")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Disabled: {construct} is not supported in expressions")]
    #[diagnostic(
        code(vexpr::parse::disabled),
        help("Expressions may not use assignment, increment, delete, void, typeof or the comma operator")
    )]
    Disabled {
        construct: String,
        #[label("not supported")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unexpected token after expression")]
    #[diagnostic(
        code(vexpr::parse::trailing_input),
        help("An expression must consist of exactly one complete expression")
    )]
    TrailingInput {
        #[label("unexpected input")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Octal literals are not allowed in strict mode.")]
    #[diagnostic(code(vexpr::parse::strict_octal))]
    StrictOctal {
        #[label("octal literal")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Duplicate data property in object literal not allowed in strict mode")]
    #[diagnostic(code(vexpr::parse::duplicate_property))]
    DuplicateProperty {
        key: String,
        #[label("duplicate key '{key}'")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Expression is nested too deeply")]
    #[diagnostic(
        code(vexpr::parse::too_deep),
        help("Expressions may nest at most {limit} levels")
    )]
    TooDeep {
        limit: usize,
        #[label("limit reached here")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("{kind}: {fragment}")]
    #[diagnostic(code(vexpr::selector))]
    Selector {
        kind: SelectorFault,
        fragment: String,
        #[label("{kind}")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
        #[source_code]
        src: String,
    },
}

impl ParseError {
    /// Byte offset of the offending token or selector fragment
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnexpectedEnd { at, .. } => *at,
            ParseError::UnexpectedNumber { span, .. }
            | ParseError::UnexpectedString { span, .. }
            | ParseError::UnexpectedIdentifier { span, .. }
            | ParseError::UnexpectedReserved { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::Disabled { span, .. }
            | ParseError::TrailingInput { span, .. }
            | ParseError::StrictOctal { span, .. }
            | ParseError::DuplicateProperty { span, .. }
            | ParseError::TooDeep { span, .. }
            | ParseError::Selector { span, .. } => span.offset(),
        }
    }
}

/// Span of the character at `pos`, widened to one character so miette can
/// draw an arrow; at end of input it points back at the last character
pub(crate) fn point_span(src: &str, pos: usize) -> SourceSpan {
    if let Some(c) = src.get(pos..).and_then(|rest| rest.chars().next()) {
        (pos, c.len_utf8()).into()
    } else if let Some(c) = src.get(..pos).and_then(|head| head.chars().next_back()) {
        (pos - c.len_utf8(), c.len_utf8()).into()
    } else {
        (pos, 0).into()
    }
}

/// Span covering `[start, end)`, at least one character wide
pub(crate) fn range_span(src: &str, start: usize, end: usize) -> SourceSpan {
    if end > start {
        (start, end - start).into()
    } else {
        point_span(src, start)
    }
}
