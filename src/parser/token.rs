//! Lexical tokens of the expression language and the character classes used
//! to scan them.

use std::fmt;

/// The syntactic category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    BooleanLiteral,
    EndOfInput,
    Identifier,
    Keyword,
    NullLiteral,
    NumericLiteral,
    Punctuator,
    StringLiteral,
    RegularExpression,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::BooleanLiteral => "Boolean",
            TokenKind::EndOfInput => "<end>",
            TokenKind::Identifier => "Identifier",
            TokenKind::Keyword => "Keyword",
            TokenKind::NullLiteral => "Null",
            TokenKind::NumericLiteral => "Numeric",
            TokenKind::Punctuator => "Punctuator",
            TokenKind::StringLiteral => "String",
            TokenKind::RegularExpression => "RegularExpression",
        };
        f.write_str(name)
    }
}

/// Cooked value of a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// End of input carries nothing
    None,
    /// Identifier/keyword name, punctuator text, or decoded string contents
    Text(String),
    Number(f64),
    Regex { pattern: String, flags: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Legacy octal numeric literal, or a string with a legacy octal escape
    pub octal: bool,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, value: TokenValue, start: usize, end: usize) -> Self {
        Token {
            kind,
            value,
            start,
            end,
            octal: false,
        }
    }

    pub(crate) fn end_of_input(at: usize) -> Self {
        Token::new(TokenKind::EndOfInput, TokenValue::None, at, at)
    }

    /// Text value for identifiers, keywords, punctuators, strings, booleans
    /// and null; empty otherwise
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Text(s) => s,
            _ => "",
        }
    }

    pub fn is_punctuator(&self, value: &str) -> bool {
        self.kind == TokenKind::Punctuator && self.text() == value
    }

    pub fn is_keyword(&self, value: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text() == value
    }

    /// Identifier names include reserved words and the literal words
    pub fn is_identifier_name(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier
                | TokenKind::Keyword
                | TokenKind::BooleanLiteral
                | TokenKind::NullLiteral
        )
    }
}

const KEYWORDS: &[&str] = &[
    "if", "in", "do", "var", "for", "new", "try", "let", "this", "else", "case", "void", "with",
    "enum", "while", "break", "catch", "throw", "const", "yield", "class", "super", "return",
    "typeof", "delete", "switch", "export", "import", "public", "static", "default", "finally",
    "extends", "package", "private", "function", "continue", "debugger", "interface",
    "protected", "instanceof", "implements",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub fn is_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\x0B'
            | '\x0C'
            | ' '
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{180E}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

pub fn is_identifier_start(c: char) -> bool {
    c == '$' || c == '_' || c == '\\' || unicode_ident::is_xid_start(c)
}

/// Continuation characters include combining marks, connector punctuation
/// and the zero-width joiners
pub fn is_identifier_part(c: char) -> bool {
    c == '$'
        || c == '\\'
        || c == '\u{200C}'
        || c == '\u{200D}'
        || unicode_ident::is_xid_continue(c)
}

pub fn is_octal_digit(c: char) -> bool {
    matches!(c, '0'..='7')
}
