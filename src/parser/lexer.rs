//! Tokenizer for the expression language.
//!
//! The lexer is a cursor over the source text: [`Lexer::advance`] scans the
//! token starting at the current position and moves past it,
//! [`Lexer::peek_ahead`] scans without moving. Regular-expression literals
//! are only recognized through [`Lexer::scan_regex`], because a `/` in
//! operator position is a division.

use std::sync::OnceLock;

use super::error::{point_span, range_span, LexError};
use super::token::{
    is_identifier_part, is_identifier_start, is_keyword, is_line_terminator, is_octal_digit,
    is_whitespace, Token, TokenKind, TokenValue,
};
use crate::hybrid_regex;

pub struct Lexer<'src> {
    source: &'src str,
    /// Current byte position; always on a char boundary
    index: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer { source, index: 0 }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Move the cursor to a save point, typically the start of a token that
    /// must be re-scanned
    pub fn seek(&mut self, index: usize) {
        debug_assert!(self.source.is_char_boundary(index));
        self.index = index.min(self.source.len());
    }

    /// Scan the next token and move past it
    pub fn advance(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let Some(ch) = self.peek() else {
            return Ok(Token::end_of_input(self.index));
        };

        if is_identifier_start(ch) {
            return self.scan_identifier();
        }

        if ch == '\'' || ch == '"' {
            return self.scan_string();
        }

        // a dot starts a number only when a digit follows
        if ch == '.' {
            if matches!(self.char_at(self.index + 1), Some(c) if c.is_ascii_digit()) {
                return self.scan_numeric();
            }
            return self.scan_punctuator();
        }

        if ch.is_ascii_digit() {
            return self.scan_numeric();
        }

        self.scan_punctuator()
    }

    /// Scan the next token without consuming it
    pub fn peek_ahead(&mut self) -> Result<Token, LexError> {
        let pos = self.index;
        let token = self.advance();
        self.index = pos;
        token
    }

    /// Scan a regular-expression literal starting at the cursor. The pattern
    /// is validated by compiling it.
    pub fn scan_regex(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.index;

        if self.peek() != Some('/') {
            return Err(self.illegal());
        }
        self.bump();

        let mut in_class = false;
        let mut terminated = false;
        while let Some(ch) = self.bump() {
            if ch == '\\' {
                match self.bump() {
                    Some(c) if !is_line_terminator(c) => {}
                    _ => return Err(self.unterminated_regex(start)),
                }
            } else if is_line_terminator(ch) {
                return Err(self.unterminated_regex(start));
            } else if in_class {
                if ch == ']' {
                    in_class = false;
                }
            } else if ch == '/' {
                terminated = true;
                break;
            } else if ch == '[' {
                in_class = true;
            }
        }

        if !terminated {
            return Err(self.unterminated_regex(start));
        }

        let pattern = self.source[start + 1..self.index - 1].to_string();

        let mut flags = String::new();
        while let Some(ch) = self.peek() {
            if !is_identifier_part(ch) {
                break;
            }
            self.bump();
            if ch == '\\' && self.index < self.source.len() {
                return Err(self.illegal());
            }
            flags.push(ch);
        }

        if flags.chars().any(|c| !"gimuy".contains(c)) {
            return Err(LexError::InvalidRegexFlags {
                flags,
                span: range_span(self.source, start, self.index),
                src: self.source.to_string(),
            });
        }

        self.test_regex(&pattern, &flags, start)?;

        Ok(Token::new(
            TokenKind::RegularExpression,
            TokenValue::Regex { pattern, flags },
            start,
            self.index,
        ))
    }

    // ============================================================
    // Character helpers
    // ============================================================

    fn peek(&self) -> Option<char> {
        self.char_at(self.index)
    }

    fn char_at(&self, at: usize) -> Option<char> {
        self.source.get(at..)?.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.index += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if is_whitespace(ch) || is_line_terminator(ch) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn illegal(&self) -> LexError {
        LexError::Illegal {
            span: point_span(self.source, self.index),
            src: self.source.to_string(),
        }
    }

    fn unterminated_regex(&self, start: usize) -> LexError {
        LexError::UnterminatedRegex {
            span: range_span(self.source, start, self.index),
            src: self.source.to_string(),
        }
    }

    // ============================================================
    // Escapes
    // ============================================================

    /// Exactly `len` hex digits
    fn scan_hex_escape(&mut self, len: usize) -> Result<u32, LexError> {
        let mut code = 0u32;
        for _ in 0..len {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(digit) => {
                    self.bump();
                    code = code * 16 + digit;
                }
                None => return Err(self.illegal()),
            }
        }
        Ok(code)
    }

    /// `\u{H+}`, called with the cursor just past the `{`
    fn scan_code_point_escape(&mut self) -> Result<u32, LexError> {
        // at least one hex digit is required
        if self.peek() == Some('}') {
            return Err(self.illegal());
        }

        let mut code = 0u32;
        let mut last = None;
        while let Some(ch) = self.bump() {
            last = Some(ch);
            match ch.to_digit(16) {
                Some(digit) => code = code.saturating_mul(16).saturating_add(digit),
                None => break,
            }
        }

        if code > 0x10FFFF || last != Some('}') {
            return Err(self.illegal());
        }
        Ok(code)
    }

    /// `\uXXXX` or `\u{...}` inside an identifier, called with the cursor on
    /// the backslash
    fn scan_identifier_escape(&mut self, valid: fn(char) -> bool) -> Result<char, LexError> {
        self.bump();
        if self.peek() != Some('u') {
            return Err(self.illegal());
        }
        self.bump();

        let code = if self.peek() == Some('{') {
            self.bump();
            self.scan_code_point_escape()?
        } else {
            self.scan_hex_escape(4)?
        };

        match char::from_u32(code) {
            Some(c) if c != '\\' && valid(c) => Ok(c),
            _ => Err(self.illegal()),
        }
    }

    // ============================================================
    // Identifiers
    // ============================================================

    fn get_identifier(&mut self) -> Result<String, LexError> {
        let start = self.index;
        self.bump();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                // restart with escape handling
                self.index = start;
                return self.get_escaped_identifier();
            }
            if !is_identifier_part(ch) {
                break;
            }
            self.bump();
        }
        Ok(self.source[start..self.index].to_string())
    }

    fn get_escaped_identifier(&mut self) -> Result<String, LexError> {
        let mut id = String::new();

        if self.peek() == Some('\\') {
            id.push(self.scan_identifier_escape(is_identifier_start)?);
        } else if let Some(ch) = self.bump() {
            id.push(ch);
        }

        while let Some(ch) = self.peek() {
            if !is_identifier_part(ch) {
                break;
            }
            if ch == '\\' {
                id.push(self.scan_identifier_escape(is_identifier_part)?);
            } else {
                self.bump();
                id.push(ch);
            }
        }

        Ok(id)
    }

    fn scan_identifier(&mut self) -> Result<Token, LexError> {
        let start = self.index;

        let id = if self.peek() == Some('\\') {
            self.get_escaped_identifier()?
        } else {
            self.get_identifier()?
        };

        // no keyword or literal word has a single character
        let kind = if id.chars().count() == 1 {
            TokenKind::Identifier
        } else if is_keyword(&id) {
            TokenKind::Keyword
        } else if id == "null" {
            TokenKind::NullLiteral
        } else if id == "true" || id == "false" {
            TokenKind::BooleanLiteral
        } else {
            TokenKind::Identifier
        };

        Ok(Token::new(kind, TokenValue::Text(id), start, self.index))
    }

    // ============================================================
    // Punctuators
    // ============================================================

    fn punctuator(&mut self, start: usize, len: usize) -> Token {
        self.index = start + len;
        Token::new(
            TokenKind::Punctuator,
            TokenValue::Text(self.source[start..self.index].to_string()),
            start,
            self.index,
        )
    }

    fn scan_punctuator(&mut self) -> Result<Token, LexError> {
        let start = self.index;
        let bytes = &self.source.as_bytes()[start..];
        let Some(&c1) = bytes.first() else {
            return Err(self.illegal());
        };
        let c2 = bytes.get(1).copied();

        if matches!(
            c1,
            b'.' | b'(' | b')' | b';' | b',' | b'{' | b'}' | b'[' | b']' | b':' | b'?' | b'~'
        ) {
            return Ok(self.punctuator(start, 1));
        }

        // '=' suffix marks an assignment or comparison operator
        if c2 == Some(b'=') {
            match c1 {
                b'+' | b'-' | b'/' | b'<' | b'>' | b'^' | b'|' | b'%' | b'&' | b'*' => {
                    return Ok(self.punctuator(start, 2));
                }
                b'!' | b'=' => {
                    // !== and ===
                    let len = if bytes.get(2) == Some(&b'=') { 3 } else { 2 };
                    return Ok(self.punctuator(start, len));
                }
                _ => {}
            }
        }

        if bytes.starts_with(b">>>=") {
            return Ok(self.punctuator(start, 4));
        }

        if bytes.starts_with(b">>>") || bytes.starts_with(b"<<=") || bytes.starts_with(b">>=") {
            return Ok(self.punctuator(start, 3));
        }

        if (c2 == Some(c1) && b"+-<>&|".contains(&c1)) || bytes.starts_with(b"=>") {
            return Ok(self.punctuator(start, 2));
        }

        if b"<>=!+-*%&|^/".contains(&c1) {
            return Ok(self.punctuator(start, 1));
        }

        Err(self.illegal())
    }

    // ============================================================
    // Numbers
    // ============================================================

    fn followed_by_identifier_start(&self) -> bool {
        matches!(self.peek(), Some(c) if is_identifier_start(c))
    }

    fn scan_hex_literal(&mut self, start: usize) -> Result<Token, LexError> {
        let mut value = 0f64;
        let mut digits = 0usize;
        while let Some(digit) = self.peek().and_then(|c| c.to_digit(16)) {
            self.bump();
            value = value * 16.0 + f64::from(digit);
            digits += 1;
        }

        if digits == 0 || self.followed_by_identifier_start() {
            return Err(self.illegal());
        }

        Ok(Token::new(
            TokenKind::NumericLiteral,
            TokenValue::Number(value),
            start,
            self.index,
        ))
    }

    fn scan_octal_literal(&mut self, start: usize) -> Result<Token, LexError> {
        let mut value = 0f64;
        while let Some(ch) = self.peek().filter(|c| is_octal_digit(*c)) {
            self.bump();
            value = value * 8.0 + f64::from(ch as u8 - b'0');
        }

        if matches!(self.peek(), Some(c) if is_identifier_start(c) || c.is_ascii_digit()) {
            return Err(self.illegal());
        }

        let mut token = Token::new(
            TokenKind::NumericLiteral,
            TokenValue::Number(value),
            start,
            self.index,
        );
        token.octal = true;
        Ok(token)
    }

    fn skip_decimal_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn scan_numeric(&mut self) -> Result<Token, LexError> {
        let start = self.index;
        let mut ch = self.peek();

        if ch != Some('.') {
            let first = self.bump();
            ch = self.peek();

            if first == Some('0') {
                if matches!(ch, Some('x') | Some('X')) {
                    self.bump();
                    return self.scan_hex_literal(start);
                }
                if matches!(ch, Some(c) if is_octal_digit(c)) {
                    return self.scan_octal_literal(start);
                }
                // a decimal number starting with '0' such as '09' is illegal
                if matches!(ch, Some(c) if c.is_ascii_digit()) {
                    return Err(self.illegal());
                }
            }

            self.skip_decimal_digits();
            ch = self.peek();
        }

        if ch == Some('.') {
            self.bump();
            self.skip_decimal_digits();
            ch = self.peek();
        }

        if matches!(ch, Some('e') | Some('E')) {
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.skip_decimal_digits();
            } else {
                return Err(self.illegal());
            }
        }

        if self.followed_by_identifier_start() {
            return Err(self.illegal());
        }

        let value = parse_decimal(&self.source[start..self.index]);
        Ok(Token::new(
            TokenKind::NumericLiteral,
            TokenValue::Number(value),
            start,
            self.index,
        ))
    }

    // ============================================================
    // Strings
    // ============================================================

    fn scan_string(&mut self) -> Result<Token, LexError> {
        let start = self.index;
        let Some(quote) = self.bump() else {
            return Err(self.illegal());
        };

        // collected as UTF-16 so escaped surrogate pairs combine
        let mut units: Vec<u16> = Vec::new();
        let mut octal = false;
        let mut terminated = false;

        while let Some(ch) = self.bump() {
            if ch == quote {
                terminated = true;
                break;
            }

            if ch == '\\' {
                let Some(escaped) = self.bump() else {
                    break;
                };

                if is_line_terminator(escaped) {
                    // line continuation
                    if escaped == '\r' && self.peek() == Some('\n') {
                        self.bump();
                    }
                    continue;
                }

                match escaped {
                    'u' | 'x' => {
                        let code = if self.peek() == Some('{') {
                            self.bump();
                            self.scan_code_point_escape()?
                        } else {
                            self.scan_hex_escape(if escaped == 'u' { 4 } else { 2 })?
                        };
                        push_code_point(&mut units, code);
                    }
                    'n' => units.push(u16::from(b'\n')),
                    'r' => units.push(u16::from(b'\r')),
                    't' => units.push(u16::from(b'\t')),
                    'b' => units.push(0x08),
                    'f' => units.push(0x0C),
                    'v' => units.push(0x0B),
                    c if is_octal_digit(c) => {
                        let mut code = u32::from(c as u8 - b'0');

                        // \0 alone is not an octal escape
                        if code != 0 {
                            octal = true;
                        }

                        if let Some(d) = self.peek().filter(|d| is_octal_digit(*d)) {
                            octal = true;
                            self.bump();
                            code = code * 8 + u32::from(d as u8 - b'0');

                            // three digits only when the escape starts with 0-3
                            if "0123".contains(c) {
                                if let Some(d) = self.peek().filter(|d| is_octal_digit(*d)) {
                                    self.bump();
                                    code = code * 8 + u32::from(d as u8 - b'0');
                                }
                            }
                        }
                        push_code_point(&mut units, code);
                    }
                    c => push_char(&mut units, c),
                }
            } else if is_line_terminator(ch) {
                break;
            } else {
                push_char(&mut units, ch);
            }
        }

        if !terminated {
            return Err(LexError::UnterminatedString {
                span: range_span(self.source, start, self.index),
                quote,
                src: self.source.to_string(),
            });
        }

        let mut token = Token::new(
            TokenKind::StringLiteral,
            TokenValue::Text(String::from_utf16_lossy(&units)),
            start,
            self.index,
        );
        token.octal = octal;
        Ok(token)
    }

    // ============================================================
    // Regex validation
    // ============================================================

    fn test_regex(&self, pattern: &str, flags: &str, start: usize) -> Result<(), LexError> {
        let invalid = |reason: String| LexError::InvalidRegex {
            span: range_span(self.source, start, self.index),
            reason,
            src: self.source.to_string(),
        };

        let mut tmp = pattern.to_string();

        if flags.contains('u') {
            // Code point escapes and astral characters are only valid with
            // the u flag; replace each with a single ASCII symbol before
            // validating.
            let escapes = code_point_escape_regex();
            for caps in escapes.captures_iter(pattern) {
                let in_range = u32::from_str_radix(&caps[1], 16)
                    .map(|code| code <= 0x10FFFF)
                    .unwrap_or(false);
                if !in_range {
                    return Err(invalid(format!(
                        "code point escape {} is out of range",
                        &caps[0]
                    )));
                }
            }
            tmp = escapes
                .replace_all(&tmp, "x")
                .chars()
                .map(|c| if u32::from(c) > 0xFFFF { 'x' } else { c })
                .collect();
        }

        hybrid_regex::validate(&tmp, flags.contains('u')).map_err(invalid)
    }
}

fn code_point_escape_regex() -> &'static regex::Regex {
    static ESCAPES: OnceLock<regex::Regex> = OnceLock::new();
    ESCAPES.get_or_init(|| {
        regex::Regex::new(r"\\u\{([0-9a-fA-F]+)\}").expect("code point escape pattern is valid")
    })
}

fn push_char(units: &mut Vec<u16>, c: char) {
    let mut buf = [0u16; 2];
    units.extend_from_slice(c.encode_utf16(&mut buf));
}

fn push_code_point(units: &mut Vec<u16>, code: u32) {
    match char::from_u32(code) {
        Some(c) => push_char(units, c),
        // a surrogate half; it may pair up with the next escape
        None => units.push(code as u16),
    }
}

/// Parse the text of a decimal literal, which may omit digits on either side
/// of the decimal point
fn parse_decimal(text: &str) -> f64 {
    let mut normalized = String::with_capacity(text.len() + 2);
    if text.starts_with('.') {
        normalized.push('0');
    }
    for (i, c) in text.char_indices() {
        normalized.push(c);
        if c == '.' {
            let next = text[i + 1..].chars().next();
            if !matches!(next, Some(d) if d.is_ascii_digit()) {
                normalized.push('0');
            }
        }
    }
    normalized.parse().unwrap_or(f64::NAN)
}
