//! Recursive-descent parser for the expression language.
//!
//! Binary and logical operators are resolved with an explicit shift/reduce
//! stack driven by [`binary_precedence`]; everything else is plain recursive
//! descent over a single lookahead token. Both the recursion and the height
//! of the resulting tree are capped at [`MAX_DEPTH`].

use std::collections::HashSet;

use super::error::{point_span, range_span, ParseError};
use super::lexer::Lexer;
use super::token::{Token, TokenKind, TokenValue};
use crate::ast::{BinaryOperator, Expr, LiteralValue, LogicalOperator, UnaryOperator, MAX_DEPTH};
use crate::error::Error;

type ParseResult<T> = Result<T, Error>;

/// Keywords that may appear as bare identifiers
const LEGAL_KEYWORDS: &[&str] = &["if", "this"];

/// Binding power of every infix operator; higher binds tighter
const PRECEDENCE: &[(&str, u8)] = &[
    ("||", 1),
    ("&&", 2),
    ("|", 3),
    ("^", 4),
    ("&", 5),
    ("==", 6),
    ("!=", 6),
    ("===", 6),
    ("!==", 6),
    ("<", 7),
    (">", 7),
    ("<=", 7),
    (">=", 7),
    ("instanceof", 7),
    ("in", 7),
    ("<<", 8),
    (">>", 8),
    (">>>", 8),
    ("+", 9),
    ("-", 9),
    ("*", 11),
    ("/", 11),
    ("%", 11),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Infix {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

impl Infix {
    fn build(self, left: Expr, right: Expr) -> Expr {
        match self {
            Infix::Binary(op) => Expr::binary(op, left, right),
            Infix::Logical(op) => Expr::logical(op, left, right),
        }
    }
}

/// A parsed subtree and its height
struct Node {
    expr: Expr,
    height: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Node { expr, height: 1 }
    }
}

/// Infix operator and binding power of `token`, or `None` when the token
/// does not continue a binary expression
fn binary_precedence(token: &Token) -> Option<(Infix, u8)> {
    if !matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword) {
        return None;
    }
    let text = token.text();
    let (_, prec) = PRECEDENCE.iter().find(|(op, _)| *op == text)?;
    let infix = match LogicalOperator::parse(text) {
        Some(op) => Infix::Logical(op),
        None => Infix::Binary(BinaryOperator::parse(text)?),
    };
    Some((infix, *prec))
}

/// Parser state for a single parse call
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    lookahead: Token,
    /// Nested conditional expressions currently being parsed
    depth: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Result<Self, Error> {
        let mut lexer = Lexer::new(source);
        let lookahead = lexer.advance()?;
        Ok(Parser {
            lexer,
            lookahead,
            depth: 0,
        })
    }

    /// Parse `source` as exactly one complete expression
    pub fn parse(source: &'src str) -> Result<Expr, Error> {
        let mut parser = Parser::new(source)?;
        let node = parser.parse_expression()?;

        if parser.lookahead.kind != TokenKind::EndOfInput {
            let token = &parser.lookahead;
            return Err(ParseError::TrailingInput {
                span: range_span(source, token.start, token.end),
                src: source.to_string(),
            }
            .into());
        }

        Ok(node.expr)
    }

    // ============================================================
    // Token plumbing
    // ============================================================

    /// Consume the lookahead token and scan the next one
    fn lex(&mut self) -> ParseResult<Token> {
        let next = self.lexer.advance()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn matches(&self, value: &str) -> bool {
        self.lookahead.is_punctuator(value)
    }

    fn match_keyword(&self, keyword: &str) -> bool {
        self.lookahead.is_keyword(keyword)
    }

    fn expect(&mut self, value: &str) -> ParseResult<()> {
        let token = self.lex()?;
        if !token.is_punctuator(value) {
            return Err(self.unexpected(&token));
        }
        Ok(())
    }

    fn src(&self) -> String {
        self.lexer.source().to_string()
    }

    fn unexpected(&self, token: &Token) -> Error {
        let source = self.lexer.source();
        let span = range_span(source, token.start, token.end);
        let src = self.src();

        match token.kind {
            TokenKind::EndOfInput => ParseError::UnexpectedEnd {
                at: token.start,
                span: point_span(source, token.start),
                src,
            },
            TokenKind::NumericLiteral => ParseError::UnexpectedNumber { span, src },
            TokenKind::StringLiteral => ParseError::UnexpectedString { span, src },
            TokenKind::Identifier => ParseError::UnexpectedIdentifier { span, src },
            TokenKind::Keyword => ParseError::UnexpectedReserved { span, src },
            // booleans, null, punctuators and regexes
            _ => ParseError::UnexpectedToken {
                token: source[token.start..token.end].to_string(),
                span,
                src,
            },
        }
        .into()
    }

    fn disabled(&self, token: &Token, construct: impl Into<String>) -> Error {
        ParseError::Disabled {
            construct: construct.into(),
            span: range_span(self.lexer.source(), token.start, token.end),
            src: self.src(),
        }
        .into()
    }

    fn strict_octal(&self, token: &Token) -> Error {
        ParseError::StrictOctal {
            span: range_span(self.lexer.source(), token.start, token.end),
            src: self.src(),
        }
        .into()
    }

    fn too_deep(&self) -> Error {
        let token = &self.lookahead;
        ParseError::TooDeep {
            limit: MAX_DEPTH,
            span: range_span(self.lexer.source(), token.start, token.end),
            src: self.src(),
        }
        .into()
    }

    /// Node for `expr` whose tallest child has height `below`
    fn node(&self, expr: Expr, below: usize) -> ParseResult<Node> {
        let height = below + 1;
        if height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(Node { expr, height })
    }

    fn finish_literal(&self, token: Token) -> Expr {
        let raw = self.lexer.source()[token.start..token.end].to_string();
        let value = match (token.kind, token.value) {
            (TokenKind::NumericLiteral, TokenValue::Number(n)) => LiteralValue::Number(n),
            (TokenKind::BooleanLiteral, TokenValue::Text(s)) => LiteralValue::Boolean(s == "true"),
            (TokenKind::NullLiteral, _) => LiteralValue::Null,
            (TokenKind::RegularExpression, TokenValue::Regex { pattern, flags }) => {
                LiteralValue::Regex { pattern, flags }
            }
            (_, TokenValue::Text(s)) => LiteralValue::String(s),
            (_, _) => LiteralValue::Null,
        };
        Expr::literal(value, raw)
    }

    // ============================================================
    // Array and object initialisers
    // ============================================================

    fn parse_array_initialiser(&mut self) -> ParseResult<Node> {
        let mut elements = Vec::new();
        let mut below = 0;

        self.expect("[")?;

        while !self.matches("]") {
            if self.matches(",") {
                self.lex()?;
                elements.push(None);
            } else {
                let element = self.parse_conditional_expression()?;
                below = below.max(element.height);
                elements.push(Some(element.expr));

                if !self.matches("]") {
                    self.expect(",")?;
                }
            }
        }

        self.lex()?;

        self.node(Expr::array(elements), below)
    }

    fn parse_object_property_key(&mut self) -> ParseResult<Expr> {
        let token = self.lex()?;

        if matches!(
            token.kind,
            TokenKind::StringLiteral | TokenKind::NumericLiteral
        ) {
            if token.octal {
                return Err(self.strict_octal(&token));
            }
            return Ok(self.finish_literal(token));
        }

        Ok(Expr::identifier(token.text()))
    }

    fn parse_object_property(&mut self) -> ParseResult<Node> {
        if matches!(
            self.lookahead.kind,
            TokenKind::EndOfInput | TokenKind::Punctuator
        ) {
            return Err(self.unexpected(&self.lookahead));
        }

        let key = self.parse_object_property_key()?;
        self.expect(":")?;
        let value = self.parse_conditional_expression()?;
        self.node(Expr::property(key, value.expr), value.height)
    }

    fn parse_object_initialiser(&mut self) -> ParseResult<Node> {
        let mut properties = Vec::new();
        let mut seen = HashSet::new();
        let mut below = 0;

        self.expect("{")?;

        while !self.matches("}") {
            let (key_start, key_end) = (self.lookahead.start, self.lookahead.end);
            let property = self.parse_object_property()?;

            let name = match &property.expr {
                Expr::Property { key, .. } => property_key_name(key),
                _ => String::new(),
            };

            if !seen.insert(name.clone()) {
                return Err(ParseError::DuplicateProperty {
                    key: name,
                    span: range_span(self.lexer.source(), key_start, key_end),
                    src: self.src(),
                }
                .into());
            }

            below = below.max(property.height);
            properties.push(property.expr);

            if !self.matches("}") {
                self.expect(",")?;
            }
        }

        self.expect("}")?;

        self.node(Expr::object(properties), below)
    }

    // ============================================================
    // Primary expressions
    // ============================================================

    fn parse_group_expression(&mut self) -> ParseResult<Node> {
        self.expect("(")?;
        let expr = self.parse_expression()?;
        self.expect(")")?;
        Ok(expr)
    }

    fn parse_regex_literal(&mut self) -> ParseResult<Node> {
        // '/' was scanned as a punctuator; re-scan it as a regex literal
        self.lexer.seek(self.lookahead.start);
        let token = self.lexer.scan_regex()?;
        self.lookahead = self.lexer.advance()?;
        Ok(Node::leaf(self.finish_literal(token)))
    }

    fn parse_primary_expression(&mut self) -> ParseResult<Node> {
        if self.matches("(") {
            return self.parse_group_expression();
        }

        if self.matches("[") {
            return self.parse_array_initialiser();
        }

        if self.matches("{") {
            return self.parse_object_initialiser();
        }

        match self.lookahead.kind {
            TokenKind::Identifier => Ok(Node::leaf(Expr::identifier(self.lex()?.text()))),
            TokenKind::Keyword if LEGAL_KEYWORDS.contains(&self.lookahead.text()) => {
                Ok(Node::leaf(Expr::identifier(self.lex()?.text())))
            }
            TokenKind::Keyword => Err(self.disabled(
                &self.lookahead,
                format!("reserved word '{}'", self.lookahead.text()),
            )),
            TokenKind::StringLiteral | TokenKind::NumericLiteral => {
                if self.lookahead.octal {
                    return Err(self.strict_octal(&self.lookahead));
                }
                let token = self.lex()?;
                Ok(Node::leaf(self.finish_literal(token)))
            }
            TokenKind::BooleanLiteral | TokenKind::NullLiteral => {
                let token = self.lex()?;
                Ok(Node::leaf(self.finish_literal(token)))
            }
            _ if self.matches("/") || self.matches("/=") => self.parse_regex_literal(),
            _ => {
                let token = self.lex()?;
                Err(self.unexpected(&token))
            }
        }
    }

    // ============================================================
    // Left-hand-side expressions
    // ============================================================

    /// Arguments and the height of the tallest one
    fn parse_arguments(&mut self) -> ParseResult<(Vec<Expr>, usize)> {
        let mut args = Vec::new();
        let mut below = 0;

        self.expect("(")?;

        if !self.matches(")") {
            loop {
                let arg = self.parse_conditional_expression()?;
                below = below.max(arg.height);
                args.push(arg.expr);
                if self.matches(")") {
                    break;
                }
                self.expect(",")?;
            }
        }

        self.expect(")")?;

        Ok((args, below))
    }

    fn parse_non_computed_property(&mut self) -> ParseResult<Expr> {
        let token = self.lex()?;

        if !token.is_identifier_name() {
            return Err(self.unexpected(&token));
        }

        Ok(Expr::identifier(token.text()))
    }

    fn parse_computed_member(&mut self) -> ParseResult<Node> {
        self.expect("[")?;
        let expr = self.parse_expression()?;
        self.expect("]")?;
        Ok(expr)
    }

    fn parse_left_hand_side_expression_allow_call(&mut self) -> ParseResult<Node> {
        let mut node = self.parse_primary_expression()?;

        loop {
            node = if self.matches(".") {
                self.expect(".")?;
                let property = self.parse_non_computed_property()?;
                self.node(Expr::member(node.expr, property, false), node.height)?
            } else if self.matches("(") {
                let (args, below) = self.parse_arguments()?;
                self.node(Expr::call(node.expr, args), node.height.max(below))?
            } else if self.matches("[") {
                let property = self.parse_computed_member()?;
                let below = node.height.max(property.height);
                self.node(Expr::member(node.expr, property.expr, true), below)?
            } else {
                break;
            };
        }

        Ok(node)
    }

    fn parse_postfix_expression(&mut self) -> ParseResult<Node> {
        let node = self.parse_left_hand_side_expression_allow_call()?;

        if self.matches("++") || self.matches("--") {
            return Err(self.disabled(
                &self.lookahead,
                format!("'{}'", self.lookahead.text()),
            ));
        }

        Ok(node)
    }

    // ============================================================
    // Unary, binary and conditional expressions
    // ============================================================

    fn parse_unary_expression(&mut self) -> ParseResult<Node> {
        // prefix operators are collected first so long chains do not recurse
        let mut operators = Vec::new();

        loop {
            if !matches!(
                self.lookahead.kind,
                TokenKind::Punctuator | TokenKind::Keyword
            ) {
                break;
            }

            if self.matches("++") || self.matches("--") {
                return Err(self.disabled(
                    &self.lookahead,
                    format!("'{}'", self.lookahead.text()),
                ));
            }

            if self.match_keyword("delete")
                || self.match_keyword("void")
                || self.match_keyword("typeof")
            {
                return Err(self.disabled(
                    &self.lookahead,
                    format!("'{}'", self.lookahead.text()),
                ));
            }

            match UnaryOperator::parse(self.lookahead.text()) {
                Some(op) if self.lookahead.kind == TokenKind::Punctuator => {
                    if operators.len() >= MAX_DEPTH {
                        return Err(self.too_deep());
                    }
                    self.lex()?;
                    operators.push(op);
                }
                _ => break,
            }
        }

        let mut node = self.parse_postfix_expression()?;
        while let Some(op) = operators.pop() {
            node = self.node(Expr::unary(op, node.expr), node.height)?;
        }
        Ok(node)
    }

    /// Combine two operands of an infix operator
    fn infix(&self, op: Infix, left: Node, right: Node) -> ParseResult<Node> {
        let below = left.height.max(right.height);
        self.node(op.build(left.expr, right.expr), below)
    }

    fn parse_binary_expression(&mut self) -> ParseResult<Node> {
        let mut current = self.parse_unary_expression()?;

        // pending (left operand, operator, precedence) entries
        let mut stack: Vec<(Node, Infix, u8)> = Vec::new();

        while let Some((op, prec)) = binary_precedence(&self.lookahead) {
            // reduce while the pending operator binds at least as tightly
            while let Some((left, pending, top)) = stack.pop() {
                if prec > top {
                    stack.push((left, pending, top));
                    break;
                }
                current = self.infix(pending, left, current)?;
            }

            // shift
            self.lex()?;
            stack.push((current, op, prec));
            current = self.parse_unary_expression()?;
        }

        while let Some((left, pending, _)) = stack.pop() {
            current = self.infix(pending, left, current)?;
        }

        Ok(current)
    }

    fn parse_conditional_expression(&mut self) -> ParseResult<Node> {
        // every nested sub-expression passes through here
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.too_deep());
        }

        let test = self.parse_binary_expression()?;

        let node = if self.matches("?") {
            self.lex()?;
            let consequent = self.parse_conditional_expression()?;
            self.expect(":")?;
            let alternate = self.parse_conditional_expression()?;
            let below = test.height.max(consequent.height).max(alternate.height);
            let expr = Expr::conditional(test.expr, consequent.expr, alternate.expr);
            self.node(expr, below)?
        } else {
            test
        };

        self.depth -= 1;
        Ok(node)
    }

    fn parse_expression(&mut self) -> ParseResult<Node> {
        let node = self.parse_conditional_expression()?;

        // no sequence expressions
        if self.matches(",") {
            return Err(self.disabled(&self.lookahead, "the comma operator"));
        }

        Ok(node)
    }
}

/// Key used for duplicate detection: identifier name or literal value as
/// text
fn property_key_name(key: &Expr) -> String {
    match key {
        Expr::Identifier(name) => name.clone(),
        Expr::Literal(literal) => match &literal.value {
            LiteralValue::String(s) => s.clone(),
            LiteralValue::Number(n) => n.to_string(),
            _ => literal.raw.clone(),
        },
        other => other.kind().to_string(),
    }
}
