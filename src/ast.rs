//! Abstract syntax tree of the expression language.
//!
//! Nodes are built once by the parser and never mutated. Every child is owned
//! by exactly one parent.

use std::fmt;

use recursion::{Collapsible, CollapsibleExt, MappableFrame, PartiallyApplied};

/// Deepest tree the parser builds and the code generator accepts. Parser
/// recursion through nested sub-expressions is capped at the same value.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Regex { pattern: String, flags: String },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Literal {
    pub value: LiteralValue,
    /// Exact source text of the literal, used verbatim by code generation
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum BinaryOperator {
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
    Instanceof,
    Shl,
    Shr,
    UShr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOperator {
    pub fn parse(s: &str) -> Option<Self> {
        use BinaryOperator::*;
        Some(match s {
            "|" => BitOr,
            "^" => BitXor,
            "&" => BitAnd,
            "==" => Eq,
            "!=" => NotEq,
            "===" => StrictEq,
            "!==" => StrictNotEq,
            "<" => Lt,
            ">" => Gt,
            "<=" => LtEq,
            ">=" => GtEq,
            "in" => In,
            "instanceof" => Instanceof,
            "<<" => Shl,
            ">>" => Shr,
            ">>>" => UShr,
            "+" => Add,
            "-" => Sub,
            "*" => Mul,
            "/" => Div,
            "%" => Rem,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        use BinaryOperator::*;
        match self {
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Eq => "==",
            NotEq => "!=",
            StrictEq => "===",
            StrictNotEq => "!==",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            In => "in",
            Instanceof => "instanceof",
            Shl => "<<",
            Shr => ">>",
            UShr => ">>>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
        }
    }

    /// `in` and `instanceof` need surrounding whitespace when emitted
    pub fn is_word(&self) -> bool {
        matches!(self, BinaryOperator::In | BinaryOperator::Instanceof)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum LogicalOperator {
    Or,
    And,
}

impl LogicalOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "||" => Some(LogicalOperator::Or),
            "&&" => Some(LogicalOperator::And),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::Or => "||",
            LogicalOperator::And => "&&",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum UnaryOperator {
    Plus,
    Minus,
    BitNot,
    Not,
}

impl UnaryOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(UnaryOperator::Plus),
            "-" => Some(UnaryOperator::Minus),
            "~" => Some(UnaryOperator::BitNot),
            "!" => Some(UnaryOperator::Not),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Not => "!",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    /// Elements; `None` marks an elided hole such as the middle of `[1,,2]`
    Array(Vec<Option<Expr>>),
    /// Properties; every element is an [`Expr::Property`]
    Object(Vec<Expr>),
    Property {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOperator,
        argument: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Already generated target code, emitted verbatim
    RawCode(String),
}

impl Expr {
    pub fn literal(value: LiteralValue, raw: impl Into<String>) -> Self {
        Expr::Literal(Literal {
            value,
            raw: raw.into(),
        })
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn array(elements: Vec<Option<Expr>>) -> Self {
        Expr::Array(elements)
    }

    pub fn object(properties: Vec<Expr>) -> Self {
        debug_assert!(properties
            .iter()
            .all(|p| matches!(p, Expr::Property { .. })));
        Expr::Object(properties)
    }

    pub fn property(key: Expr, value: Expr) -> Self {
        Expr::Property {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn call(callee: Expr, arguments: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            arguments,
        }
    }

    pub fn member(object: Expr, property: Expr, computed: bool) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: Box::new(property),
            computed,
        }
    }

    pub fn binary(operator: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(operator: LogicalOperator, left: Expr, right: Expr) -> Self {
        Expr::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(operator: UnaryOperator, argument: Expr) -> Self {
        Expr::Unary {
            operator,
            argument: Box::new(argument),
        }
    }

    pub fn conditional(test: Expr, consequent: Expr, alternate: Expr) -> Self {
        Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        }
    }

    pub fn raw(code: impl Into<String>) -> Self {
        Expr::RawCode(code.into())
    }

    /// ESTree-style name of the node type, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "Literal",
            Expr::Identifier(_) => "Identifier",
            Expr::Array(_) => "ArrayExpression",
            Expr::Object(_) => "ObjectExpression",
            Expr::Property { .. } => "Property",
            Expr::Call { .. } => "CallExpression",
            Expr::Member { .. } => "MemberExpression",
            Expr::Binary { .. } => "BinaryExpression",
            Expr::Logical { .. } => "LogicalExpression",
            Expr::Unary { .. } => "UnaryExpression",
            Expr::Conditional { .. } => "ConditionalExpression",
            Expr::RawCode(_) => "RawCode",
        }
    }

    /// Direct children in source order. Array holes are skipped.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Identifier(_) | Expr::RawCode(_) => Vec::new(),
            Expr::Array(elements) => elements.iter().flatten().collect(),
            Expr::Object(properties) => properties.iter().collect(),
            Expr::Property { key, value } => vec![key.as_ref(), value.as_ref()],
            Expr::Call { callee, arguments } => {
                let mut out = Vec::with_capacity(arguments.len() + 1);
                out.push(callee.as_ref());
                out.extend(arguments.iter());
                out
            }
            Expr::Member {
                object, property, ..
            } => vec![object.as_ref(), property.as_ref()],
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Expr::Unary { argument, .. } => vec![argument.as_ref()],
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => vec![test.as_ref(), consequent.as_ref(), alternate.as_ref()],
        }
    }

    /// Number of nodes on the longest path from this node to a leaf
    pub fn height(&self) -> usize {
        self.collapse_frames(|frame| 1 + frame.children.into_iter().max().unwrap_or(0))
    }

    /// Pre-order traversal. Returns `true` as soon as `predicate` does,
    /// without visiting the remaining nodes.
    pub fn visit<F>(&self, predicate: &mut F) -> bool
    where
        F: FnMut(&Expr) -> bool,
    {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if predicate(node) {
                return true;
            }
            // leftmost child on top
            pending.extend(node.children().into_iter().rev());
        }
        false
    }
}

/// A single layer of a borrowed [`Expr`], with each child replaced by `X`
pub struct ExprFrame<'a, X> {
    pub node: &'a Expr,
    pub children: Vec<X>,
}

impl<'a> MappableFrame for ExprFrame<'a, PartiallyApplied> {
    type Frame<X> = ExprFrame<'a, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, f: impl FnMut(A) -> B) -> Self::Frame<B> {
        ExprFrame {
            node: input.node,
            children: input.children.into_iter().map(f).collect(),
        }
    }
}

impl<'a> Collapsible for &'a Expr {
    type FrameToken = ExprFrame<'a, PartiallyApplied>;

    fn into_frame(self) -> ExprFrame<'a, Self> {
        ExprFrame {
            node: self,
            children: self.children(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Expr {
        Expr::literal(LiteralValue::Number(n), n.to_string())
    }

    #[test]
    fn leaves_have_no_children() {
        assert!(num(1.0).children().is_empty());
        assert!(Expr::identifier("a").children().is_empty());
        assert!(Expr::raw("x()").children().is_empty());
    }

    #[test]
    fn children_follow_variant_shape() {
        let call = Expr::call(Expr::identifier("f"), vec![num(1.0), num(2.0)]);
        let kinds: Vec<_> = call.children().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["Identifier", "Literal", "Literal"]);

        let array = Expr::array(vec![Some(num(1.0)), None, Some(num(2.0))]);
        assert_eq!(array.children().len(), 2);
    }

    #[test]
    fn visit_is_preorder_and_short_circuits() {
        // (a + b) * c
        let expr = Expr::binary(
            BinaryOperator::Mul,
            Expr::binary(
                BinaryOperator::Add,
                Expr::identifier("a"),
                Expr::identifier("b"),
            ),
            Expr::identifier("c"),
        );

        let mut seen = Vec::new();
        let found = expr.visit(&mut |node| {
            seen.push(node.kind().to_string());
            matches!(node, Expr::Identifier(name) if name == "b")
        });

        assert!(found);
        assert_eq!(
            seen,
            vec![
                "BinaryExpression",
                "BinaryExpression",
                "Identifier",
                "Identifier"
            ]
        );
    }

    #[test]
    fn height_counts_the_longest_path() {
        assert_eq!(num(1.0).height(), 1);

        // a + -(b.c)
        let expr = Expr::binary(
            BinaryOperator::Add,
            Expr::identifier("a"),
            Expr::unary(
                UnaryOperator::Minus,
                Expr::member(Expr::identifier("b"), Expr::identifier("c"), false),
            ),
        );
        assert_eq!(expr.height(), 4);

        let array = Expr::array(vec![None, Some(expr), None]);
        assert_eq!(array.height(), 5);
        assert_eq!(Expr::array(vec![None]).height(), 1);
    }

    #[test]
    fn visit_returns_false_when_nothing_matches() {
        let expr = Expr::unary(UnaryOperator::Not, Expr::identifier("a"));
        let mut count = 0;
        assert!(!expr.visit(&mut |_| {
            count += 1;
            false
        }));
        assert_eq!(count, 2);
    }
}
