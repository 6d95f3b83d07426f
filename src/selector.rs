//! Event selector parsing.
//!
//! A selector such as `[rect:mousedown, view:mouseup] > view:mousemove{20}`
//! is split into [`Stream`] descriptors. Filter predicates inside `[...]` are
//! kept as raw text; compiling them is left to the caller.

use std::collections::HashSet;

use slog::{debug, o, Logger};
use thiserror::Error;

use crate::ast::MAX_DEPTH;
use crate::parser::error::{range_span, ParseError};

pub const DEFAULT_SOURCE: &str = "view";

pub const DEFAULT_MARKS: &[&str] = &[
    "*", "arc", "area", "group", "image", "line", "path", "rect", "rule", "shape", "symbol",
    "text", "trail",
];

/// What was wrong with a selector fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectorFault {
    #[error("Empty event selector")]
    Empty,
    #[error("Empty event stream")]
    EmptyStream,
    #[error("Empty between selector")]
    EmptyBetween,
    #[error("Between selector must have two elements")]
    BetweenArity,
    #[error("Expected '>' after between selector")]
    ExpectedGt,
    #[error("Nested between selectors are not supported")]
    NestedBetween,
    #[error("Invalid throttle specification")]
    InvalidThrottle,
    #[error("Unmatched right brace")]
    UnmatchedRightBrace,
    #[error("Unmatched left bracket")]
    UnmatchedLeftBracket,
    #[error("Expected left bracket")]
    ExpectedLeftBracket,
    #[error("Invalid event selector")]
    InvalidSelector,
    #[error("Between selectors are nested too deeply")]
    TooDeep,
}

impl SelectorFault {
    fn help(self) -> Option<String> {
        match self {
            SelectorFault::InvalidThrottle => Some(
                "Use {throttle} or {throttle,debounce} with plain decimal numbers, \
                 e.g. {100,50}; hexadecimal values and Infinity are not accepted"
                    .to_string(),
            ),
            SelectorFault::NestedBetween => {
                Some("Only the bounds of a between selector may be between selectors".to_string())
            }
            SelectorFault::TooDeep => Some(format!(
                "Between selectors may nest at most {} levels",
                MAX_DEPTH
            )),
            _ => None,
        }
    }
}

/// One event stream described by a selector clause
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Stream {
    pub source: String,
    #[cfg_attr(feature = "json", serde(rename = "type"))]
    pub event_type: String,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub marktype: Option<String>,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub markname: Option<String>,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub filter: Option<Vec<String>>,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "std::ops::Not::not"))]
    pub consume: bool,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub throttle: Option<f64>,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub debounce: Option<f64>,
    /// Start and end streams bounding this one
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    pub between: Option<Box<(Stream, Stream)>>,
}

/// Parse `text` with the given default source and mark types, falling back
/// to [`DEFAULT_SOURCE`] and [`DEFAULT_MARKS`]
pub fn parse_selector(
    text: &str,
    source: Option<&str>,
    marks: Option<&[&str]>,
) -> Result<Vec<Stream>, ParseError> {
    let mut parser = SelectorParser::new();
    if let Some(source) = source {
        parser = parser.source(source);
    }
    if let Some(marks) = marks {
        parser = parser.marks(marks.iter().copied());
    }
    parser.parse(text)
}

/// Reusable selector parser configuration
#[derive(Debug, Clone)]
pub struct SelectorParser {
    source: String,
    marks: HashSet<String>,
    logger: Logger,
}

impl Default for SelectorParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorParser {
    pub fn new() -> Self {
        SelectorParser {
            source: DEFAULT_SOURCE.to_string(),
            marks: DEFAULT_MARKS.iter().map(|m| m.to_string()).collect(),
            logger: Logger::root(slog::Discard, o!()),
        }
    }

    /// Source assigned to streams that do not name one
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Names recognised as mark types in `marktype:event`
    pub fn marks<I, S>(mut self, marks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.marks = marks.into_iter().map(Into::into).collect();
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn parse(&self, text: &str) -> Result<Vec<Stream>, ParseError> {
        let session = Session { full: text, config: self };
        let clauses = session.parse_merge(text.trim())?;
        let streams = clauses
            .into_iter()
            .map(|clause| session.parse_clause(clause, 0))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(self.logger, "parsed event selector"; "selector" => text, "streams" => streams.len());
        Ok(streams)
    }
}

/// Index of the first `end` at nesting depth zero at or after `from`, or the
/// length of `s`. Every `push` byte opens a level and every `pop` byte closes
/// one.
fn find(s: &str, from: usize, end: u8, push: &[u8], pop: &[u8]) -> usize {
    let mut depth = 0i32;
    for (i, &c) in s.as_bytes().iter().enumerate().skip(from) {
        if depth == 0 && c == end {
            return i;
        } else if pop.contains(&c) {
            depth -= 1;
        } else if push.contains(&c) {
            depth += 1;
        }
    }
    s.len()
}

fn parse_throttle(s: &str) -> Option<(f64, f64)> {
    if s.is_empty() {
        return None;
    }

    let values = s
        .split(',')
        .map(|v| match v.trim() {
            "" => Some(0.0),
            v => v.parse::<f64>().ok().filter(|x| x.is_finite()),
        })
        .collect::<Option<Vec<_>>>()?;

    match values.as_slice() {
        [throttle] => Some((*throttle, 0.0)),
        [throttle, debounce] => Some((*throttle, *debounce)),
        _ => None,
    }
}

/// Parse state for one call; every fragment is a subslice of `full`
struct Session<'a> {
    full: &'a str,
    config: &'a SelectorParser,
}

impl<'a> Session<'a> {
    fn fault(&self, kind: SelectorFault, fragment: &str) -> ParseError {
        let start = (fragment.as_ptr() as usize)
            .checked_sub(self.full.as_ptr() as usize)
            .filter(|offset| *offset <= self.full.len())
            .unwrap_or(0);
        let end = (start + fragment.len()).min(self.full.len());

        ParseError::Selector {
            kind,
            fragment: fragment.to_string(),
            span: range_span(self.full, start, end),
            help: kind.help(),
            src: self.full.to_string(),
        }
    }

    /// Split on top-level commas into trimmed clauses
    fn parse_merge(&self, s: &'a str) -> Result<Vec<&'a str>, ParseError> {
        let mut output = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < s.len() {
            i = find(s, i, b',', b"[{", b"]}");
            output.push(s[start..i].trim());
            i += 1;
            start = i;
        }

        if output.is_empty() {
            return Err(self.fault(SelectorFault::Empty, s));
        }
        Ok(output)
    }

    /// `depth` counts the between selectors this clause is a bound of
    fn parse_clause(&self, s: &'a str, depth: usize) -> Result<Stream, ParseError> {
        if s.starts_with('[') {
            if depth >= MAX_DEPTH {
                return Err(self.fault(SelectorFault::TooDeep, s));
            }
            self.parse_between(s, depth)
        } else {
            self.parse_stream(s)
        }
    }

    fn parse_between(&self, s: &'a str, depth: usize) -> Result<Stream, ParseError> {
        let i = find(s, 1, b']', b"[", b"]");
        if i == s.len() {
            return Err(self.fault(SelectorFault::EmptyBetween, s));
        }

        let bounds = self.parse_merge(&s[1..i])?;
        let &[start, end] = bounds.as_slice() else {
            return Err(self.fault(SelectorFault::BetweenArity, s));
        };

        let rest = s[i + 1..].trim();
        let Some(target) = rest.strip_prefix('>') else {
            return Err(self.fault(SelectorFault::ExpectedGt, rest));
        };

        let start = self.parse_clause(start, depth + 1)?;
        let end = self.parse_clause(end, depth + 1)?;

        let mut stream = self.parse_clause(target.trim(), depth + 1)?;
        if stream.between.is_some() {
            return Err(self.fault(SelectorFault::NestedBetween, s));
        }
        stream.between = Some(Box::new((start, end)));

        Ok(stream)
    }

    fn parse_stream(&self, clause: &'a str) -> Result<Stream, ParseError> {
        let mut s = clause;
        let mut throttle = (0.0, 0.0);

        // trailing {throttle} or {throttle,debounce}
        if let Some(body) = s.strip_suffix('}') {
            let Some(open) = body.rfind('{') else {
                return Err(self.fault(SelectorFault::UnmatchedRightBrace, s));
            };
            throttle = parse_throttle(&body[open + 1..])
                .ok_or_else(|| self.fault(SelectorFault::InvalidThrottle, s))?;
            s = body[..open].trim();
        }

        if s.is_empty() {
            return Err(self.fault(SelectorFault::EmptyStream, clause));
        }

        let n = s.len();
        let bytes = s.as_bytes();
        let has_markname = s.starts_with('@');
        let mut parts = Vec::with_capacity(2);
        let mut start = 0;
        let mut i = usize::from(has_markname);

        // only a colon ahead of any filter splits off the source
        let first_bracket = s.find('[').unwrap_or(n);
        if i <= first_bracket {
            if let Some(colon) = s[i..first_bracket].find(':') {
                let colon = colon + i;
                parts.push(s[start..colon].trim());
                start = colon + 1;
                i = colon + 1;
            }
        }

        let mut filter = None;
        i = find(s, i, b'[', b"", b"");
        if i == n {
            parts.push(s[start..].trim());
        } else {
            parts.push(s[start..i].trim());
            filter = Some(Vec::new());
            i += 1;
            start = i;
            if start == n {
                return Err(self.fault(SelectorFault::UnmatchedLeftBracket, s));
            }
        }

        while i < n {
            i = find(s, i, b']', b"", b"");
            if i == n {
                return Err(self.fault(SelectorFault::UnmatchedLeftBracket, s));
            }
            if let Some(filter) = filter.as_mut() {
                filter.push(s[start..i].trim().to_string());
            }
            if i < n - 1 {
                i += 1;
                if bytes[i] != b'[' {
                    return Err(self.fault(SelectorFault::ExpectedLeftBracket, s));
                }
                if i + 1 == n {
                    return Err(self.fault(SelectorFault::UnmatchedLeftBracket, s));
                }
            }
            i += 1;
            start = i;
        }

        let last = parts.last().copied().unwrap_or("");
        if last.contains(['[', ']', '{', '}']) {
            return Err(self.fault(SelectorFault::InvalidSelector, s));
        }

        let mut stream = Stream {
            source: self.config.source.clone(),
            ..Stream::default()
        };

        match parts.as_slice() {
            [head, event_type, ..] => {
                stream.event_type = event_type.to_string();
                if has_markname {
                    stream.markname = Some(head.strip_prefix('@').unwrap_or(head).to_string());
                } else if self.config.marks.contains(*head) {
                    stream.marktype = Some(head.to_string());
                } else {
                    stream.source = head.to_string();
                }
            }
            [event_type] => stream.event_type = event_type.to_string(),
            [] => return Err(self.fault(SelectorFault::InvalidSelector, s)),
        }

        if let Some(event_type) = stream.event_type.strip_suffix('!') {
            stream.event_type = event_type.to_string();
            stream.consume = true;
        }

        stream.filter = filter;
        if throttle.0 != 0.0 {
            stream.throttle = Some(throttle.0);
        }
        if throttle.1 != 0.0 {
            stream.debounce = Some(throttle.1);
        }

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_respects_nesting() {
        assert_eq!(find("a[b,c],d", 0, b',', b"[", b"]"), 6);
        assert_eq!(find("abc", 0, b',', b"", b""), 3);
        assert_eq!(find("a,b", 2, b',', b"", b""), 3);
    }

    #[test]
    fn throttle_values() {
        assert_eq!(parse_throttle("100"), Some((100.0, 0.0)));
        assert_eq!(parse_throttle(" 100 , 200 "), Some((100.0, 200.0)));
        assert_eq!(parse_throttle(",50"), Some((0.0, 50.0)));
        assert_eq!(parse_throttle(""), None);
        assert_eq!(parse_throttle("1,2,3"), None);
        assert_eq!(parse_throttle("abc"), None);
        assert_eq!(parse_throttle("NaN"), None);
        assert_eq!(parse_throttle("inf"), None);
    }

    #[test]
    fn merge_drops_trailing_comma() {
        let parser = SelectorParser::new();
        let session = Session {
            full: "a, b,",
            config: &parser,
        };
        assert_eq!(session.parse_merge("a, b,").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn fault_span_points_at_fragment() {
        let err = parse_selector("click, rect:mousedown}", None, None).unwrap_err();
        match err {
            ParseError::Selector { kind, fragment, .. } => {
                assert_eq!(kind, SelectorFault::UnmatchedRightBrace);
                assert_eq!(fragment, "rect:mousedown}");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            parse_selector("click, rect:mousedown}", None, None)
                .unwrap_err()
                .offset(),
            7
        );
    }
}
