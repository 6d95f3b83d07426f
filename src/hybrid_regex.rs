//! Validation of regular-expression literal bodies.
//!
//! A body is accepted when the Rust `regex` engine compiles it, falling back
//! to PCRE2 for lookaround and backreferences. Literals follow the target
//! language's regex dialect rather than either engine's, so group and
//! quantifier forms the target refuses are rejected before compiling, and
//! target-only forms are rewritten into equivalents both engines read.

/// Escaped letters with a meaning of their own outside a class
const ESCAPES: &str = "bBdDsSwWfnrtvcxuk0";
/// Inside a class `\b` is a backspace and `\B` has no meaning
const CLASS_ESCAPES: &str = "bdDsSwWfnrtvcxu0";
/// Property escapes, only recognized under the `u` flag
const UNICODE_ESCAPES: &str = "pP";

/// Check that `pattern` is a valid body, returning the reason when it is
/// not. `unicode` selects the stricter escape rules of the `u` flag.
pub fn validate(pattern: &str, unicode: bool) -> Result<(), String> {
    let translated = translate(pattern, unicode)?;
    if regex::Regex::new(&translated).is_ok() {
        return Ok(());
    }
    pcre2::bytes::RegexBuilder::new()
        .utf(true)
        .build(&translated)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Length of a `{n}`, `{n,}` or `{n,m}` quantifier at the start of `s`
fn brace_quantifier(s: &str) -> Option<usize> {
    let body = s.strip_prefix('{')?;
    let close = body.find('}')?;
    let (min, max) = match body[..close].split_once(',') {
        Some((min, max)) => (min, Some(max)),
        None => (&body[..close], None),
    };
    let digits = |d: &str| d.bytes().all(|b| b.is_ascii_digit());
    if min.is_empty() || !digits(min) || !max.map_or(true, digits) {
        return None;
    }
    Some(close + 2)
}

fn translate(pattern: &str, unicode: bool) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut quantified = false;
    let mut i = 0;

    while let Some(c) = pattern[i..].chars().next() {
        let rest = &pattern[i..];
        let mut len = c.len_utf8();
        let mut quantifier = false;

        match c {
            '\\' => {
                let Some(e) = rest[1..].chars().next() else {
                    return Err("\\ at end of pattern".to_string());
                };
                len += e.len_utf8();

                let property = unicode && UNICODE_ESCAPES.contains(e);
                if property && rest[len..].starts_with('{') {
                    // \p{Name}
                    if let Some(close) = rest[len..].find('}') {
                        len += close + 1;
                    }
                }

                let known = if in_class { CLASS_ESCAPES } else { ESCAPES };
                if !e.is_ascii_alphabetic() || known.contains(e) || property {
                    out.push_str(&rest[..len]);
                } else if unicode {
                    return Err(format!("invalid escape \\{}", e));
                } else {
                    // identity escape
                    out.push(e);
                }
            }

            _ if in_class => {
                in_class = c != ']';
                out.push(c);
            }

            '[' if rest.starts_with("[]") => {
                out.push_str("(?!)");
                len = 2;
            }
            '[' if rest.starts_with("[^]") => {
                out.push_str(r"[\s\S]");
                len = 3;
            }
            '[' => {
                in_class = true;
                out.push(c);
            }

            '(' if rest.starts_with("(?") => {
                let group = &rest[2..];
                let Some(prefix) = [":", "=", "!", "<=", "<!", "<"]
                    .into_iter()
                    .find(|p| group.starts_with(*p))
                else {
                    return Err("invalid group".to_string());
                };
                len = 2 + prefix.len();
                out.push_str(&rest[..len]);
            }

            '*' | '+' | '?' | '{' => {
                let brace = if c == '{' { brace_quantifier(rest) } else { Some(1) };
                match brace {
                    Some(n) => {
                        if quantified {
                            return Err("nothing to repeat".to_string());
                        }
                        len = n;
                        out.push_str(&rest[..len]);
                        if rest[len..].starts_with('?') {
                            out.push('?');
                            len += 1;
                        }
                        quantifier = true;
                    }
                    // a lone brace is a literal
                    None => out.push_str(r"\{"),
                }
            }

            _ => out.push(c),
        }

        quantified = quantifier;
        i += len;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_patterns_and_lookaround_are_valid() {
        assert!(validate("^a+b$", false).is_ok());
        assert!(validate("foo(?=bar)", false).is_ok());
        assert!(validate("(?<!x)y", false).is_ok());
        assert!(validate(r"(a)\1", false).is_ok());
        assert!(validate("(?<year>\\d{4})", false).is_ok());
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(validate("(unclosed", false).is_err());
        assert!(validate("[z-a]", false).is_err());
        assert!(validate("x{2,1}", false).is_err());
    }

    #[test]
    fn empty_classes_are_rewritten() {
        assert_eq!(translate("a[]b", false).unwrap(), "a(?!)b");
        assert_eq!(translate("[^]*", false).unwrap(), r"[\s\S]*");
        assert!(validate("[]", false).is_ok());
        assert!(validate("[^]", false).is_ok());
    }

    #[test]
    fn engine_only_groups_are_rejected() {
        assert_eq!(validate("(?i)a", false), Err("invalid group".to_string()));
        assert!(validate("(?P<n>a)", false).is_err());
        assert!(validate("(?i:a)", false).is_err());
        assert!(validate("(?>a)", false).is_err());
        assert!(validate("(?#note)a", false).is_err());
    }

    #[test]
    fn possessive_quantifiers_are_rejected() {
        assert_eq!(validate("a++", false), Err("nothing to repeat".to_string()));
        assert!(validate("a*+", false).is_err());
        assert!(validate("a{2}+", false).is_err());
        assert!(validate("a+?", false).is_ok());
        assert!(validate("a{2,}?b", false).is_ok());
    }

    #[test]
    fn unknown_letter_escapes_stand_for_the_letter() {
        assert_eq!(translate(r"\Qa.\E", false).unwrap(), "Qa.E");
        assert_eq!(translate(r"[\B\q]", false).unwrap(), "[Bq]");
        assert_eq!(translate(r"\d\.\b", false).unwrap(), r"\d\.\b");
        // no quoting: the parenthesis is still a group opener
        assert!(validate(r"\Q(\E", false).is_err());
        assert!(validate(r"\A", false).is_ok());
    }

    #[test]
    fn unicode_mode_refuses_identity_escapes() {
        assert_eq!(validate(r"\Qa\E", true), Err(r"invalid escape \Q".to_string()));
        assert!(validate(r"\p{L}+", true).is_ok());
        assert!(validate(r"\d\/", true).is_ok());
    }

    #[test]
    fn lone_braces_are_literals() {
        assert_eq!(translate("a{", false).unwrap(), r"a\{");
        assert_eq!(translate("{x}", false).unwrap(), r"\{x}");
        assert!(validate("a{,2}", false).is_ok());
        assert_eq!(brace_quantifier("{3}"), Some(3));
        assert_eq!(brace_quantifier("{1,22}x"), Some(6));
        assert_eq!(brace_quantifier("{,2}"), None);
    }
}
