//! The function table: which calls an expression may make, and the target
//! code each one expands to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;

use super::error::CompileError;
use super::Codegen;
use crate::ast::Expr;

/// Custom expansion of a call, given the session and the unevaluated
/// argument ASTs
pub type Generator =
    Arc<dyn Fn(&mut Codegen<'_>, &[Expr]) -> Result<String, CompileError> + Send + Sync>;

#[derive(Clone)]
pub enum FunctionDef {
    /// Emit `target(arg1,arg2,...)`
    Rename(String),
    Generator(Generator),
}

impl FunctionDef {
    pub fn rename(target: impl Into<String>) -> Self {
        FunctionDef::Rename(target.into())
    }

    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(&mut Codegen<'_>, &[Expr]) -> Result<String, CompileError> + Send + Sync + 'static,
    {
        FunctionDef::Generator(Arc::new(f))
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionDef::Rename(target) => f.debug_tuple("Rename").field(target).finish(),
            FunctionDef::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// How a method call on the first argument is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodMode {
    /// `recv.name`
    Property,
    /// `recv.name()`
    NoArgs,
    /// `recv.name(rest...)`
    Forward,
}

const DATE: &str = "new Date";
const STRING: &str = "String";
const REGEXP: &str = "RegExp";

/// A function whose first argument is the receiver of method `name`,
/// optionally wrapped in `cast(...)` first
pub fn method(name: &str, cast: Option<&str>, mode: MethodMode) -> FunctionDef {
    let name = name.to_string();
    let cast = cast.map(str::to_string);

    FunctionDef::generator(move |codegen, args| {
        let Some((receiver, rest)) = args.split_first() else {
            return Err(CompileError::arity(&name, 1, 0));
        };

        let mut recv = codegen.visit(receiver)?;
        if let Some(cast) = &cast {
            recv = format!("{}({})", cast, recv);
            if cast.starts_with("new ") {
                recv = format!("({})", recv);
            }
        }

        Ok(match mode {
            MethodMode::Property => format!("{}.{}", recv, name),
            MethodMode::NoArgs => format!("{}.{}()", recv, name),
            MethodMode::Forward => {
                let rest = codegen.visit_all(rest)?;
                format!("{}.{}({})", recv, name, rest.iter().join(","))
            }
        })
    })
}

fn exactly<'a>(function: &str, n: usize, args: &'a [Expr]) -> Result<&'a [Expr], CompileError> {
    if args.len() != n {
        return Err(CompileError::arity(function, n, args.len()));
    }
    Ok(args)
}

fn clamp(codegen: &mut Codegen<'_>, args: &[Expr]) -> Result<String, CompileError> {
    let a = codegen.visit_all(exactly("clamp", 3, args)?)?;
    Ok(format!("Math.max({}, Math.min({},{}))", a[1], a[2], a[0]))
}

fn reverse(codegen: &mut Codegen<'_>, args: &[Expr]) -> Result<String, CompileError> {
    let Some(first) = args.first() else {
        return Err(CompileError::arity("reverse", 1, 0));
    };
    Ok(format!("({}).slice().reverse()", codegen.visit(first)?))
}

fn if_then_else(codegen: &mut Codegen<'_>, args: &[Expr]) -> Result<String, CompileError> {
    let a = codegen.visit_all(exactly("if", 3, args)?)?;
    Ok(format!("({}?{}:{})", a[0], a[1], a[2]))
}

const RENAMES: &[(&str, &str)] = &[
    // math
    ("isNaN", "Number.isNaN"),
    ("isFinite", "Number.isFinite"),
    ("abs", "Math.abs"),
    ("acos", "Math.acos"),
    ("asin", "Math.asin"),
    ("atan", "Math.atan"),
    ("atan2", "Math.atan2"),
    ("ceil", "Math.ceil"),
    ("cos", "Math.cos"),
    ("exp", "Math.exp"),
    ("floor", "Math.floor"),
    ("log", "Math.log"),
    ("max", "Math.max"),
    ("min", "Math.min"),
    ("pow", "Math.pow"),
    ("random", "Math.random"),
    ("round", "Math.round"),
    ("sin", "Math.sin"),
    ("sqrt", "Math.sqrt"),
    ("tan", "Math.tan"),
    // date
    ("now", "Date.now"),
    ("utc", "Date.UTC"),
    ("datetime", DATE),
    // string
    ("parseFloat", "parseFloat"),
    ("parseInt", "parseInt"),
    // regexp
    ("regexp", REGEXP),
];

const METHODS: &[(&str, &str, Option<&str>, MethodMode)] = &[
    ("date", "getDate", Some(DATE), MethodMode::NoArgs),
    ("day", "getDay", Some(DATE), MethodMode::NoArgs),
    ("year", "getFullYear", Some(DATE), MethodMode::NoArgs),
    ("month", "getMonth", Some(DATE), MethodMode::NoArgs),
    ("hours", "getHours", Some(DATE), MethodMode::NoArgs),
    ("minutes", "getMinutes", Some(DATE), MethodMode::NoArgs),
    ("seconds", "getSeconds", Some(DATE), MethodMode::NoArgs),
    ("milliseconds", "getMilliseconds", Some(DATE), MethodMode::NoArgs),
    ("time", "getTime", Some(DATE), MethodMode::NoArgs),
    ("timezoneoffset", "getTimezoneOffset", Some(DATE), MethodMode::NoArgs),
    ("utcdate", "getUTCDate", Some(DATE), MethodMode::NoArgs),
    ("utcday", "getUTCDay", Some(DATE), MethodMode::NoArgs),
    ("utcyear", "getUTCFullYear", Some(DATE), MethodMode::NoArgs),
    ("utcmonth", "getUTCMonth", Some(DATE), MethodMode::NoArgs),
    ("utchours", "getUTCHours", Some(DATE), MethodMode::NoArgs),
    ("utcminutes", "getUTCMinutes", Some(DATE), MethodMode::NoArgs),
    ("utcseconds", "getUTCSeconds", Some(DATE), MethodMode::NoArgs),
    ("utcmilliseconds", "getUTCMilliseconds", Some(DATE), MethodMode::NoArgs),
    // sequences
    ("length", "length", None, MethodMode::Property),
    ("join", "join", None, MethodMode::Forward),
    ("indexof", "indexOf", None, MethodMode::Forward),
    ("lastindexof", "lastIndexOf", None, MethodMode::Forward),
    ("slice", "slice", None, MethodMode::Forward),
    // strings
    ("upper", "toUpperCase", Some(STRING), MethodMode::NoArgs),
    ("lower", "toLowerCase", Some(STRING), MethodMode::NoArgs),
    ("substring", "substring", Some(STRING), MethodMode::Forward),
    ("split", "split", Some(STRING), MethodMode::Forward),
    ("replace", "replace", Some(STRING), MethodMode::Forward),
    ("trim", "trim", Some(STRING), MethodMode::NoArgs),
    // regexps
    ("test", "test", Some(REGEXP), MethodMode::Forward),
];

/// The built-in function table
pub fn default_functions() -> HashMap<String, FunctionDef> {
    let mut table: HashMap<String, FunctionDef> = RENAMES
        .iter()
        .map(|(name, target)| (name.to_string(), FunctionDef::rename(*target)))
        .collect();

    for (name, target, cast, mode) in METHODS {
        table.insert(name.to_string(), method(target, *cast, *mode));
    }

    table.insert("clamp".to_string(), FunctionDef::generator(clamp));
    table.insert("reverse".to_string(), FunctionDef::generator(reverse));
    table.insert("if".to_string(), FunctionDef::generator(if_then_else));

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_is_defined_once() {
        let names: Vec<&str> = RENAMES
            .iter()
            .map(|(n, _)| *n)
            .chain(METHODS.iter().map(|(n, ..)| *n))
            .chain(["clamp", "reverse", "if"])
            .collect();
        assert_eq!(names.len(), names.iter().unique().count());
        assert_eq!(default_functions().len(), names.len());
    }

    #[test]
    fn arity_messages() {
        assert_eq!(
            CompileError::arity("clamp", 3, 2).to_string(),
            "Missing arguments to clamp function."
        );
        assert_eq!(
            CompileError::arity("if", 3, 4).to_string(),
            "Too many arguments to if function."
        );
    }
}
