//! Sandboxing code generation.
//!
//! [`CodeGenerator`] turns a parsed [`Expr`] into target-language source
//! text. Free identifiers are routed through a global accessor unless they
//! are whitelisted or constants, blacklisted identifiers are rejected, and
//! only functions from the function table may be called. Every free global
//! and every field read from the field root is reported alongside the code.

pub mod constants;
pub mod error;
pub mod functions;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use itertools::Itertools;
use slog::{debug, o, Logger};

use crate::ast::{Expr, LiteralValue, MAX_DEPTH};
pub use constants::default_constants;
pub use error::CompileError;
pub use functions::{default_functions, method, FunctionDef, Generator, MethodMode};

/// Maps a free identifier to the code that reads it
pub type GlobalAccessor = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub enum GlobalVar {
    /// `name["id"]`
    Named(String),
    Custom(GlobalAccessor),
}

impl GlobalVar {
    fn access(&self, id: &str) -> String {
        match self {
            GlobalVar::Named(name) => format!("{}[\"{}\"]", name, id),
            GlobalVar::Custom(f) => f(id),
        }
    }
}

impl Default for GlobalVar {
    fn default() -> Self {
        GlobalVar::Named("global".to_string())
    }
}

impl fmt::Debug for GlobalVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalVar::Named(name) => f.debug_tuple("Named").field(name).finish(),
            GlobalVar::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Generated code plus the globals and fields it references, each listed
/// once in order of first appearance
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct CompileOutput {
    pub code: String,
    pub globals: Vec<String>,
    pub fields: Vec<String>,
}

/// Immutable code generator configuration. Build one with
/// [`CodeGenerator::builder`] and reuse it for any number of compilations.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
    constants: HashMap<String, String>,
    functions: HashMap<String, FunctionDef>,
    globalvar: GlobalVar,
    fieldvar: Option<String>,
    logger: Logger,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        CodeGenerator::builder().build()
    }
}

impl CodeGenerator {
    pub fn builder() -> CodeGeneratorBuilder {
        CodeGeneratorBuilder::default()
    }

    pub fn functions(&self) -> &HashMap<String, FunctionDef> {
        &self.functions
    }

    pub fn constants(&self) -> &HashMap<String, String> {
        &self.constants
    }

    pub fn compile(&self, expr: &Expr) -> Result<CompileOutput, CompileError> {
        // emission recurses once per level
        let height = expr.height();
        if height > MAX_DEPTH {
            return Err(CompileError::TooDeep {
                height,
                limit: MAX_DEPTH,
            });
        }

        let mut session = Codegen::new(self);
        let code = session.visit(expr)?;

        let output = CompileOutput {
            code,
            globals: session.globals.into_iter().collect(),
            fields: session.fields.into_iter().collect(),
        };

        debug!(self.logger, "compiled expression";
            "node" => expr.kind(),
            "code_len" => output.code.len(),
            "globals" => ?output.globals,
            "fields" => ?output.fields);

        Ok(output)
    }
}

pub struct CodeGeneratorBuilder {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
    constants: HashMap<String, String>,
    functions: HashMap<String, FunctionDef>,
    defaults: bool,
    globalvar: GlobalVar,
    fieldvar: Option<String>,
    logger: Logger,
}

impl Default for CodeGeneratorBuilder {
    fn default() -> Self {
        CodeGeneratorBuilder {
            whitelist: HashSet::new(),
            blacklist: HashSet::new(),
            constants: HashMap::new(),
            functions: HashMap::new(),
            defaults: true,
            globalvar: GlobalVar::default(),
            fieldvar: None,
            logger: Logger::root(slog::Discard, o!()),
        }
    }
}

impl CodeGeneratorBuilder {
    /// Identifiers emitted verbatim instead of through the global accessor
    pub fn whitelist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist.extend(names.into_iter().map(Into::into));
        self
    }

    /// Identifiers that fail compilation when referenced
    pub fn blacklist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn constant(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.constants.insert(name.into(), code.into());
        self
    }

    pub fn function(mut self, name: impl Into<String>, def: FunctionDef) -> Self {
        self.functions.insert(name.into(), def);
        self
    }

    /// Leave out the built-in constants and functions; only entries added to
    /// this builder are available
    pub fn no_defaults(mut self) -> Self {
        self.defaults = false;
        self
    }

    pub fn globalvar(mut self, globalvar: GlobalVar) -> Self {
        self.globalvar = globalvar;
        self
    }

    pub fn global_accessor<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.globalvar(GlobalVar::Custom(Arc::new(f)))
    }

    /// Root whose member reads are reported as fields
    pub fn fieldvar(mut self, name: impl Into<String>) -> Self {
        self.fieldvar = Some(name.into());
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> CodeGenerator {
        let (mut constants, mut functions) = if self.defaults {
            (default_constants(), default_functions())
        } else {
            (HashMap::new(), HashMap::new())
        };
        constants.extend(self.constants);
        functions.extend(self.functions);

        CodeGenerator {
            whitelist: self.whitelist,
            blacklist: self.blacklist,
            constants,
            functions,
            globalvar: self.globalvar,
            fieldvar: self.fieldvar,
            logger: self.logger,
        }
    }
}

/// State of one compilation. Function generators receive it to emit their
/// arguments.
pub struct Codegen<'g> {
    generator: &'g CodeGenerator,
    globals: IndexSet<String>,
    fields: IndexSet<String>,
    /// Nonzero while emitting a non-computed member name or a property key
    member_depth: usize,
}

impl<'g> Codegen<'g> {
    fn new(generator: &'g CodeGenerator) -> Self {
        Codegen {
            generator,
            globals: IndexSet::new(),
            fields: IndexSet::new(),
            member_depth: 0,
        }
    }

    pub fn visit_all(&mut self, exprs: &[Expr]) -> Result<Vec<String>, CompileError> {
        exprs.iter().map(|e| self.visit(e)).collect()
    }

    /// Emit a name that is not a variable reference
    fn visit_as_name(&mut self, expr: &Expr) -> Result<String, CompileError> {
        self.member_depth += 1;
        let code = self.visit(expr);
        self.member_depth -= 1;
        code
    }

    pub fn visit(&mut self, expr: &Expr) -> Result<String, CompileError> {
        let generator = self.generator;

        match expr {
            Expr::Literal(literal) => Ok(match &literal.value {
                LiteralValue::Regex { pattern, flags } if pattern.is_empty() => {
                    format!("/(?:)/{}", flags)
                }
                _ => literal.raw.clone(),
            }),

            Expr::Identifier(id) => {
                if self.member_depth > 0 {
                    Ok(id.clone())
                } else if generator.blacklist.contains(id) {
                    Err(CompileError::IllegalIdentifier { name: id.clone() })
                } else if let Some(code) = generator.constants.get(id) {
                    Ok(code.clone())
                } else if generator.whitelist.contains(id) {
                    Ok(id.clone())
                } else {
                    self.globals.insert(id.clone());
                    Ok(generator.globalvar.access(id))
                }
            }

            Expr::Member {
                object,
                property,
                computed,
            } => {
                let o = self.visit(object)?;
                let p = if *computed {
                    self.visit(property)?
                } else {
                    self.visit_as_name(property)?
                };

                if generator.fieldvar.as_deref() == Some(o.as_str()) {
                    self.fields.insert(strip_quotes(&p).to_string());
                }

                Ok(if *computed {
                    format!("{}[{}]", o, p)
                } else {
                    format!("{}.{}", o, p)
                })
            }

            Expr::Call { callee, arguments } => {
                let Expr::Identifier(name) = callee.as_ref() else {
                    return Err(CompileError::IllegalCallee {
                        kind: callee.kind().to_string(),
                    });
                };

                match generator.functions.get(name) {
                    Some(FunctionDef::Rename(target)) => {
                        let args = self.visit_all(arguments)?;
                        Ok(format!("{}({})", target, args.iter().join(",")))
                    }
                    Some(FunctionDef::Generator(f)) => f(self, arguments),
                    None => Err(CompileError::UnrecognizedFunction { name: name.clone() }),
                }
            }

            Expr::Array(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    out.push(match element {
                        Some(e) => self.visit(e)?,
                        None => String::new(),
                    });
                }
                Ok(format!("[{}]", out.iter().join(",")))
            }

            Expr::Object(properties) => {
                let props = self.visit_all(properties)?;
                Ok(format!("{{{}}}", props.iter().join(",")))
            }

            Expr::Property { key, value } => {
                let k = self.visit_as_name(key)?;
                let v = self.visit(value)?;
                Ok(format!("{}:{}", k, v))
            }

            Expr::Binary {
                operator,
                left,
                right,
            } => {
                let l = self.visit(left)?;
                let r = self.visit(right)?;
                if operator.is_word() {
                    Ok(format!("({} {} {})", l, operator, r))
                } else {
                    Ok(format!("({}{}{})", l, operator, r))
                }
            }

            Expr::Logical {
                operator,
                left,
                right,
            } => {
                let l = self.visit(left)?;
                let r = self.visit(right)?;
                Ok(format!("({}{}{})", l, operator, r))
            }

            Expr::Unary { operator, argument } => {
                Ok(format!("({}{})", operator, self.visit(argument)?))
            }

            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let t = self.visit(test)?;
                let c = self.visit(consequent)?;
                let a = self.visit(alternate)?;
                Ok(format!("({}?{}:{})", t, c, a))
            }

            Expr::RawCode(code) => Ok(code.clone()),
        }
    }
}

/// Remove one pair of matching surrounding quotes
fn strip_quotes(s: &str) -> &str {
    let quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')));
    if quoted {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
