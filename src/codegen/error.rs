use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while turning an AST into target code
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum CompileError {
    #[error("Illegal identifier: {name}")]
    #[diagnostic(
        code(vexpr::compile::illegal_identifier),
        help("'{name}' is blacklisted and may not be referenced")
    )]
    IllegalIdentifier { name: String },

    #[error("Illegal callee type: {kind}")]
    #[diagnostic(
        code(vexpr::compile::illegal_callee),
        help("Only named functions can be called, e.g. `abs(x)`")
    )]
    IllegalCallee { kind: String },

    #[error("Unrecognized function: {name}")]
    #[diagnostic(code(vexpr::compile::unrecognized_function))]
    UnrecognizedFunction { name: String },

    #[error("Expression is nested too deeply: {height} levels")]
    #[diagnostic(
        code(vexpr::compile::too_deep),
        help("At most {limit} levels can be compiled")
    )]
    TooDeep { height: usize, limit: usize },

    #[error("{} arguments to {function} function.", arity_problem(.found, .expected))]
    #[diagnostic(code(vexpr::compile::arity))]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },
}

impl CompileError {
    pub(crate) fn arity(function: impl Into<String>, expected: usize, found: usize) -> Self {
        CompileError::Arity {
            function: function.into(),
            expected,
            found,
        }
    }
}

fn arity_problem(found: &usize, expected: &usize) -> &'static str {
    if found < expected {
        "Missing"
    } else {
        "Too many"
    }
}
