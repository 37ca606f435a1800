//! Egg - a small tree-walking interpreter for an expression-oriented language
//!
//! Every Egg program is a single expression. There are only three kinds of
//! syntax: literals, words and applications.
//!
//! ```text
//! # comments run to the end of the line
//! do(define(sum, fun(array,
//!      do(define(i, 0),
//!         define(sum, 0),
//!         while(<(i, length(array)),
//!           do(define(sum, +(sum, element(array, i))),
//!              define(i, +(i, 1)))),
//!         sum))),
//!    print(sum(array(1, 2, 3))))
//! ```
//!
//! ## Evaluation
//!
//! - Literals evaluate to themselves, words are looked up in the environment chain
//! - Applications whose operator is the name of a special form (`if`, `while`, `do`,
//!   `define`, `set`, `fun`) receive their arguments unevaluated
//! - Every other application evaluates the operator, then the arguments left to right,
//!   and calls the resulting function
//! - Only the boolean `false` is falsy
//!
//! Functions created with `fun` are closures: they keep the environment they were
//! defined in alive, and `set` inside them updates the enclosing binding.
//!
//! ## Modules
//!
//! - `parser`: recursive-descent parser producing [`ast::Node`] trees
//! - `evaluator`: environments, evaluation and function application
//! - `builtinops`: the read-only registry of special forms and builtin functions
//! - `json`: conversion between syntax trees and their JSON form
//!
//! ## Embedding
//!
//! ```
//! use egglang::{run, value::Value};
//!
//! let result = run("do(define(f, fun(a, fun(b, +(a, b)))), f(4)(5))").unwrap();
//! assert_eq!(result, Value::Number(9.0));
//! ```

use std::fmt;

use crate::evaluator::{Environment, create_global_env, eval};
use crate::value::Value;

/// Maximum number of characters of unparsed input kept in a [`SyntaxError`]
const MAX_CONTEXT: usize = 40;

/// Maximum nesting of argument lists (including chained calls like `f(a)(b)`)
/// accepted by the parser, so deeply nested input is rejected instead of
/// overflowing the stack
pub const MAX_PARSE_DEPTH: usize = 256;

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SyntaxErrorKind {
    /// No string, number or word could be read at this position
    UnexpectedSyntax,
    /// An argument list item was followed by something other than `,` or `)`
    ExpectedSeparator,
    /// Extra input found after the single top-level expression
    TrailingContent,
    /// A special form was used with the wrong number or shape of arguments
    BadSpecialForm,
    /// A JSON syntax tree could not be turned into a node
    InvalidTree,
    /// Argument lists nested deeper than [`MAX_PARSE_DEPTH`]
    TooDeep,
}

/// A structured error describing malformed program text or special form usage.
#[derive(Debug, PartialEq, Clone)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    /// Snippet of the unparsed input where the error occurred
    pub context: Option<String>,
}

impl SyntaxError {
    /// Create a SyntaxError with no input context
    pub fn new(kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        SyntaxError {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a SyntaxError that remembers the remaining input it failed on
    pub fn at(kind: SyntaxErrorKind, message: impl Into<String>, remainder: &str) -> Self {
        let mut context: String = remainder.chars().take(MAX_CONTEXT).collect();
        if remainder.chars().nth(MAX_CONTEXT).is_some() {
            context.push_str("[...]");
        }

        // Keep the snippet on one line
        let context = context.replace('\n', "\\n").replace('\r', "");

        SyntaxError {
            kind,
            message: message.into(),
            context: Some(context),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match &self.context {
            Some(context) if context.is_empty() => write!(f, " at end of input"),
            Some(context) => write!(f, " near '{context}'"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Broad classification of [`Error`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Reference,
    Type,
    Range,
    Output,
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("SyntaxError: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("ReferenceError: Undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("ReferenceError: Bad use of set: '{0}' is not defined")]
    BadSet(String),
    #[error("TypeError: Applying a non-function: {0}")]
    NotAFunction(String),
    #[error("TypeError: Wrong number of arguments: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("RangeError: index {index} is out of range for an array of length {length}")]
    IndexOutOfRange { index: f64, length: usize },
    #[error("OutputError: {0}")]
    Output(String),
}

impl Error {
    /// Create an Arity error for a call with `got` arguments
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::Arity { expected, got }
    }

    /// Shorthand for a special form misuse
    pub(crate) fn bad_form(message: impl Into<String>) -> Self {
        Error::Syntax(SyntaxError::new(SyntaxErrorKind::BadSpecialForm, message))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::UndefinedVariable(_) | Error::BadSet(_) => ErrorKind::Reference,
            Error::NotAFunction(_) | Error::Arity { .. } | Error::TypeError(_) => ErrorKind::Type,
            Error::IndexOutOfRange { .. } => ErrorKind::Range,
            Error::Output(_) => ErrorKind::Output,
        }
    }
}

/// Parse and evaluate a program in a fresh top-level environment.
pub fn run(program: &str) -> Result<Value, Error> {
    run_in(&create_global_env(), program)
}

/// Join `lines` with newlines and run them as one program.
///
/// This allows writing a single logical program across several source lines.
pub fn run_lines(lines: &[&str]) -> Result<Value, Error> {
    run(&lines.join("\n"))
}

/// Parse and evaluate a program in a new scope chained to `env`.
///
/// Definitions made by the program land in that new scope, so `env` itself
/// (typically a global environment seeded by the host) is left untouched
/// unless the program uses `set` on one of its bindings.
pub fn run_in(env: &Environment, program: &str) -> Result<Value, Error> {
    tracing::debug!(bytes = program.len(), "running program");
    let node = parser::parse(program)?;
    let scope = Environment::with_parent(env);
    eval(&node, &scope)
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod parser;
pub mod value;

#[cfg(feature = "json")]
pub mod json;
