//! Runtime values.
//!
//! Egg is dynamically typed; every expression evaluates to a [`Value`].
//! Arrays are immutable once built and are shared cheaply between bindings.
//! Functions are either closures created by `fun` or builtin functions
//! implemented in Rust.

use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Literal, Node, fmt_number};
use crate::evaluator::Environment;

/// Erased signature every builtin function is called through.
pub type BuiltinFn = dyn Fn(Vec<Value>) -> Result<Value, Error>;

/// A user-defined function: parameter names, body and the environment it
/// was created in.
pub struct Closure {
    pub(crate) params: Vec<String>,
    pub(crate) body: Node,
    pub(crate) env: Environment,
}

impl Closure {
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> &Node {
        &self.body
    }
}

#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    Array(Rc<[Value]>),
    /// Closure created by `fun`
    Function(Rc<Closure>),
    /// Function implemented in Rust
    /// Uses id string for equality comparison instead of function pointer
    BuiltinFunction { id: String, func: Rc<BuiltinFn> },
}

impl Value {
    /// Name of this value's kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) | Value::BuiltinFunction { .. } => "function",
        }
    }

    /// Only the boolean `false` is falsy
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::BuiltinFunction { .. })
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => Value::Number(*n),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(n as f64)
            }
        }
    };
}

impl_from_integer!(i32);
impl_from_integer!(u32);
impl_from_integer!(usize);

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v.into())
    }
}

impl From<Rc<[Value]>> for Value {
    fn from(v: Rc<[Value]>) -> Self {
        Value::Array(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => {
                write!(f, "Array(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            // The captured environment is left out, it may contain this very closure
            Value::Function(closure) => {
                write!(f, "Function(params={:?}, body={})", closure.params, closure.body)
            }
            Value::BuiltinFunction { id, .. } => write!(f, "BuiltinFunction({id})"),
        }
    }
}

/// Display form used by `print`: strings appear raw at the top level and
/// quoted inside arrays.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(f, *n),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::String(s) => write!(f, "\"{s}\"")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
            Value::Function(closure) => write!(f, "<function({})>", closure.params.join(", ")),
            Value::BuiltinFunction { id, .. } => write!(f, "<builtin {id}>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Closures are only equal to themselves
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltinFunction { id: id1, .. }, Value::BuiltinFunction { id: id2, .. }) => {
                id1 == id2
            }
            _ => false,
        }
    }
}
