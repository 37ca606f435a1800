use crate::Error;
use crate::ast::Node;
use crate::builtinops::{OpKind, find_special_form, get_builtin_ops};
use crate::value::{Closure, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::Arc;

pub mod intooperation;

use intooperation::{IntoOperation, IntoVariadicOperation};

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many
    Exact(usize),
    /// This many or more
    AtLeast(usize),
    /// Any number, including none
    Any,
}

impl Arity {
    /// Check an argument count, reporting the smallest acceptable count on failure
    pub fn validate(self, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if got != n => Err(Error::arity_error(n, got)),
            Arity::AtLeast(n) if got < n => Err(Error::arity_error(n, got)),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number"),
        }
    }
}

/// Outcome of [`Environment::set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResult {
    Success,
    Undefined,
}

struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Scope for variable bindings
///
/// An `Environment` is a shared handle: clones refer to the same scope, so a
/// closure that captured it sees later definitions and `set`s. Lookup walks
/// from this scope out through its parents.
///
/// Scopes are reference counted and never collected as cycles. A function
/// defined in the scope it captures (`define(f, fun(...))`) keeps that scope
/// alive for good, so a host that calls [`crate::run_in`] many times with such
/// programs keeps every one of their program scopes in memory.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create an empty top-level scope
    pub fn new() -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: None,
            })),
        }
    }

    /// Create an empty scope chained to `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(parent.clone()),
            })),
        }
    }

    pub fn parent(&self) -> Option<Environment> {
        self.frame.borrow().parent.clone()
    }

    /// Bind `name` in this scope, replacing any binding it already has here
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Look `name` up in this scope and its ancestors
    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.frame.borrow();
        match frame.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => frame.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        let frame = self.frame.borrow();
        frame.bindings.contains_key(name)
            || frame
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_defined(name))
    }

    /// The innermost scope, starting with this one, that binds `name`
    pub fn scope_of(&self, name: &str) -> Option<Environment> {
        let frame = self.frame.borrow();
        if frame.bindings.contains_key(name) {
            return Some(self.clone());
        }
        frame.parent.as_ref().and_then(|parent| parent.scope_of(name))
    }

    /// Overwrite the innermost existing binding of `name`
    pub fn set(&self, name: &str, value: Value) -> SetResult {
        let mut frame = self.frame.borrow_mut();
        if let Some(slot) = frame.bindings.get_mut(name) {
            *slot = value;
            return SetResult::Success;
        }
        match &frame.parent {
            Some(parent) => parent.set(name, value),
            None => SetResult::Undefined,
        }
    }

    /// Register a builtin function that works on the raw argument vector.
    ///
    /// This is the low-level API: the function checks its own argument count
    /// and operand kinds. It may capture non-`Send` state such as an output
    /// sink. For plain typed functions prefer
    /// [`Environment::register_builtin_operation`].
    ///
    /// # Example
    /// ```
    /// use egglang::evaluator::create_global_env;
    /// use egglang::value::Value;
    /// use egglang::{Error, run_in};
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("count", |args: Vec<Value>| -> Result<Value, Error> {
    ///     Ok(Value::from(args.len()))
    /// });
    /// assert_eq!(run_in(&env, "count(1, 2, 3)").unwrap(), Value::Number(3.0));
    /// ```
    pub fn register_builtin_function<F>(&self, name: &str, func: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    {
        self.define(
            name,
            Value::BuiltinFunction {
                id: name.to_owned(),
                func: Rc::new(func),
            },
        );
    }

    /// Register a strongly-typed Rust function as a builtin operation using
    /// automatic argument extraction and result conversion.
    ///
    /// ```
    /// use egglang::evaluator::create_global_env;
    /// use egglang::value::Value;
    /// use egglang::{Error, run_in};
    ///
    /// fn hypot(a: f64, b: f64) -> Result<f64, Error> {
    ///     Ok(a.hypot(b))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// assert_eq!(run_in(&env, "hypot(3, 4)").unwrap(), Value::Number(5.0));
    /// ```
    ///
    /// Supported parameter types: `f64` (number), `bool`, `String`,
    /// `Rc<[Value]>` (array) and `Value` (anything). The function returns
    /// `Result<R, Error>` for any `R: Into<Value>`.
    ///
    /// The argument count is enforced automatically and an argument of the
    /// wrong kind yields a `TypeError`.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        let op = func.into_operation();
        self.define(
            name,
            Value::BuiltinFunction {
                id: name.to_owned(),
                func: Rc::new(move |args: Vec<Value>| op(args)),
            },
        );
    }

    /// Register an operation that takes all of its arguments as one `Vec`.
    ///
    /// Every argument is converted to the element type, and the total count
    /// is validated against `arity` before the call.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args>,
    {
        let op = func.into_variadic_operation();
        self.define(
            name,
            Value::BuiltinFunction {
                id: name.to_owned(),
                func: Rc::new(move |args: Vec<Value>| -> Result<Value, Error> {
                    arity.validate(args.len())?;
                    op(args)
                }),
            },
        );
    }

    /// Get all bindings visible from this environment
    /// Returns a Vec of (name, value) pairs sorted by name; inner scopes win
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Start with parent bindings (so they can be overridden by local bindings)
        if let Some(parent) = self.parent() {
            bindings.extend(parent.bindings());
        }

        for (name, value) in &self.frame.borrow().bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Names bound directly in this scope, sorted
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.frame.borrow().bindings.keys().cloned().collect();
        names.sort();
        names
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

// Values in a scope may be closures over that same scope, so only names are shown
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.local_names())
            .field("parent", &self.parent())
            .finish()
    }
}

/// Evaluate a syntax tree in `env`
pub fn eval(node: &Node, env: &Environment) -> Result<Value, Error> {
    match node {
        Node::Value(literal) => Ok(Value::from(literal)),

        Node::Word(name) => env
            .get(name)
            .ok_or_else(|| Error::UndefinedVariable(name.clone())),

        Node::Apply { operator, args } => {
            // Special forms take precedence over bindings and see their arguments unevaluated.
            // Each handler checks the shape of its own arguments.
            if let Node::Word(name) = operator.as_ref()
                && let Some(op) = find_special_form(name)
                && let OpKind::SpecialForm(handler) = &op.op_kind
            {
                tracing::trace!(form = op.id, args = args.len(), "special form");
                return handler(args, env);
            }

            let func = eval(operator, env)?;
            if !func.is_callable() {
                return Err(Error::NotAFunction(format!(
                    "{operator} is a {}",
                    func.type_name()
                )));
            }

            let values = args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            apply(&func, values)
        }
    }
}

/// Call a function value with already evaluated arguments
pub fn apply(func: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Value::BuiltinFunction { func, .. } => func(args),
        Value::Function(closure) => {
            if closure.params.len() != args.len() {
                return Err(Error::arity_error(closure.params.len(), args.len()));
            }
            tracing::trace!(params = ?closure.params, "calling closure");

            let scope = Environment::with_parent(&closure.env);
            for (param, arg) in closure.params.iter().zip(args) {
                scope.define(param.clone(), arg);
            }
            eval(&closure.body, &scope)
        }
        other => Err(Error::NotAFunction(format!(
            "{other} is a {}",
            other.type_name()
        ))),
    }
}

/// Error for a special form called with the wrong number of arguments,
/// quoting the arity recorded in the registry
fn bad_arity(name: &str, got: usize) -> Error {
    let arity = find_special_form(name).map_or(Arity::Any, |op| op.arity);
    Error::bad_form(format!(
        "Bad number of args to {name}: expected {arity}, got {got}"
    ))
}

/// Evaluate if special form; only `false` selects the else branch
pub(crate) fn eval_if(args: &[Node], env: &Environment) -> Result<Value, Error> {
    match args {
        [condition, then_branch, else_branch] => {
            if eval(condition, env)?.is_false() {
                eval(else_branch, env)
            } else {
                eval(then_branch, env)
            }
        }
        _ => Err(bad_arity("if", args.len())),
    }
}

/// Evaluate while special form; always yields `false`
pub(crate) fn eval_while(args: &[Node], env: &Environment) -> Result<Value, Error> {
    match args {
        [condition, body] => {
            while !eval(condition, env)?.is_false() {
                eval(body, env)?;
            }
            Ok(Value::Bool(false))
        }
        _ => Err(bad_arity("while", args.len())),
    }
}

/// Evaluate do special form
pub(crate) fn eval_do(args: &[Node], env: &Environment) -> Result<Value, Error> {
    let mut result = Value::Bool(false);
    for arg in args {
        result = eval(arg, env)?;
    }
    Ok(result)
}

/// Evaluate define special form
pub(crate) fn eval_define(args: &[Node], env: &Environment) -> Result<Value, Error> {
    match args {
        [Node::Word(name), expr] => {
            let value = eval(expr, env)?;
            tracing::debug!(%name, "define");
            env.define(name.clone(), value.clone());
            Ok(value)
        }
        [_, _] => Err(Error::bad_form(
            "Bad use of define: the name must be a word",
        )),
        _ => Err(bad_arity("define", args.len())),
    }
}

/// Evaluate set special form
///
/// The scope holding the binding is found before the new value is evaluated,
/// and that binding is the one overwritten.
pub(crate) fn eval_set(args: &[Node], env: &Environment) -> Result<Value, Error> {
    match args {
        [Node::Word(name), expr] => {
            let Some(scope) = env.scope_of(name) else {
                return Err(Error::BadSet(name.clone()));
            };
            let value = eval(expr, env)?;
            tracing::debug!(%name, "set");
            scope.define(name.clone(), value.clone());
            Ok(value)
        }
        [_, _] => Err(Error::bad_form("Bad use of set: the name must be a word")),
        _ => Err(bad_arity("set", args.len())),
    }
}

/// Evaluate fun special form
pub(crate) fn eval_fun(args: &[Node], env: &Environment) -> Result<Value, Error> {
    let Some((body, param_nodes)) = args.split_last() else {
        return Err(bad_arity("fun", 0));
    };

    let params = param_nodes
        .iter()
        .map(|param| {
            param
                .as_word()
                .map(str::to_owned)
                .ok_or_else(|| Error::bad_form(format!("Arg names must be words, got {param}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::Function(Rc::new(Closure {
        params,
        body: body.clone(),
        env: env.clone(),
    })))
}

/// Create a global environment whose `print` writes to stdout
pub fn create_global_env() -> Environment {
    create_global_env_with_output(Rc::new(RefCell::new(io::stdout())))
}

/// Create a global environment with `true`, `false`, every builtin function and a
/// `print` that writes to `out`
pub fn create_global_env_with_output<W: Write + 'static>(out: Rc<RefCell<W>>) -> Environment {
    let env = Environment::new();
    env.define("true", Value::Bool(true));
    env.define("false", Value::Bool(false));

    // Add all regular functions from the registry
    for builtin_op in get_builtin_ops() {
        if let OpKind::Function(func) = &builtin_op.op_kind {
            let f = Arc::clone(func);
            env.define(
                builtin_op.id,
                Value::BuiltinFunction {
                    id: builtin_op.id.to_owned(),
                    func: Rc::new(move |args: Vec<Value>| f(args)),
                },
            );
        }
    }

    env.register_builtin_function("print", move |args: Vec<Value>| {
        let [value] = <[Value; 1]>::try_from(args)
            .map_err(|args| Error::arity_error(1, args.len()))?;
        writeln!(out.borrow_mut(), "{value}").map_err(|e| Error::Output(e.to_string()))?;
        Ok(value)
    });

    env
}
