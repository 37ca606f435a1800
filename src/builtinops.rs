//! Built-in operations registry.
//!
//! Every name that is available before a program starts running is listed
//! here once, together with how it is implemented and how many arguments it
//! accepts.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: Evaluate all arguments before application (e.g. `+`, `length`)
//! - **Special Forms**: Receive their argument nodes unevaluated and decide
//!   themselves what to evaluate (`if`, `while`, `do`, `define`, `set`, `fun`)
//!
//! Special forms are looked up by name before the environment is consulted, so
//! they can't be shadowed. Functions are copied into every global environment
//! and behave like any other binding: they can be redefined, passed around and
//! stored in arrays.
//!
//! ## Typing
//!
//! Egg has no implicit conversions:
//!
//! - `+` adds two numbers or concatenates two strings, and rejects anything else
//! - `-`, `*` and `/` take numbers only; division by zero gives the IEEE result
//! - `<` and `>` compare two numbers or two strings
//! - `==` compares any two values structurally; different kinds are never equal
//!
//! The table is built once, on first use, and never changes afterwards.

use crate::Error;
use crate::ast::Node;
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, OperationFn, type_mismatch,
};
use crate::evaluator::{
    Arity, Environment, eval_define, eval_do, eval_fun, eval_if, eval_set, eval_while,
};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, LazyLock};

/// Handler for a special form: unevaluated argument nodes plus the current scope
pub type SpecialFormFn = fn(&[Node], &Environment) -> Result<Value, Error>;

/// Represents the implementation of a built-in operation (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Regular function that takes evaluated arguments and returns a value
    Function(Arc<OperationFn>),
    /// Special form that receives unevaluated argument nodes and the environment
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name the operation is bound to
    pub id: &'static str,
    /// The implementation of this operation (function or special form)
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(a: Value, b: Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (a, b) => Err(Error::TypeError(format!(
            "'+' expects two numbers or two strings, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

// Macro to generate the numeric-only arithmetic functions
macro_rules! arithmetic {
    ($name:ident, $op:tt) => {
        fn $name(a: f64, b: f64) -> Result<f64, Error> {
            Ok(a $op b)
        }
    };
}

arithmetic!(builtin_sub, -);
arithmetic!(builtin_mul, *);
arithmetic!(builtin_div, /);

fn builtin_eq(a: Value, b: Value) -> Result<bool, Error> {
    Ok(a == b)
}

// Macro to generate ordering comparisons over numbers or strings
macro_rules! ordering_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(a: Value, b: Value) -> Result<bool, Error> {
            match (&a, &b) {
                (Value::Number(x), Value::Number(y)) => Ok(x $op y),
                (Value::String(x), Value::String(y)) => Ok(x $op y),
                _ => Err(Error::TypeError(format!(
                    concat!("'", $op_str, "' expects two numbers or two strings, got {} and {}"),
                    a.type_name(),
                    b.type_name()
                ))),
            }
        }
    };
}

ordering_comparison!(builtin_lt, <, "<");
ordering_comparison!(builtin_gt, >, ">");

fn builtin_array(items: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::from(items))
}

fn builtin_length(value: Value) -> Result<usize, Error> {
    match value {
        Value::Array(items) => Ok(items.len()),
        Value::String(s) => Ok(s.chars().count()),
        other => Err(type_mismatch("array or string", &other)),
    }
}

fn builtin_element(array: Rc<[Value]>, index: f64) -> Result<Value, Error> {
    if index.fract() != 0.0 {
        return Err(Error::TypeError(format!(
            "element index must be a whole number, got {}",
            Value::Number(index)
        )));
    }

    let out_of_range = Error::IndexOutOfRange {
        index,
        length: array.len(),
    };
    if index < 0.0 {
        return Err(out_of_range);
    }

    // Whole and non-negative, so the cast only saturates for huge indexes
    array.get(index as usize).cloned().ok_or(out_of_range)
}

/// Global registry of all built-in operations.
///
/// Functions are wired through the same adapter layer that hosts use for
/// custom builtins, so argument counts and operand kinds are checked in one
/// place.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    fn special_form(id: &'static str, handler: SpecialFormFn, arity: Arity) -> BuiltinOp {
        BuiltinOp {
            id,
            op_kind: OpKind::SpecialForm(handler),
            arity,
        }
    }

    vec![
        // Special forms
        special_form("if", eval_if, Arity::Exact(3)),
        special_form("while", eval_while, Arity::Exact(2)),
        special_form("do", eval_do, Arity::Any),
        special_form("define", eval_define, Arity::Exact(2)),
        special_form("set", eval_set, Arity::Exact(2)),
        special_form("fun", eval_fun, Arity::AtLeast(1)),
        // Arithmetic
        BuiltinOp {
            id: "+",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_add)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "-",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_sub)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "*",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_mul)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "/",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_div)),
            arity: Arity::Exact(2),
        },
        // Comparison
        BuiltinOp {
            id: "==",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_eq)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_lt)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: ">",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_gt)),
            arity: Arity::Exact(2),
        },
        // Arrays
        BuiltinOp {
            id: "array",
            op_kind: OpKind::Function(builtin_variadic::<(Vec<Value>,), _>(builtin_array)),
            arity: Arity::Any,
        },
        BuiltinOp {
            id: "length",
            op_kind: OpKind::Function(builtin_fixed::<(Value,), _>(builtin_length)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "element",
            op_kind: OpKind::Function(builtin_fixed::<(Rc<[Value]>, f64), _>(builtin_element)),
            arity: Arity::Exact(2),
        },
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by name
pub fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Find a special form by name, ignoring builtin functions
pub fn find_special_form(id: &str) -> Option<&'static BuiltinOp> {
    find_op(id).filter(|op| op.is_special_form())
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn val<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    fn arr(items: Vec<Value>) -> Value {
        Value::from(items)
    }

    /// Micro-helper for success cases
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Invoke a builtin through the registry using the erased signature
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_op(name).unwrap();
        match &op.op_kind {
            OpKind::Function(func) => func(args.to_vec()),
            OpKind::SpecialForm(_) => {
                panic!("expected function builtin in tests, got special form: {name}")
            }
        }
    }

    #[test]
    fn test_builtin_ops_registry() {
        let if_op = find_op("if").unwrap();
        assert!(if_op.is_special_form());
        assert_eq!(if_op.arity, Arity::Exact(3));
        assert_eq!(find_special_form("fun").unwrap().arity, Arity::AtLeast(1));
        assert_eq!(find_special_form("do").unwrap().arity, Arity::Any);

        let add_op = find_op("+").unwrap();
        assert!(!add_op.is_special_form());
        assert!(find_special_form("+").is_none());

        // print is bound per environment, not in the shared table
        assert!(find_op("print").is_none());
        assert!(find_op("unknown").is_none());

        let names: Vec<_> = get_builtin_ops().iter().map(|op| op.id).collect();
        for expected in [
            "if", "while", "do", "define", "set", "fun", "+", "-", "*", "/", "==", "<", ">",
            "array", "length", "element",
        ] {
            assert!(names.contains(&expected), "missing builtin {expected}");
        }
        assert_eq!(names.len(), 16);
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let nested = arr(vec![val(1), val("a"), arr(vec![val(2)])]);

        let test_cases: Vec<TestCase> = vec![
            // Arithmetic
            test!("+", &[val(2), val(3)], success(5)),
            test!("+", &[val(0.5), val(0.25)], success(0.75)),
            test!("+", &[val("egg"), val("shell")], success("eggshell")),
            test!("+", &[val(1), val("1")], None),
            test!("+", &[val(true), val(true)], None),
            test!("+", &[val(1)], None),
            test!("+", &[val(1), val(2), val(3)], None),
            test!("-", &[val(10), val(4)], success(6)),
            test!("-", &[val(4), val(10)], success(-6)),
            test!("-", &[val("a"), val(1)], None),
            test!("*", &[val(6), val(7)], success(42)),
            test!("/", &[val(7), val(2)], success(3.5)),
            test!("/", &[val(1), val(0)], success(f64::INFINITY)),
            test!("/", &[val("6"), val(2)], None),
            // Comparison
            test!("==", &[val(3), val(3)], success(true)),
            test!("==", &[val(3), val(4)], success(false)),
            test!("==", &[val("a"), val("a")], success(true)),
            test!("==", &[val(1), val("1")], success(false)),
            test!("==", &[val(false), val(0)], success(false)),
            test!("==", &[nested.clone(), nested.clone()], success(true)),
            test!("==", &[nested.clone(), arr(vec![val(1)])], success(false)),
            test!("==", &[val(1)], None),
            test!("<", &[val(1), val(2)], success(true)),
            test!("<", &[val(2), val(1)], success(false)),
            test!("<", &[val(2), val(2)], success(false)),
            test!("<", &[val("apple"), val("banana")], success(true)),
            test!(">", &[val(5), val(3)], success(true)),
            test!(">", &[val("a"), val("b")], success(false)),
            test!("<", &[val(1), val("2")], None),
            test!(">", &[val(true), val(false)], None),
            // Arrays
            test!("array", &[], Some(arr(vec![]))),
            test!("array", &[val(1), val("a")], Some(arr(vec![val(1), val("a")]))),
            test!("length", &[nested.clone()], success(3)),
            test!("length", &[arr(vec![])], success(0)),
            test!("length", &[val("héllo")], success(5)),
            test!("length", &[val(5)], None),
            test!("length", &[], None),
            test!("element", &[nested.clone(), val(0)], success(1)),
            test!("element", &[nested.clone(), val(2)], Some(arr(vec![val(2)]))),
            test!("element", &[nested.clone(), val(3)], None),
            test!("element", &[nested.clone(), val(-1)], None),
            test!("element", &[nested.clone(), val(0.5)], None),
            test!("element", &[val("abc"), val(0)], None),
            test!("element", &[nested, val("0")], None),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            match (result, expected) {
                (Ok(actual), Some(expected)) => {
                    assert_eq!(actual, expected, "Test #{} ({name}) failed", i + 1);
                }
                (Err(_), None) => {}
                (Ok(actual), None) => {
                    panic!("Test #{} ({name}): expected error, got {actual:?}", i + 1)
                }
                (Err(err), Some(expected)) => {
                    panic!("Test #{} ({name}): expected {expected:?}, got error {err}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_builtin_error_kinds() {
        use crate::ErrorKind;

        let cases = vec![
            (call_builtin("-", &[val(1)]), ErrorKind::Type),
            (call_builtin("*", &[val("x"), val(1)]), ErrorKind::Type),
            (
                call_builtin("element", &[arr(vec![val(1)]), val(1)]),
                ErrorKind::Range,
            ),
            (
                call_builtin("element", &[arr(vec![val(1)]), val(1.5)]),
                ErrorKind::Type,
            ),
        ];

        for (i, (result, kind)) in cases.into_iter().enumerate() {
            assert_eq!(result.unwrap_err().kind(), kind, "case #{}", i + 1);
        }

        assert_eq!(
            call_builtin("element", &[arr(vec![val(1), val(2)]), val(5)]).unwrap_err(),
            Error::IndexOutOfRange {
                index: 5.0,
                length: 2
            }
        );
        assert_eq!(
            call_builtin("+", &[val(1), val("a")])
                .unwrap_err()
                .to_string(),
            "TypeError: '+' expects two numbers or two strings, got number and string"
        );
    }

    #[test]
    fn test_arity_validation() {
        use Arity::*;

        Exact(2).validate(2).unwrap();
        Exact(2).validate(1).unwrap_err();
        Exact(2).validate(3).unwrap_err();

        AtLeast(1).validate(1).unwrap();
        AtLeast(1).validate(5).unwrap();
        AtLeast(1).validate(0).unwrap_err();

        Any.validate(0).unwrap();
        Any.validate(100).unwrap();

        assert_eq!(Exact(2).validate(1), Err(Error::arity_error(2, 1)));
        assert_eq!(Exact(3).to_string(), "3");
        assert_eq!(AtLeast(1).to_string(), "at least 1");
    }
}
