use crate::Error;
use crate::value::Value;
use std::rc::Rc;
use std::sync::Arc;

// Adapter layer that turns strongly-typed Rust functions into the erased
// `OperationFn` stored in the builtin registry and in environments.
//
// Hosts normally reach this through `Environment::register_builtin_operation`;
// the traits are public only so they can appear in its bounds.

/// Canonical erased builtin function type used by the registry.
///
/// Builtins receive ownership of their argument vector.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

/// Build the TypeError reported when an argument has the wrong kind.
pub(crate) fn type_mismatch(expected: &str, got: &Value) -> Error {
    Error::TypeError(format!("expected {expected}, got {} {got}", got.type_name()))
}

// =====================================================================
// Argument conversion
// =====================================================================

/// Conversion from an evaluated argument into a typed parameter.
///
/// Every supported parameter type is listed here so that the accepted
/// shapes are easy to audit.
pub trait FromParam: Sized {
    fn from_arg(value: Value) -> Result<Self, Error>;
}

impl FromParam for Value {
    fn from_arg(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromParam for f64 {
    fn from_arg(value: Value) -> Result<Self, Error> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(type_mismatch("number", &other)),
        }
    }
}

impl FromParam for bool {
    fn from_arg(value: Value) -> Result<Self, Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(type_mismatch("boolean", &other)),
        }
    }
}

impl FromParam for String {
    fn from_arg(value: Value) -> Result<Self, Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(type_mismatch("string", &other)),
        }
    }
}

/// Array arguments are shared, not copied
impl FromParam for Rc<[Value]> {
    fn from_arg(value: Value) -> Result<Self, Error> {
        match value {
            Value::Array(items) => Ok(items),
            other => Err(type_mismatch("array", &other)),
        }
    }
}

// =====================================================================
// Function adapters
// =====================================================================

/// Converts a typed Rust function or closure into an [`OperationFn`],
/// parameterized by its argument tuple type.
///
/// The function returns `Result<R, Error>` for any `R: Into<Value>`.
/// The adapter checks the argument count and converts each argument with
/// [`FromParam`] before calling it.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Converts a function taking all of its arguments as one `Vec` into an
/// [`OperationFn`]. Each argument is converted with [`FromParam`]; the
/// count is left to the caller.
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

impl<F, T, R> IntoVariadicOperation<(Vec<T>,)> for F
where
    F: Fn(Vec<T>) -> Result<R, Error> + Send + Sync + 'static,
    T: FromParam,
    R: Into<Value>,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| -> Result<Value, Error> {
            let rest = args
                .into_iter()
                .map(T::from_arg)
                .collect::<Result<Vec<T>, Error>>()?;
            (self)(rest).map(Into::into)
        })
    }
}

// 0-arg functions / closures
impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> Result<R, Error> + Send + Sync + 'static,
    R: Into<Value>,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| -> Result<Value, Error> {
            if !args.is_empty() {
                return Err(Error::arity_error(0, args.len()));
            }
            (self)().map(Into::into)
        })
    }
}

/// Implement `IntoOperation` for a fixed number of parameters.
///
/// The owned argument vector is moved into an array of the expected
/// length, so a count mismatch is caught before any conversion runs.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: Fn( $( $A ),+ ) -> Result<R, Error> + Send + Sync + 'static,
            $( $A: FromParam, )+
            R: Into<Value>,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |args: Vec<Value>| -> Result<Value, Error> {
                    let got = args.len();
                    let Ok([ $( $v ),+ ]) = <[Value; $arity]>::try_from(args) else {
                        return Err(Error::arity_error($arity, got));
                    };
                    (self)( $( <$A as FromParam>::from_arg($v)? ),+ ).map(Into::into)
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, v0: A1);
impl_into_operation_for_arity!(2, v0: A1, v1: A2);
impl_into_operation_for_arity!(3, v0: A1, v1: A2, v2: A3);
impl_into_operation_for_arity!(4, v0: A1, v1: A2, v2: A3, v3: A4);
