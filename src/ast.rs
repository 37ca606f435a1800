//! This module defines the syntax tree produced by the parser. A program is a
//! single [`Node`], which is one of three kinds: a literal value, a word
//! (identifier reference) or an application of an operator to arguments.
//! Constructor helpers such as [`Node::word`] and [`Node::apply`] keep tree
//! building in the parser and in tests terse. The `Display` implementation
//! prints a node back as Egg source, so that re-parsing the printed form of
//! any parsed tree gives back an equal tree.

use std::fmt;

/// Literal carried by a value node
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

/// Core syntax tree type
///
/// Trees are immutable once built and every node is owned by its parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A string or number literal
    Value(Literal),
    /// An identifier reference
    Word(String),
    /// A function call or special form, `operator(args...)`
    Apply { operator: Box<Node>, args: Vec<Node> },
}

impl Node {
    pub fn string<S: Into<String>>(s: S) -> Node {
        Node::Value(Literal::String(s.into()))
    }

    pub fn number(n: f64) -> Node {
        Node::Value(Literal::Number(n))
    }

    pub fn word<S: Into<String>>(name: S) -> Node {
        Node::Word(name.into())
    }

    pub fn apply(operator: Node, args: Vec<Node>) -> Node {
        Node::Apply {
            operator: Box::new(operator),
            args,
        }
    }

    /// The identifier if this node is a word
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Node::Word(name) => Some(name),
            _ => None,
        }
    }
}

/// Format a number the way Egg prints it: integral values carry no
/// fractional part and non-finite values use their conventional names.
pub(crate) fn fmt_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        // Also covers negative zero
        write!(f, "0")
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // No escape sequences exist, so a string can't contain '"'
            Literal::String(s) => write!(f, "\"{s}\""),
            Literal::Number(n) => fmt_number(f, *n),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Value(literal) => write!(f, "{literal}"),
            Node::Word(name) => write!(f, "{name}"),
            Node::Apply { operator, args } => {
                write!(f, "{operator}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
