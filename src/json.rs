//! Conversion between syntax trees and their JSON form.
//!
//! Every node is an object tagged by `type`:
//!
//! ```json
//! {"type": "apply",
//!  "operator": {"type": "word", "name": "+"},
//!  "args": [{"type": "word", "name": "a"}, {"type": "value", "value": 10}]}
//! ```

use crate::ast::{Literal, Node};
use crate::parser::parse;
use crate::{Error, SyntaxError, SyntaxErrorKind};
use serde_json::{Map, Number, Value as Json};

/// Largest magnitude at which every integer is exactly representable as f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn invalid_tree(message: impl Into<String>) -> Error {
    SyntaxError::new(SyntaxErrorKind::InvalidTree, message).into()
}

/// Parse a JSON syntax tree into a node
pub fn parse_json_ast(input: &str) -> Result<Node, Error> {
    let json: Json =
        serde_json::from_str(input).map_err(|e| invalid_tree(format!("Invalid JSON: {e}")))?;
    json_to_node(json)
}

fn json_to_node(json: Json) -> Result<Node, Error> {
    let mut obj = match json {
        Json::Object(obj) => obj,
        other => return Err(invalid_tree(format!("Expected a node object, got {other}"))),
    };

    let node_type = match obj.remove("type") {
        Some(Json::String(t)) => t,
        _ => return Err(invalid_tree("Node is missing a string 'type' field")),
    };

    match node_type.as_str() {
        "value" => match obj.remove("value") {
            Some(Json::String(s)) => Ok(Node::string(s)),
            Some(Json::Number(n)) => n
                .as_f64()
                .map(Node::number)
                .ok_or_else(|| invalid_tree(format!("Unsupported number: {n}"))),
            Some(other) => Err(invalid_tree(format!(
                "A value node holds a string or a number, got {other}"
            ))),
            None => Err(invalid_tree("Value node is missing 'value'")),
        },
        "word" => match obj.remove("name") {
            Some(Json::String(name)) if is_valid_word(&name) => Ok(Node::word(name)),
            Some(Json::String(name)) => Err(invalid_tree(format!("Invalid word name: {name:?}"))),
            _ => Err(invalid_tree("Word node is missing a string 'name'")),
        },
        "apply" => {
            let operator = obj
                .remove("operator")
                .ok_or_else(|| invalid_tree("Apply node is missing 'operator'"))?;
            let Some(Json::Array(args)) = obj.remove("args") else {
                return Err(invalid_tree("Apply node is missing an 'args' array"));
            };

            let args = args
                .into_iter()
                .map(json_to_node)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Node::apply(json_to_node(operator)?, args))
        }
        other => Err(invalid_tree(format!("Unknown node type: {other}"))),
    }
}

/// A name the parser reads back as this same word, so `12` or `a b` are rejected
fn is_valid_word(name: &str) -> bool {
    matches!(parse(name), Ok(Node::Word(word)) if word == name)
}

/// Convert a node into its JSON value
pub fn ast_to_json_value(node: &Node) -> Result<Json, Error> {
    let mut obj = Map::new();
    match node {
        Node::Value(literal) => {
            obj.insert("type".into(), "value".into());
            let value = match literal {
                Literal::String(s) => Json::String(s.clone()),
                Literal::Number(n) => number_to_json(*n)?,
            };
            obj.insert("value".into(), value);
        }
        Node::Word(name) => {
            obj.insert("type".into(), "word".into());
            obj.insert("name".into(), name.as_str().into());
        }
        Node::Apply { operator, args } => {
            obj.insert("type".into(), "apply".into());
            obj.insert("operator".into(), ast_to_json_value(operator)?);
            let args = args
                .iter()
                .map(ast_to_json_value)
                .collect::<Result<Vec<_>, _>>()?;
            obj.insert("args".into(), Json::Array(args));
        }
    }
    Ok(Json::Object(obj))
}

// Whole numbers are written without a fractional part
fn number_to_json(n: f64) -> Result<Json, Error> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Ok(Json::from(n as i64));
    }
    Number::from_f64(n)
        .map(Json::Number)
        .ok_or_else(|| invalid_tree(format!("Number {n} has no JSON form")))
}

/// Convert a node into compact JSON text
pub fn ast_to_json(node: &Node) -> Result<String, Error> {
    Ok(ast_to_json_value(node)?.to_string())
}

/// Convert a node into indented JSON text
pub fn ast_to_json_pretty(node: &Node) -> Result<String, Error> {
    Ok(format!("{:#}", ast_to_json_value(node)?))
}
