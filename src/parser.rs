use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, digit1, satisfy},
    combinator::{map, not, recognize},
    error::ErrorKind,
    multi::many0,
    sequence::{delimited, pair, terminated},
};

use crate::ast::Node;
use crate::{Error, MAX_PARSE_DEPTH, SyntaxError, SyntaxErrorKind};

/// Characters that can never be part of a word
const WORD_DELIMITERS: &str = "(),\"";

/// Characters that continue a run of digits, so `12abc` is a word rather than a number
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A `#` comment, up to but not including the line break
fn comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('#'), take_till(|c: char| c == '\n' || c == '\r'))).parse(input)
}

fn space_or_comments(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((take_while1(char::is_whitespace), comment)))).parse(input)
}

/// Skip any mix of whitespace and line comments.
pub fn skip_space(input: &str) -> &str {
    match space_or_comments(input) {
        Ok((rest, _)) => rest,
        // many0 over non-empty matches always succeeds
        Err(_) => input,
    }
}

/// Parse a string literal; there are no escape sequences
fn string_literal(input: &str) -> IResult<&str, Node> {
    map(
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        Node::string,
    )
    .parse(input)
}

/// Parse a run of decimal digits ending at a word boundary.
///
/// A literal too long to be a finite number is a hard failure, so it is
/// not read as a word either.
fn number_literal(input: &str) -> IResult<&str, Node> {
    let (rest, digits) = terminated(digit1, not(satisfy(is_word_char))).parse(input)?;
    match digits.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok((rest, Node::number(n))),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        ))),
    }
}

/// Parse a word: any run of characters other than whitespace and delimiters
fn word(input: &str) -> IResult<&str, Node> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !WORD_DELIMITERS.contains(c)),
        Node::word,
    )
    .parse(input)
}

fn atom(input: &str) -> IResult<&str, Node> {
    alt((string_literal, number_literal, word)).parse(input)
}

fn too_deep(input: &str) -> Error {
    SyntaxError::at(
        SyntaxErrorKind::TooDeep,
        format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        input,
    )
    .into()
}

/// Parse one expression from the start of `input`.
///
/// Returns the node together with the unparsed remainder.
pub fn parse_expression(input: &str) -> Result<(Node, &str), Error> {
    parse_expression_at(input, 0)
}

fn parse_expression_at(input: &str, depth: usize) -> Result<(Node, &str), Error> {
    let input = skip_space(input);
    match atom(input) {
        Ok((rest, node)) => parse_apply_at(node, rest, depth),
        Err(_) => Err(SyntaxError::at(
            SyntaxErrorKind::UnexpectedSyntax,
            "Unexpected syntax",
            input,
        )
        .into()),
    }
}

/// Wrap `node` in applications for every argument list that follows it.
///
/// `f(a)(b)` parses as an application whose operator is itself the
/// application `f(a)`. If no `(` follows, `node` is returned unchanged.
pub fn parse_apply(node: Node, input: &str) -> Result<(Node, &str), Error> {
    parse_apply_at(node, input, 0)
}

// `depth` counts the argument lists enclosing `node`; each chained call adds one too
fn parse_apply_at(node: Node, input: &str, depth: usize) -> Result<(Node, &str), Error> {
    let mut node = node;
    let mut depth = depth;
    let mut input = skip_space(input);

    while let Some(rest) = input.strip_prefix('(') {
        depth += 1;
        if depth > MAX_PARSE_DEPTH {
            return Err(too_deep(input));
        }

        input = skip_space(rest);
        let mut args = Vec::new();

        while let Some(first) = input.chars().next()
            && first != ')'
        {
            let (arg, rest) = parse_expression_at(input, depth)?;
            args.push(arg);
            input = skip_space(rest);

            if let Some(rest) = input.strip_prefix(',') {
                input = skip_space(rest);
            } else if !input.starts_with(')') {
                return Err(SyntaxError::at(
                    SyntaxErrorKind::ExpectedSeparator,
                    "Expected ',' or ')'",
                    input,
                )
                .into());
            }
        }

        // Ran out of input before the closing parenthesis
        let Some(rest) = input.strip_prefix(')') else {
            return Err(SyntaxError::at(
                SyntaxErrorKind::ExpectedSeparator,
                "Expected ',' or ')'",
                input,
            )
            .into());
        };

        node = Node::apply(node, args);
        input = skip_space(rest);
    }

    Ok((node, input))
}

/// Parse a complete program, which must be exactly one expression.
pub fn parse(program: &str) -> Result<Node, Error> {
    let (node, rest) = parse_expression(program)?;
    let rest = skip_space(rest);
    if !rest.is_empty() {
        return Err(SyntaxError::at(
            SyntaxErrorKind::TrailingContent,
            "Unexpected text after program",
            rest,
        )
        .into());
    }
    tracing::trace!(%node, "parsed program");
    Ok(node)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Node),                 // Parsing should succeed with this tree
        SpecificError(SyntaxErrorKind), // Parsing should fail with this kind of syntax error
    }
    use ParseTestResult::*;

    fn w(name: &str) -> Node {
        Node::word(name)
    }

    fn n(value: f64) -> Node {
        Node::number(value)
    }

    fn call(operator: &str, args: Vec<Node>) -> Node {
        Node::apply(Node::word(operator), args)
    }

    /// Run parse tests, checking that every successful parse survives printing and re-parsing
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{}", i + 1);
            let result = parse(input);

            match (result, expected) {
                (Ok(actual), Success(expected_node)) => {
                    assert_eq!(actual, *expected_node, "{test_id}: tree mismatch for {input:?}");

                    let printed = actual.to_string();
                    let reparsed = parse(&printed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{printed}': {e}")
                    });
                    assert_eq!(reparsed, actual, "{test_id}: round-trip mismatch for {input:?}");
                }
                (Err(Error::Syntax(err)), SpecificError(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: wrong error for {input:?}: {err}");
                }
                (Err(err), SpecificError(kind)) => {
                    panic!("{test_id}: expected {kind:?}, got non-syntax error {err}");
                }
                (Ok(actual), SpecificError(kind)) => {
                    panic!("{test_id}: expected {kind:?}, got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success for {input:?}, got error {err}");
                }
            }
        }
    }

    #[test]
    fn test_parser_atoms() {
        let huge_literal = "9".repeat(400);
        let long_literal = "9".repeat(300);

        run_parse_tests(vec![
            (long_literal.as_str(), Success(n(long_literal.parse().unwrap()))),
            ("42", Success(n(42.0))),
            ("007", Success(n(7.0))),
            ("  x  ", Success(w("x"))),
            ("\"hello world\"", Success(Node::string("hello world"))),
            ("\"\"", Success(Node::string(""))),
            ("\"multi\nline\"", Success(Node::string("multi\nline"))),
            // Anything outside the delimiters is a word character
            ("+", Success(w("+"))),
            ("<=>", Success(w("<=>"))),
            ("a#b", Success(w("a#b"))),
            ("12abc", Success(w("12abc"))),
            ("x_1", Success(w("x_1"))),
            ("é", Success(w("é"))),
            ("# hello\nx", Success(w("x"))),
            // Failures
            ("", SpecificError(SyntaxErrorKind::UnexpectedSyntax)),
            ("   # only a comment", SpecificError(SyntaxErrorKind::UnexpectedSyntax)),
            (")", SpecificError(SyntaxErrorKind::UnexpectedSyntax)),
            ("\"unterminated", SpecificError(SyntaxErrorKind::UnexpectedSyntax)),
            ("12.5", SpecificError(SyntaxErrorKind::TrailingContent)),
            // Too large for a finite number, and not a word either
            (huge_literal.as_str(), SpecificError(SyntaxErrorKind::UnexpectedSyntax)),
            ("a b", SpecificError(SyntaxErrorKind::TrailingContent)),
        ]);
    }

    #[test]
    fn test_parser_applications() {
        run_parse_tests(vec![
            ("f()", Success(call("f", vec![]))),
            ("f ( )", Success(call("f", vec![]))),
            ("+(a, 10)", Success(call("+", vec![w("a"), n(10.0)]))),
            ("+(a,10)", Success(call("+", vec![w("a"), n(10.0)]))),
            ("f(a,)", Success(call("f", vec![w("a")]))),
            ("a # one\n   # two\n()", Success(call("a", vec![]))),
            (
                "f(4)(5)",
                Success(Node::apply(call("f", vec![n(4.0)]), vec![n(5.0)])),
            ),
            (
                "f(1)\n(2)\n(3)",
                Success(Node::apply(
                    Node::apply(call("f", vec![n(1.0)]), vec![n(2.0)]),
                    vec![n(3.0)],
                )),
            ),
            (
                "\"str\"(1)",
                Success(Node::apply(Node::string("str"), vec![n(1.0)])),
            ),
            (
                "do(define(x, 10),\n   if(>(x, 5),\n      print(\"large\"),\n      print(\"small\")))",
                Success(call(
                    "do",
                    vec![
                        call("define", vec![w("x"), n(10.0)]),
                        call(
                            "if",
                            vec![
                                call(">", vec![w("x"), n(5.0)]),
                                call("print", vec![Node::string("large")]),
                                call("print", vec![Node::string("small")]),
                            ],
                        ),
                    ],
                )),
            ),
            // Failures
            ("f(a b)", SpecificError(SyntaxErrorKind::ExpectedSeparator)),
            ("f(a", SpecificError(SyntaxErrorKind::ExpectedSeparator)),
            ("f(", SpecificError(SyntaxErrorKind::ExpectedSeparator)),
            ("f(,)", SpecificError(SyntaxErrorKind::UnexpectedSyntax)),
            ("f(a))", SpecificError(SyntaxErrorKind::TrailingContent)),
        ]);
    }

    #[test]
    fn test_parse_expression_returns_remainder() {
        let (node, rest) = parse_expression("  +(1, 2) tail").unwrap();
        assert_eq!(node, call("+", vec![n(1.0), n(2.0)]));
        assert_eq!(rest, "tail");

        let (node, rest) = parse_apply(w("g"), " no call").unwrap();
        assert_eq!(node, w("g"));
        assert_eq!(rest, "no call");
    }

    #[test]
    fn test_skip_space() {
        assert_eq!(skip_space("  \t\n x"), "x");
        assert_eq!(skip_space("# a\n# b\r\n  y # c"), "y # c");
        assert_eq!(skip_space("#"), "");
        assert_eq!(skip_space("z"), "z");
    }

    #[test]
    fn test_parser_depth_limits() {
        let nested = |depth: usize| format!("{}1{}", "f(".repeat(depth), ")".repeat(depth));
        let chained = |depth: usize| format!("f{}", "()".repeat(depth));
        let at_limit = nested(MAX_PARSE_DEPTH);
        let over_limit = nested(MAX_PARSE_DEPTH + 1);
        let chain_at_limit = chained(MAX_PARSE_DEPTH);
        let chain_over_limit = chained(MAX_PARSE_DEPTH + 1);

        for (i, (input, ok)) in [
            (&at_limit, true),
            (&over_limit, false),
            (&chain_at_limit, true),
            (&chain_over_limit, false),
        ]
        .into_iter()
        .enumerate()
        {
            match parse(input) {
                Ok(_) => assert!(ok, "case #{}: expected TooDeep", i + 1),
                Err(Error::Syntax(err)) => {
                    assert!(!ok, "case #{}: unexpected error {err}", i + 1);
                    assert_eq!(err.kind, SyntaxErrorKind::TooDeep, "case #{}", i + 1);
                }
                Err(err) => panic!("case #{}: expected a syntax error, got {err}", i + 1),
            }
        }

        // A much deeper input fails cleanly as well
        let Err(Error::Syntax(err)) = parse(&nested(50_000)) else {
            panic!("expected a syntax error");
        };
        assert_eq!(err.kind, SyntaxErrorKind::TooDeep);
    }

    #[test]
    fn test_error_context() {
        let Err(Error::Syntax(err)) = parse("f(a b)") else {
            panic!("expected a syntax error");
        };
        assert_eq!(err.context.as_deref(), Some("b)"));
        assert_eq!(err.to_string(), "Expected ',' or ')' near 'b)'");
    }
}
