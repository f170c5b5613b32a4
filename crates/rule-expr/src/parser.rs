//! Nom parser for rule expressions
//!
//! Produces a generic [`SyntaxNode`] tree. The grammar follows conventional
//! boolean-expression precedence:
//!
//! ```text
//! expression := or_test
//! or_test    := and_test ("or" and_test)*
//! and_test   := not_test ("and" not_test)*
//! not_test   := "not" not_test | comparison
//! comparison := arith (comp_op arith)*
//! arith      := term (("+" | "-") term)*
//! term       := factor (("*" | "/" | "//" | "%") factor)*
//! factor     := ("-" | "+" | "~") factor | power
//! power      := postfix ["**" factor]
//! postfix    := atom (call | "." NAME | "[" expression "]")*
//! atom       := NAME | NUMBER | STRING+ | "(" ... ")" | "[" ... "]" | "{" ... "}"
//! ```
//!
//! Arithmetic, attribute access and the like are parsed only so the validator
//! can name them when it refuses them.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while},
    character::complete::{char, digit0, digit1, multispace0, none_of, one_of, satisfy},
    combinator::{all_consuming, cut, map, not, opt, recognize, value, verify},
    error::{context, convert_error, ContextError, ErrorKind, ParseError, VerboseError},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{
    BinaryOperator, BoolOperator, CompareOperator, Constant, SyntaxNode, UnaryOperator,
};
use crate::error::ExprError;

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

const RESERVED: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

// ============================================================================
// Public API
// ============================================================================

/// Parse expression source into a generic syntax tree
pub fn parse_expression(input: &str) -> Result<SyntaxNode, ExprError> {
    match all_consuming(terminated(expression, multispace0))(input) {
        Ok((_, node)) => Ok(node),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ExprError::InvalidSyntax {
            message: convert_error(input, e),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ExprError::InvalidSyntax {
            message: "Incomplete input".to_string(),
        }),
    }
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    preceded(multispace0, inner)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    ws(terminated(tag(kw), not(satisfy(is_ident_continue))))
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_continue)))(input)
}

// ============================================================================
// Boolean layer
// ============================================================================

fn expression(input: &str) -> PResult<'_, SyntaxNode> {
    or_test(input)
}

fn bool_chain(op: BoolOperator, first: SyntaxNode, rest: Vec<SyntaxNode>) -> SyntaxNode {
    if rest.is_empty() {
        return first;
    }
    let mut values = Vec::with_capacity(rest.len() + 1);
    values.push(first);
    values.extend(rest);
    SyntaxNode::BoolOp { op, values }
}

fn or_test(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, first) = and_test(input)?;
    let (input, rest) = many0(preceded(keyword("or"), cut(and_test)))(input)?;
    Ok((input, bool_chain(BoolOperator::Or, first, rest)))
}

fn and_test(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, first) = not_test(input)?;
    let (input, rest) = many0(preceded(keyword("and"), cut(not_test)))(input)?;
    Ok((input, bool_chain(BoolOperator::And, first, rest)))
}

fn not_test(input: &str) -> PResult<'_, SyntaxNode> {
    alt((
        map(preceded(keyword("not"), cut(not_test)), |operand| {
            SyntaxNode::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            }
        }),
        comparison,
    ))(input)
}

// ============================================================================
// Comparisons and arithmetic
// ============================================================================

fn comp_op(input: &str) -> PResult<'_, CompareOperator> {
    ws(alt((
        value(CompareOperator::Eq, tag("==")),
        value(CompareOperator::NotEq, tag("!=")),
        value(CompareOperator::GtE, tag(">=")),
        value(CompareOperator::LtE, tag("<=")),
        value(CompareOperator::Gt, char('>')),
        value(CompareOperator::Lt, char('<')),
        value(CompareOperator::NotIn, pair(keyword("not"), keyword("in"))),
        value(CompareOperator::In, keyword("in")),
        value(CompareOperator::IsNot, pair(keyword("is"), keyword("not"))),
        value(CompareOperator::Is, keyword("is")),
    )))(input)
}

fn comparison(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, left) = arith(input)?;
    let (input, chain) = many0(pair(comp_op, cut(arith)))(input)?;
    if chain.is_empty() {
        return Ok((input, left));
    }
    Ok((
        input,
        SyntaxNode::Compare {
            left: Box::new(left),
            chain,
        },
    ))
}

fn fold_binops(first: SyntaxNode, rest: Vec<(BinaryOperator, SyntaxNode)>) -> SyntaxNode {
    rest.into_iter()
        .fold(first, |left, (op, right)| SyntaxNode::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
}

fn arith(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOperator::Add, char('+')),
            value(BinaryOperator::Sub, char('-')),
        ))),
        cut(term),
    ))(input)?;
    Ok((input, fold_binops(first, rest)))
}

fn term(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOperator::FloorDiv, tag("//")),
            value(BinaryOperator::Div, char('/')),
            value(BinaryOperator::Mul, terminated(char('*'), not(char('*')))),
            value(BinaryOperator::Mod, char('%')),
        ))),
        cut(factor),
    ))(input)?;
    Ok((input, fold_binops(first, rest)))
}

fn factor(input: &str) -> PResult<'_, SyntaxNode> {
    alt((
        map(
            pair(
                ws(alt((
                    value(UnaryOperator::Neg, char('-')),
                    value(UnaryOperator::Pos, char('+')),
                    value(UnaryOperator::Invert, char('~')),
                ))),
                cut(factor),
            ),
            |(op, operand)| SyntaxNode::UnaryOp {
                op,
                operand: Box::new(operand),
            },
        ),
        power,
    ))(input)
}

fn power(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, base) = postfix(input)?;
    let (input, exponent) = opt(preceded(ws(tag("**")), cut(factor)))(input)?;
    Ok((
        input,
        match exponent {
            Some(exponent) => SyntaxNode::BinOp {
                left: Box::new(base),
                op: BinaryOperator::Pow,
                right: Box::new(exponent),
            },
            None => base,
        },
    ))
}

// ============================================================================
// Postfix trailers
// ============================================================================

enum Trailer {
    Call(Vec<SyntaxNode>, Vec<(String, SyntaxNode)>),
    Attribute(String),
    Subscript(SyntaxNode),
}

enum Argument {
    Positional(SyntaxNode),
    Keyword(String, SyntaxNode),
}

fn postfix(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, atom) = atom(input)?;
    let (input, trailers) = many0(trailer)(input)?;
    let node = trailers
        .into_iter()
        .fold(atom, |node, trailer| match trailer {
            Trailer::Call(args, keywords) => SyntaxNode::Call {
                func: Box::new(node),
                args,
                keywords,
            },
            Trailer::Attribute(attr) => SyntaxNode::Attribute {
                value: Box::new(node),
                attr,
            },
            Trailer::Subscript(index) => SyntaxNode::Subscript {
                value: Box::new(node),
                index: Box::new(index),
            },
        });
    Ok((input, node))
}

fn trailer(input: &str) -> PResult<'_, Trailer> {
    alt((
        map(call_arguments, |(args, keywords)| Trailer::Call(args, keywords)),
        map(preceded(ws(char('.')), cut(ws(identifier))), |attr: &str| {
            Trailer::Attribute(attr.to_string())
        }),
        map(
            delimited(ws(char('[')), cut(expression), cut(ws(char(']')))),
            Trailer::Subscript,
        ),
    ))(input)
}

fn call_arguments(input: &str) -> PResult<'_, (Vec<SyntaxNode>, Vec<(String, SyntaxNode)>)> {
    let (input, _) = ws(char('('))(input)?;
    let (input, items) = separated_list0(ws(char(',')), call_argument)(input)?;
    let (input, _) = opt(ws(char(',')))(input)?;
    let (input, _) = cut(context("closing parenthesis", ws(char(')'))))(input)?;

    let mut args = Vec::new();
    let mut keywords = Vec::new();
    for item in items {
        match item {
            Argument::Positional(node) => args.push(node),
            Argument::Keyword(name, node) => keywords.push((name, node)),
        }
    }
    Ok((input, (args, keywords)))
}

fn call_argument(input: &str) -> PResult<'_, Argument> {
    alt((
        map(
            pair(
                terminated(ws(identifier), ws(terminated(char('='), not(char('='))))),
                cut(expression),
            ),
            |(name, node)| Argument::Keyword(name.to_string(), node),
        ),
        map(expression, Argument::Positional),
    ))(input)
}

// ============================================================================
// Atoms
// ============================================================================

fn atom(input: &str) -> PResult<'_, SyntaxNode> {
    ws(alt((
        parenthesized,
        list_display,
        brace_display,
        map(many1(ws(string_literal)), |parts| {
            SyntaxNode::Constant(Constant::Str(parts.concat()))
        }),
        number,
        name_or_constant,
    )))(input)
}

fn parenthesized(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, _) = char('(')(input)?;
    let (input, mut items) = separated_list0(ws(char(',')), expression)(input)?;
    let (input, trailing) = opt(ws(char(',')))(input)?;
    let (input, _) = cut(context("closing parenthesis", ws(char(')'))))(input)?;
    if items.len() == 1 && trailing.is_none() {
        return Ok((input, items.remove(0)));
    }
    Ok((input, SyntaxNode::Tuple(items)))
}

fn list_display(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, _) = char('[')(input)?;
    let (input, items) = separated_list0(ws(char(',')), expression)(input)?;
    let (input, _) = opt(ws(char(',')))(input)?;
    let (input, _) = cut(context("closing bracket", ws(char(']'))))(input)?;
    Ok((input, SyntaxNode::List(items)))
}

fn brace_display(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, _) = char('{')(input)?;
    let (input, entries) = separated_list0(
        ws(char(',')),
        pair(expression, opt(preceded(ws(char(':')), cut(expression)))),
    )(input)?;
    let (input, _) = opt(ws(char(',')))(input)?;
    let (input, _) = cut(context("closing brace", ws(char('}'))))(input)?;

    if entries.is_empty() || entries.iter().any(|(_, v)| v.is_some()) {
        let pairs = entries
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or(SyntaxNode::Constant(Constant::None))))
            .collect();
        return Ok((input, SyntaxNode::Dict(pairs)));
    }
    Ok((
        input,
        SyntaxNode::Set(entries.into_iter().map(|(k, _)| k).collect()),
    ))
}

fn escape_char(input: &str) -> PResult<'_, char> {
    alt((
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        value('\0', char('0')),
        value('\\', char('\\')),
        value('\'', char('\'')),
        value('"', char('"')),
    ))(input)
}

fn quoted_string<'a>(quote: char) -> impl FnMut(&'a str) -> PResult<'a, String> {
    let forbidden = if quote == '"' { "\"\\\n" } else { "'\\\n" };
    move |input: &'a str| {
        let (input, _) = char(quote)(input)?;
        let (input, body) = opt(escaped_transform(none_of(forbidden), '\\', escape_char))(input)?;
        let (input, _) = cut(context("unterminated string literal", char(quote)))(input)?;
        Ok((input, body.unwrap_or_default()))
    }
}

fn string_literal(input: &str) -> PResult<'_, String> {
    alt((quoted_string('"'), quoted_string('\'')))(input)
}

fn number(input: &str) -> PResult<'_, SyntaxNode> {
    let (rest, text) = recognize(tuple((
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let (rest, _) = not(satisfy(is_ident_continue))(rest)?;

    let constant = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(Constant::Float).map_err(|_| {
            nom::Err::Failure(VerboseError::from_error_kind(input, ErrorKind::Float))
        })?
    } else {
        text.parse::<i64>().map(Constant::Int).map_err(|_| {
            nom::Err::Failure(VerboseError::add_context(
                input,
                "integer literal out of range",
                VerboseError::from_error_kind(input, ErrorKind::Digit),
            ))
        })?
    };
    Ok((rest, SyntaxNode::Constant(constant)))
}

fn name_or_constant(input: &str) -> PResult<'_, SyntaxNode> {
    let (input, name) = verify(identifier, |name: &str| !RESERVED.contains(&name))(input)?;
    let node = match name {
        "True" => SyntaxNode::Constant(Constant::Bool(true)),
        "False" => SyntaxNode::Constant(Constant::Bool(false)),
        "None" => SyntaxNode::Constant(Constant::None),
        other => SyntaxNode::Name(other.to_string()),
    };
    Ok((input, node))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(n: &str) -> SyntaxNode {
        SyntaxNode::Name(n.to_string())
    }

    fn string(s: &str) -> SyntaxNode {
        SyntaxNode::Constant(Constant::Str(s.to_string()))
    }

    fn int(i: i64) -> SyntaxNode {
        SyntaxNode::Constant(Constant::Int(i))
    }

    #[test]
    fn test_parse_simple_equality() {
        let node = parse_expression("location == \"Houston HQ\"").unwrap();
        assert_eq!(
            node,
            SyntaxNode::Compare {
                left: Box::new(name("location")),
                chain: vec![(CompareOperator::Eq, string("Houston HQ"))],
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let node = parse_expression("a or b and c").unwrap();
        assert_eq!(
            node,
            SyntaxNode::BoolOp {
                op: BoolOperator::Or,
                values: vec![
                    name("a"),
                    SyntaxNode::BoolOp {
                        op: BoolOperator::And,
                        values: vec![name("b"), name("c")],
                    },
                ],
            }
        );
    }

    #[test]
    fn test_flattens_repeated_connectives() {
        let node = parse_expression("a and b and c").unwrap();
        match node {
            SyntaxNode::BoolOp { op, values } => {
                assert_eq!(op, BoolOperator::And);
                assert_eq!(values.len(), 3);
            }
            other => panic!("expected BoolOp, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_comparison() {
        let node = parse_expression("90 <= tenureDays <= 180").unwrap();
        assert_eq!(
            node,
            SyntaxNode::Compare {
                left: Box::new(int(90)),
                chain: vec![
                    (CompareOperator::LtE, name("tenureDays")),
                    (CompareOperator::LtE, int(180)),
                ],
            }
        );
    }

    #[test]
    fn test_not_in_and_is_not() {
        let node = parse_expression("role not in ('A', 'B')").unwrap();
        match node {
            SyntaxNode::Compare { chain, .. } => {
                assert_eq!(chain[0].0, CompareOperator::NotIn);
                assert_eq!(chain[0].1, SyntaxNode::Tuple(vec![string("A"), string("B")]));
            }
            other => panic!("expected Compare, got {:?}", other),
        }

        let node = parse_expression("manager is not None").unwrap();
        match node {
            SyntaxNode::Compare { chain, .. } => assert_eq!(chain[0].0, CompareOperator::IsNot),
            other => panic!("expected Compare, got {:?}", other),
        }
    }

    #[test]
    fn test_not_prefix_vs_identifier() {
        let node = parse_expression("not active").unwrap();
        assert_eq!(
            node,
            SyntaxNode::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(name("active")),
            }
        );
        assert_eq!(parse_expression("nothing").unwrap(), name("nothing"));
    }

    #[test]
    fn test_call_with_positional_and_keyword_args() {
        let node = parse_expression("contains(tags, \"HSE\", strict=True)").unwrap();
        assert_eq!(
            node,
            SyntaxNode::Call {
                func: Box::new(name("contains")),
                args: vec![name("tags"), string("HSE")],
                keywords: vec![(
                    "strict".to_string(),
                    SyntaxNode::Constant(Constant::Bool(true))
                )],
            }
        );
    }

    #[test]
    fn test_attribute_subscript_and_arithmetic_parse() {
        assert!(matches!(
            parse_expression("tags.count").unwrap(),
            SyntaxNode::Attribute { .. }
        ));
        assert!(matches!(
            parse_expression("tags[0]").unwrap(),
            SyntaxNode::Subscript { .. }
        ));
        assert!(matches!(
            parse_expression("tenureDays + 1").unwrap(),
            SyntaxNode::BinOp {
                op: BinaryOperator::Add,
                ..
            }
        ));
        assert!(matches!(
            parse_expression("__import__('os').system('ls')").unwrap(),
            SyntaxNode::Call { .. }
        ));
    }

    #[test]
    fn test_string_escapes_and_concatenation() {
        assert_eq!(
            parse_expression(r#"'it\'s' "ok""#).unwrap(),
            string("it'sok")
        );
        assert_eq!(parse_expression(r#""a\tb""#).unwrap(), string("a\tb"));
        assert_eq!(parse_expression("''").unwrap(), string(""));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_expression("42").unwrap(), int(42));
        assert_eq!(
            parse_expression("1.5").unwrap(),
            SyntaxNode::Constant(Constant::Float(1.5))
        );
        assert_eq!(
            parse_expression("2e3").unwrap(),
            SyntaxNode::Constant(Constant::Float(2000.0))
        );
    }

    #[test]
    fn test_parenthesized_vs_tuple() {
        assert_eq!(parse_expression("(x)").unwrap(), name("x"));
        assert_eq!(
            parse_expression("(x,)").unwrap(),
            SyntaxNode::Tuple(vec![name("x")])
        );
        assert_eq!(parse_expression("()").unwrap(), SyntaxNode::Tuple(vec![]));
    }

    #[test]
    fn test_constants() {
        assert_eq!(
            parse_expression("True").unwrap(),
            SyntaxNode::Constant(Constant::Bool(true))
        );
        assert_eq!(
            parse_expression("None").unwrap(),
            SyntaxNode::Constant(Constant::None)
        );
    }

    #[test]
    fn test_syntax_errors() {
        for source in [
            "active ==",
            "tenureDays = 5",
            "location == \"Houston",
            "(a and b",
            "a b",
            "x if y else z",
            "12abc",
        ] {
            let err = parse_expression(source).unwrap_err();
            assert!(
                matches!(err, ExprError::InvalidSyntax { .. }),
                "expected syntax error for {source:?}, got {err:?}"
            );
        }
    }
}
