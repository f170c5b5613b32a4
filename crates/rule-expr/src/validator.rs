//! Whitelist validation: generic syntax tree -> closed [`Expr`]
//!
//! Walks the tree depth-first, left to right, and stops at the first node
//! that is not part of the executable grammar. Field references must come
//! from [`Field::ALL`]; the only callable is `contains(collection, value)`.

use crate::ast::{
    CompareOperator, Comparison, Constant, Expr, Field, SequenceKind, SyntaxNode,
    UnaryOperator,
};
use crate::error::Unsupported;
use crate::value::Value;

/// Name of the single builtin function
pub const CONTAINS: &str = "contains";

pub fn validate(node: &SyntaxNode) -> Result<Expr, Unsupported> {
    match node {
        SyntaxNode::Name(name) => Field::from_name(name)
            .map(Expr::Field)
            .ok_or_else(|| Unsupported::Field(name.clone())),

        SyntaxNode::Constant(constant) => Ok(Expr::Literal(literal(constant))),

        SyntaxNode::List(items) => sequence(SequenceKind::List, items),
        SyntaxNode::Tuple(items) => sequence(SequenceKind::Tuple, items),

        SyntaxNode::BoolOp { op, values } => Ok(Expr::BoolOp {
            op: *op,
            operands: values.iter().map(validate).collect::<Result<_, _>>()?,
        }),

        SyntaxNode::UnaryOp {
            op: UnaryOperator::Not,
            operand,
        } => Ok(Expr::Not(Box::new(validate(operand)?))),
        SyntaxNode::UnaryOp { op, .. } => Err(Unsupported::Node(op.construct_name())),

        SyntaxNode::Compare { left, chain } => {
            let left = validate(left)?;
            let ops = chain
                .iter()
                .map(|(op, _)| comparison(*op))
                .collect::<Result<Vec<_>, _>>()?;
            let rights = chain
                .iter()
                .map(|(_, right)| validate(right))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Compare {
                left: Box::new(left),
                chain: ops.into_iter().zip(rights).collect(),
            })
        }

        SyntaxNode::Call {
            func,
            args,
            keywords,
        } => {
            if !matches!(func.as_ref(), SyntaxNode::Name(name) if name == CONTAINS) {
                return Err(Unsupported::Call);
            }
            if args.len() != 2 {
                return Err(Unsupported::ContainsArity(args.len()));
            }
            if !keywords.is_empty() {
                return Err(Unsupported::Node("keyword"));
            }
            Ok(Expr::Contains {
                collection: Box::new(validate(&args[0])?),
                item: Box::new(validate(&args[1])?),
            })
        }

        SyntaxNode::BinOp { left, op, .. } => {
            validate(left)?;
            Err(Unsupported::Node(op.construct_name()))
        }

        SyntaxNode::Attribute { .. } => Err(Unsupported::Node("Attribute")),
        SyntaxNode::Subscript { .. } => Err(Unsupported::Node("Subscript")),
        SyntaxNode::Set(_) => Err(Unsupported::Node("Set")),
        SyntaxNode::Dict(_) => Err(Unsupported::Node("Dict")),
    }
}

fn sequence(kind: SequenceKind, items: &[SyntaxNode]) -> Result<Expr, Unsupported> {
    Ok(Expr::Sequence {
        kind,
        items: items.iter().map(validate).collect::<Result<_, _>>()?,
    })
}

fn literal(constant: &Constant) -> Value {
    match constant {
        Constant::Str(s) => Value::Str(s.clone()),
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Bool(b) => Value::Bool(*b),
        Constant::None => Value::None,
    }
}

fn comparison(op: CompareOperator) -> Result<Comparison, Unsupported> {
    match op {
        CompareOperator::Eq => Ok(Comparison::Eq),
        CompareOperator::NotEq => Ok(Comparison::NotEq),
        CompareOperator::Lt => Ok(Comparison::Lt),
        CompareOperator::LtE => Ok(Comparison::LtE),
        CompareOperator::Gt => Ok(Comparison::Gt),
        CompareOperator::GtE => Ok(Comparison::GtE),
        CompareOperator::In => Ok(Comparison::In),
        CompareOperator::NotIn => Ok(Comparison::NotIn),
        CompareOperator::Is => Err(Unsupported::Node("Is")),
        CompareOperator::IsNot => Err(Unsupported::Node("IsNot")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn check(source: &str) -> Result<Expr, Unsupported> {
        validate(&parse_expression(source).expect("parses"))
    }

    #[test]
    fn test_accepts_whitelisted_grammar() {
        for source in [
            "active == 1",
            "employmentType == \"Contractor\" and tenureDays <= 30",
            "location in [\"Houston HQ\", \"Remote\"]",
            "role not in ('Intern',)",
            "not (active and contains(tags, \"HSE\"))",
            "contains(directoryGroups, \"DL_Corporate_IT\") or orgUnit != None",
            "90 <= tenureDays <= 180",
        ] {
            assert!(check(source).is_ok(), "rejected {source:?}: {:?}", check(source));
        }
    }

    #[test]
    fn test_rejects_import_call() {
        assert_eq!(check("__import__('os')"), Err(Unsupported::Call));
        assert_eq!(
            check("__import__('os').system('ls')"),
            Err(Unsupported::Node("Attribute"))
        );
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert_eq!(
            check("salary > 100"),
            Err(Unsupported::Field("salary".to_string()))
        );
        assert_eq!(
            check("contains == 1"),
            Err(Unsupported::Field("contains".to_string()))
        );
    }

    #[test]
    fn test_rejects_other_calls_and_bad_arity() {
        assert_eq!(check("len(tags) > 1"), Err(Unsupported::Call));
        assert_eq!(check("tags.count('x')"), Err(Unsupported::Call));
        assert_eq!(check("contains(tags)"), Err(Unsupported::ContainsArity(1)));
        assert_eq!(
            check("contains(tags, 'a', 'b')"),
            Err(Unsupported::ContainsArity(3))
        );
        assert_eq!(
            check("contains(tags, x='a', y='b')"),
            Err(Unsupported::ContainsArity(0))
        );
    }

    #[test]
    fn test_contains_arguments_are_validated() {
        assert_eq!(
            check("contains(secrets, 'a')"),
            Err(Unsupported::Field("secrets".to_string()))
        );
    }

    #[test]
    fn test_rejects_non_grammar_nodes() {
        assert_eq!(check("tags[0] == 'x'"), Err(Unsupported::Node("Subscript")));
        assert_eq!(check("tenureDays + 30 > 100"), Err(Unsupported::Node("Add")));
        assert_eq!(check("tenureDays > -1"), Err(Unsupported::Node("USub")));
        assert_eq!(check("manager is None"), Err(Unsupported::Node("Is")));
        assert_eq!(check("{'a': 1}"), Err(Unsupported::Node("Dict")));
        assert_eq!(check("{'a'}"), Err(Unsupported::Node("Set")));
    }

    #[test]
    fn test_unknown_field_reported_before_operator() {
        assert_eq!(
            check("bogus + 1"),
            Err(Unsupported::Field("bogus".to_string()))
        );
    }
}
