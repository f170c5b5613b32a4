//! Evaluation of validated expressions against one record

use crate::ast::{BoolOperator, Comparison, Expr, Field, SequenceKind};
use crate::error::ExprError;
use crate::value::{OrderOp, Value};

/// Supplies field values for a single record.
///
/// Implementations apply the record defaults themselves (empty lists for
/// unset collections, 0 for unset tenure, `true` for unset active flag).
pub trait FieldResolver {
    fn resolve(&self, field: Field) -> Value;
}

impl Expr {
    pub fn evaluate(&self, record: &dyn FieldResolver) -> Result<Value, ExprError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Field(field) => Ok(record.resolve(*field)),
            Expr::Sequence { kind, items } => {
                let values = items
                    .iter()
                    .map(|item| item.evaluate(record))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match kind {
                    SequenceKind::List => Value::List(values),
                    SequenceKind::Tuple => Value::Tuple(values),
                })
            }
            Expr::Compare { left, chain } => {
                let mut current = left.evaluate(record)?;
                for (op, right) in chain {
                    let right = right.evaluate(record)?;
                    if !compare(*op, &current, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    current = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::BoolOp { op, operands } => {
                // Short-circuit and return the deciding operand, not a coerced bool.
                let mut last = Value::Bool(matches!(op, BoolOperator::And));
                for operand in operands {
                    last = operand.evaluate(record)?;
                    let decided = match op {
                        BoolOperator::And => !last.is_truthy(),
                        BoolOperator::Or => last.is_truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Not(inner) => Ok(Value::Bool(!inner.evaluate(record)?.is_truthy())),
            Expr::Contains { collection, item } => {
                let collection = collection.evaluate(record)?;
                let item = item.evaluate(record)?;
                if !collection.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(item.is_member_of(&collection)?))
            }
        }
    }
}

fn compare(op: Comparison, left: &Value, right: &Value) -> Result<bool, ExprError> {
    match op {
        Comparison::Eq => Ok(left.loose_eq(right)),
        Comparison::NotEq => Ok(!left.loose_eq(right)),
        Comparison::Lt => left.ordered(right, OrderOp::Lt),
        Comparison::LtE => left.ordered(right, OrderOp::LtE),
        Comparison::Gt => left.ordered(right, OrderOp::Gt),
        Comparison::GtE => left.ordered(right, OrderOp::GtE),
        Comparison::In => left.is_member_of(right),
        Comparison::NotIn => left.is_member_of(right).map(|found| !found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, RecordValues};

    fn record() -> RecordValues {
        RecordValues::new()
            .with(Field::EmploymentType, "Contractor")
            .with(Field::Location, "Houston HQ")
            .with(Field::Tags, vec!["HSE".to_string(), "Responder".to_string()])
            .with(Field::TenureDays, 120_i64)
            .with(Field::Active, true)
    }

    fn eval(source: &str) -> Value {
        compile(source)
            .expect("compiles")
            .expr()
            .evaluate(&record())
            .expect("evaluates")
    }

    #[test]
    fn test_and_or_return_deciding_operand() {
        assert_eq!(eval("tenureDays and location"), Value::Str("Houston HQ".into()));
        assert_eq!(eval("orgUnit or tenureDays"), Value::Int(120));
        assert_eq!(eval("orgUnit and tenureDays"), Value::None);
    }

    #[test]
    fn test_chained_comparison_short_circuits() {
        assert_eq!(eval("90 <= tenureDays <= 180"), Value::Bool(true));
        assert_eq!(eval("200 <= tenureDays <= 'x'"), Value::Bool(false));
    }

    #[test]
    fn test_contains_on_missing_collection_is_false() {
        assert_eq!(eval("contains(directoryGroups, 'DL_X')"), Value::Bool(false));
        assert_eq!(eval("contains(tags, 'HSE')"), Value::Bool(true));
        assert_eq!(eval("contains(location, 'Houston')"), Value::Bool(true));
    }

    #[test]
    fn test_in_tuple() {
        assert_eq!(eval("location in ('Remote', 'Houston HQ')"), Value::Bool(true));
        assert_eq!(eval("location not in ['Remote']"), Value::Bool(true));
    }

    #[test]
    fn test_type_errors_surface() {
        let compiled = compile("location > 5").unwrap();
        let err = compiled.expr().evaluate(&record()).unwrap_err();
        assert!(matches!(err, ExprError::Evaluation { .. }));
    }
}
