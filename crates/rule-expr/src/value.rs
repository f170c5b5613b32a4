//! Runtime values and their comparison semantics
//!
//! Booleans participate in numeric comparison as 0/1, so `active == 1` holds
//! for an active record. Ordering across unrelated types is an evaluation
//! error, never a silent `false`.

use std::fmt;

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Equality with numeric coercion between bool, int and float
    pub fn loose_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b;
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => false,
        }
    }

    /// `self < other`, `self <= other` and friends.
    ///
    /// Returns `Ok(false)` for unordered floats (NaN) and an error for
    /// incomparable types.
    pub fn ordered(&self, other: &Value, op: OrderOp) -> Result<bool, ExprError> {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            return Ok(op.holds(a.cmp(&b)));
        }
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.partial_cmp(&b).map(|ord| op.holds(ord)).unwrap_or(false));
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(op.holds(a.as_str().cmp(b.as_str()))),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                // Lexicographic: first differing element decides, then length.
                for (x, y) in a.iter().zip(b) {
                    if !x.loose_eq(y) {
                        return x.ordered(y, op);
                    }
                }
                Ok(op.holds(a.len().cmp(&b.len())))
            }
            _ => Err(ExprError::Evaluation {
                message: format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    self.type_name(),
                    other.type_name()
                ),
            }),
        }
    }

    /// Membership test: `self in container`
    pub fn is_member_of(&self, container: &Value) -> Result<bool, ExprError> {
        match container {
            Value::List(items) | Value::Tuple(items) => {
                Ok(items.iter().any(|item| item.loose_eq(self)))
            }
            Value::Str(haystack) => match self {
                Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
                other => Err(ExprError::Evaluation {
                    message: format!(
                        "'in <string>' requires string as left operand, not {}",
                        other.type_name()
                    ),
                }),
            },
            other => Err(ExprError::Evaluation {
                message: format!("argument of type '{}' is not iterable", other.type_name()),
            }),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map(Value::Str).unwrap_or(Value::None)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Value::List(values.into_iter().map(Value::Str).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Ordering comparisons supported by [`Value::ordered`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOp {
    Lt,
    LtE,
    Gt,
    GtE,
}

impl OrderOp {
    fn holds(&self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering as O;
        match self {
            OrderOp::Lt => ord == O::Less,
            OrderOp::LtE => ord != O::Greater,
            OrderOp::Gt => ord == O::Greater,
            OrderOp::GtE => ord != O::Less,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            OrderOp::Lt => "<",
            OrderOp::LtE => "<=",
            OrderOp::Gt => ">",
            OrderOp::GtE => ">=",
        }
    }
}
