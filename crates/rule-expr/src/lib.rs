//! rule-expr: restricted boolean expressions over directory records
//!
//! The language is the rule surface for dynamic group memberships:
//!
//! ```text
//! employmentType == "Contractor" and tenureDays <= 30
//! contains(tags, "HSE") or location in ["Houston HQ", "Remote"]
//! ```
//!
//! Compilation is two-stage:
//! 1. `parser` turns text into a generic [`SyntaxNode`] tree (syntax errors
//!    carry the nom diagnostic).
//! 2. `validator` converts that tree into the closed [`Expr`] AST, refusing
//!    any construct, field or call outside the whitelist.
//!
//! Only an [`Expr`] can be evaluated, so text that failed either stage never
//! reaches the evaluator.

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod validator;
pub mod value;

use std::collections::HashMap;

pub use ast::{Expr, Field, SyntaxNode};
pub use error::{ExprError, Unsupported};
pub use eval::FieldResolver;
pub use parser::parse_expression;
pub use validator::validate;
pub use value::Value;

/// A validated expression ready for repeated evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    expr: Expr,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against one record; anything but a boolean is an error.
    pub fn evaluate(&self, record: &dyn FieldResolver) -> Result<bool, ExprError> {
        match self.expr.evaluate(record)? {
            Value::Bool(result) => Ok(result),
            other => {
                tracing::debug!(
                    expression = %self.source,
                    result = %other,
                    "expression produced a non-boolean result"
                );
                Err(ExprError::NonBoolean)
            }
        }
    }
}

/// Parse and validate expression source.
///
/// Surrounding whitespace is ignored; empty input is rejected.
pub fn compile(source: &str) -> Result<CompiledExpression, ExprError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(ExprError::Empty);
    }
    let tree = parse_expression(source)?;
    let expr = validate(&tree)?;
    tracing::debug!(expression = %source, fields = ?expr.referenced_fields(), "compiled expression");
    Ok(CompiledExpression {
        source: source.to_string(),
        expr,
    })
}

/// Map-backed [`FieldResolver`] applying the record defaults for missing fields
#[derive(Debug, Clone, Default)]
pub struct RecordValues {
    values: HashMap<Field, Value>,
}

impl RecordValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    /// Default value of a field that is absent from the record
    pub fn default_for(field: Field) -> Value {
        match field {
            Field::Tags | Field::DirectoryGroups => Value::List(Vec::new()),
            Field::TenureDays => Value::Int(0),
            Field::Active => Value::Bool(true),
            _ => Value::None,
        }
    }
}

impl FieldResolver for RecordValues {
    fn resolve(&self, field: Field) -> Value {
        self.values
            .get(&field)
            .cloned()
            .unwrap_or_else(|| RecordValues::default_for(field))
    }
}
