//! Syntax trees for membership rule expressions
//!
//! Two trees live here:
//!
//! - [`SyntaxNode`] is what the parser produces. It is deliberately wider than
//!   the executable grammar (attribute access, subscripts, arithmetic, arbitrary
//!   calls) so that rejected input is reported as an unsupported construct
//!   rather than a confusing syntax error.
//! - [`Expr`] is the closed, executable AST. Only the validator can build one,
//!   and the evaluator only knows how to walk these variants.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

// ============================================================================
// Generic syntax tree
// ============================================================================

/// Literal constant as written in source
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
    Pos,
    Invert,
}

impl UnaryOperator {
    /// Construct name used in validation errors
    pub fn construct_name(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "Not",
            UnaryOperator::Neg => "USub",
            UnaryOperator::Pos => "UAdd",
            UnaryOperator::Invert => "Invert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOperator {
    pub fn construct_name(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "Add",
            BinaryOperator::Sub => "Sub",
            BinaryOperator::Mul => "Mult",
            BinaryOperator::Div => "Div",
            BinaryOperator::FloorDiv => "FloorDiv",
            BinaryOperator::Mod => "Mod",
            BinaryOperator::Pow => "Pow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

/// Parser output. Anything the grammar can spell, including constructs the
/// validator will refuse.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    Name(String),
    Constant(Constant),
    List(Vec<SyntaxNode>),
    Tuple(Vec<SyntaxNode>),
    Set(Vec<SyntaxNode>),
    Dict(Vec<(SyntaxNode, SyntaxNode)>),
    BoolOp {
        op: BoolOperator,
        values: Vec<SyntaxNode>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<SyntaxNode>,
    },
    BinOp {
        left: Box<SyntaxNode>,
        op: BinaryOperator,
        right: Box<SyntaxNode>,
    },
    Compare {
        left: Box<SyntaxNode>,
        chain: Vec<(CompareOperator, SyntaxNode)>,
    },
    Call {
        func: Box<SyntaxNode>,
        args: Vec<SyntaxNode>,
        keywords: Vec<(String, SyntaxNode)>,
    },
    Attribute {
        value: Box<SyntaxNode>,
        attr: String,
    },
    Subscript {
        value: Box<SyntaxNode>,
        index: Box<SyntaxNode>,
    },
}

// ============================================================================
// Closed executable AST
// ============================================================================

/// The ten record attributes an expression may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    EmploymentType,
    Location,
    Role,
    Department,
    Tags,
    DirectoryGroups,
    Manager,
    TenureDays,
    OrgUnit,
    Active,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::EmploymentType,
        Field::Location,
        Field::Role,
        Field::Department,
        Field::Tags,
        Field::DirectoryGroups,
        Field::Manager,
        Field::TenureDays,
        Field::OrgUnit,
        Field::Active,
    ];

    /// Name as written in expressions and record documents
    pub fn name(&self) -> &'static str {
        match self {
            Field::EmploymentType => "employmentType",
            Field::Location => "location",
            Field::Role => "role",
            Field::Department => "department",
            Field::Tags => "tags",
            Field::DirectoryGroups => "directoryGroups",
            Field::Manager => "manager",
            Field::TenureDays => "tenureDays",
            Field::OrgUnit => "orgUnit",
            Field::Active => "active",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    NotEq,
    Gt,
    GtE,
    Lt,
    LtE,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    List,
    Tuple,
}

/// Validated expression. No other node kinds exist at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Field(Field),
    Sequence {
        kind: SequenceKind,
        items: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        chain: Vec<(Comparison, Expr)>,
    },
    BoolOp {
        op: BoolOperator,
        operands: Vec<Expr>,
    },
    Not(Box<Expr>),
    Contains {
        collection: Box<Expr>,
        item: Box<Expr>,
    },
}

impl Expr {
    /// Fields referenced anywhere in the expression, in first-seen order
    pub fn referenced_fields(&self) -> Vec<Field> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<Field>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Field(field) => {
                if !out.contains(field) {
                    out.push(*field);
                }
            }
            Expr::Sequence { items, .. } => items.iter().for_each(|item| item.collect_fields(out)),
            Expr::Compare { left, chain } => {
                left.collect_fields(out);
                chain.iter().for_each(|(_, right)| right.collect_fields(out));
            }
            Expr::BoolOp { operands, .. } => {
                operands.iter().for_each(|operand| operand.collect_fields(out))
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::Contains { collection, item } => {
                collection.collect_fields(out);
                item.collect_fields(out);
            }
        }
    }
}
