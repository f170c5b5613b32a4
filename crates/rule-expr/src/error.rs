//! Error types for expression compilation and evaluation

use thiserror::Error;

/// Whitelist violations found while validating a syntax tree
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Unsupported {
    #[error("Unsupported expression construct: {0}")]
    Node(&'static str),

    #[error("Unknown field '{0}' in expression.")]
    Field(String),

    #[error("Unsupported function call in expression.")]
    Call,

    #[error("contains() expects two arguments.")]
    ContainsArity(usize),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expression is required.")]
    Empty,

    #[error("Invalid expression syntax: {message}")]
    InvalidSyntax { message: String },

    #[error(transparent)]
    UnsupportedConstruct(#[from] Unsupported),

    #[error("Failed to evaluate expression: {message}")]
    Evaluation { message: String },

    #[error("Expression must evaluate to a boolean value.")]
    NonBoolean,
}
