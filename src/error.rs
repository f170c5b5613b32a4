//! Error handling for the directory-rule pipeline
//!
//! Every failure a caller can see is a [`DlError`]. Collaborator failures
//! (directory store, statistical models) are wrapped into
//! [`DlError::CollaboratorFailure`] so their raw error types never leak.

use rule_expr::ExprError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::StoreError;
use crate::nlp::ModelError;

/// Main error type for parsing, proposing and applying rules
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DlError {
    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("Unsupported rule type supplied: '{0}'.")]
    UnknownRuleType(String),

    #[error("{0}")]
    MalformedRuleValue(String),

    #[error("Group not found: '{0}'.")]
    GroupNotFound(String),

    #[error("Employee record not found: '{0}'.")]
    EmployeeNotFound(String),

    #[error("No changes detected for the selected employee.")]
    NoChangesDetected,

    #[error("Diff not found: '{0}'.")]
    DiffNotFound(String),

    #[error("Diff '{0}' has already been applied.")]
    DiffAlreadyApplied(String),

    #[error("Unsupported action supplied: '{0}'.")]
    UnsupportedAction(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Collaborator failure: {0}")]
    CollaboratorFailure(String),
}

impl From<StoreError> for DlError {
    fn from(error: StoreError) -> Self {
        DlError::CollaboratorFailure(error.to_string())
    }
}

impl From<ModelError> for DlError {
    fn from(error: ModelError) -> Self {
        DlError::CollaboratorFailure(error.to_string())
    }
}

/// Stable classification of [`DlError`] for callers and wire payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidSyntax,
    UnsupportedConstruct,
    NonBooleanResult,
    EvaluationFailed,
    UnknownRuleType,
    MalformedRuleValue,
    GroupNotFound,
    EmployeeNotFound,
    NoChangesDetected,
    DiffNotFound,
    DiffAlreadyApplied,
    UnsupportedAction,
    InvalidRequest,
    CollaboratorFailure,
}

impl DlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DlError::Expression(ExprError::InvalidSyntax { .. }) => ErrorKind::InvalidSyntax,
            DlError::Expression(ExprError::UnsupportedConstruct(_)) => {
                ErrorKind::UnsupportedConstruct
            }
            DlError::Expression(ExprError::NonBoolean) => ErrorKind::NonBooleanResult,
            DlError::Expression(ExprError::Evaluation { .. }) => ErrorKind::EvaluationFailed,
            DlError::Expression(ExprError::Empty) => ErrorKind::MalformedRuleValue,
            DlError::UnknownRuleType(_) => ErrorKind::UnknownRuleType,
            DlError::MalformedRuleValue(_) => ErrorKind::MalformedRuleValue,
            DlError::GroupNotFound(_) => ErrorKind::GroupNotFound,
            DlError::EmployeeNotFound(_) => ErrorKind::EmployeeNotFound,
            DlError::NoChangesDetected => ErrorKind::NoChangesDetected,
            DlError::DiffNotFound(_) => ErrorKind::DiffNotFound,
            DlError::DiffAlreadyApplied(_) => ErrorKind::DiffAlreadyApplied,
            DlError::UnsupportedAction(_) => ErrorKind::UnsupportedAction,
            DlError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            DlError::CollaboratorFailure(_) => ErrorKind::CollaboratorFailure,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        }
    }
}

/// `{error}` payload returned in place of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

pub type DlResult<T> = Result<T, DlError>;
