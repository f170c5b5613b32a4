//! Rule vocabulary and population matching
//!
//! A rule names a population of directory records: one of twelve rule types
//! plus a value (or an expression). [`RuleMatcher`] turns a rule into the
//! matching records through the directory store.

pub mod matcher;
pub mod saved_filters;

pub use matcher::{RuleMatcher, TenureWindow};
pub use saved_filters::{find_saved_filter, SavedFilter, SAVED_FILTERS};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DlError;

// ============================================================================
// Rule types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleType {
    User,
    Tree,
    Location,
    Role,
    EmploymentType,
    Tag,
    DirectoryGroup,
    TenureWindow,
    Manager,
    SavedFilter,
    Expression,
    EmployeeRecord,
}

impl RuleType {
    pub const ALL: [RuleType; 12] = [
        RuleType::User,
        RuleType::Tree,
        RuleType::Location,
        RuleType::Role,
        RuleType::EmploymentType,
        RuleType::Tag,
        RuleType::DirectoryGroup,
        RuleType::TenureWindow,
        RuleType::Manager,
        RuleType::SavedFilter,
        RuleType::Expression,
        RuleType::EmployeeRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::User => "user",
            RuleType::Tree => "tree",
            RuleType::Location => "location",
            RuleType::Role => "role",
            RuleType::EmploymentType => "employment-type",
            RuleType::Tag => "tag",
            RuleType::DirectoryGroup => "directory-group",
            RuleType::TenureWindow => "tenure-window",
            RuleType::Manager => "manager",
            RuleType::SavedFilter => "saved-filter",
            RuleType::Expression => "expression",
            RuleType::EmployeeRecord => "employee-record",
        }
    }

    /// Display label shown in previews, audit entries and summaries
    pub fn label(&self) -> &'static str {
        match self {
            RuleType::User => "User",
            RuleType::Tree => "Org Unit",
            RuleType::Location => "Location",
            RuleType::Role => "Role / Job Title",
            RuleType::EmploymentType => "Employment Type",
            RuleType::Tag => "Tag / Attribute",
            RuleType::DirectoryGroup => "Directory Group",
            RuleType::TenureWindow => "Tenure Window",
            RuleType::Manager => "Manager / Team Lead",
            RuleType::SavedFilter => "Saved Filter",
            RuleType::Expression => "Dynamic Expression",
            RuleType::EmployeeRecord => "Employee Record",
        }
    }

    /// Rule types whose population is resolved again at apply time instead
    /// of trusting the ids recorded on the diff.
    pub fn reevaluates_live(&self) -> bool {
        matches!(self, RuleType::Expression | RuleType::User)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = DlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        RuleType::ALL
            .into_iter()
            .find(|rule_type| rule_type.as_str() == wanted)
            .ok_or_else(|| DlError::UnknownRuleType(s.trim().to_string()))
    }
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Remove,
    Edit,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Edit => "edit",
        }
    }

    /// Upper-case operation label used on change entries and audit rows
    pub fn op_label(&self) -> &'static str {
        match self {
            Action::Add => "ADD",
            Action::Remove => "REMOVE",
            Action::Edit => "EDIT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(Action::Add),
            "remove" => Ok(Action::Remove),
            "edit" => Ok(Action::Edit),
            other => Err(DlError::UnsupportedAction(other.to_string())),
        }
    }
}
