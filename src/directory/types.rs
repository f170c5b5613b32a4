//! Directory documents
//!
//! Records, groups and memberships as the store hands them out, plus the
//! diff, audit and rule-event documents written by the change service.
//! Everything serializes camelCase to match the JSON contracts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rule_expr::{Field, FieldResolver, Value};
use serde::{Deserialize, Serialize};

use crate::rules::{Action, RuleType};

/// Flag written on every membership created by a rule
pub const INCLUDE_FLAG: &str = "Include";

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub directory_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenure_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl DirectoryRecord {
    fn text_field(&self, field: Field) -> Option<&String> {
        match field {
            Field::EmploymentType => self.employment_type.as_ref(),
            Field::Location => self.location.as_ref(),
            Field::Role => self.role.as_ref(),
            Field::Department => self.department.as_ref(),
            Field::Manager => self.manager.as_ref(),
            Field::OrgUnit => self.org_unit.as_ref(),
            Field::Tags | Field::DirectoryGroups | Field::TenureDays | Field::Active => None,
        }
    }

    fn text_field_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::EmploymentType => Some(&mut self.employment_type),
            Field::Location => Some(&mut self.location),
            Field::Role => Some(&mut self.role),
            Field::Department => Some(&mut self.department),
            Field::Manager => Some(&mut self.manager),
            Field::OrgUnit => Some(&mut self.org_unit),
            Field::Tags | Field::DirectoryGroups | Field::TenureDays | Field::Active => None,
        }
    }

    /// Scalar text value of a field (`None` for list fields)
    pub fn text(&self, field: Field) -> Option<&str> {
        self.text_field(field).map(String::as_str)
    }

    pub fn list(&self, field: Field) -> &[String] {
        match field {
            Field::Tags => &self.tags,
            Field::DirectoryGroups => &self.directory_groups,
            _ => &[],
        }
    }

    /// Stored value as JSON; unset fields are `null`.
    pub fn field_json(&self, field: Field) -> serde_json::Value {
        match field {
            Field::Tags | Field::DirectoryGroups => serde_json::json!(self.list(field)),
            Field::TenureDays => serde_json::json!(self.tenure_days),
            Field::Active => serde_json::json!(self.active),
            _ => serde_json::json!(self.text(field)),
        }
    }

    /// Write a JSON value into a field; `null` or a value of the wrong shape
    /// clears it.
    pub fn set_field_json(&mut self, field: Field, value: &serde_json::Value) {
        match field {
            Field::TenureDays => self.tenure_days = value.as_i64(),
            Field::Active => self.active = value.as_bool(),
            Field::Tags | Field::DirectoryGroups => {
                let items = value
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                match field {
                    Field::Tags => self.tags = items,
                    _ => self.directory_groups = items,
                }
            }
            _ => {
                if let Some(slot) = self.text_field_mut(field) {
                    *slot = value.as_str().map(str::to_string);
                }
            }
        }
    }

    pub fn clear_field(&mut self, field: Field) {
        self.set_field_json(field, &serde_json::Value::Null);
    }

    /// Matches the id, email or display name exactly
    pub fn is_referenced_by(&self, reference: &str) -> bool {
        self.id == reference
            || self.email.as_deref() == Some(reference)
            || self.display_name == reference
    }
}

/// Expression bindings with the unset defaults: empty lists, zero tenure,
/// active.
impl FieldResolver for DirectoryRecord {
    fn resolve(&self, field: Field) -> Value {
        match field {
            Field::Tags | Field::DirectoryGroups => Value::from(self.list(field).to_vec()),
            Field::TenureDays => Value::Int(self.tenure_days.unwrap_or(0)),
            Field::Active => Value::Bool(self.active.unwrap_or(true)),
            _ => Value::from(self.text(field).map(str::to_string)),
        }
    }
}

// ============================================================================
// Record queries
// ============================================================================

/// Predicate pushed down to the directory store
#[derive(Debug, Clone, PartialEq)]
pub enum UserFilter {
    All,
    Ids(Vec<String>),
    /// Display name or email
    Identity(String),
    FieldEquals(Field, String),
    /// Any of the fields equals the value
    AnyFieldEquals(Vec<Field>, String),
    /// List field contains the value
    HasElement(Field, String),
    /// Inclusive tenure range; records without a tenure never match
    TenureRange { min: i64, max: Option<i64> },
}

impl UserFilter {
    pub fn matches(&self, record: &DirectoryRecord) -> bool {
        match self {
            UserFilter::All => true,
            UserFilter::Ids(ids) => ids.contains(&record.id),
            UserFilter::Identity(value) => {
                record.display_name == *value || record.email.as_deref() == Some(value)
            }
            UserFilter::FieldEquals(field, value) => record.text(*field) == Some(value),
            UserFilter::AnyFieldEquals(fields, value) => fields
                .iter()
                .any(|field| record.text(*field) == Some(value)),
            UserFilter::HasElement(field, value) => record.list(*field).contains(value),
            UserFilter::TenureRange { min, max } => record
                .tenure_days
                .is_some_and(|days| days >= *min && max.map_or(true, |max| days <= max)),
        }
    }
}

// ============================================================================
// Groups and memberships
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub business_unit: String,
    #[serde(default)]
    pub description: String,
}

impl Group {
    pub fn is_referenced_by(&self, reference: &str) -> bool {
        self.id == reference || self.name == reference
    }
}

/// One user's membership in one group, keyed by `(user_id, group_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub rule_type: RuleType,
    pub rule_value: Option<String>,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub flag: String,
}

// ============================================================================
// Diffs
// ============================================================================

/// Before/after of one employee-record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: Field,
    pub label: String,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub before_display: String,
    pub after_display: String,
}

/// Field changes planned against one employee record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordChangePlan {
    pub target_user_id: String,
    pub target_user_email: Option<String>,
    pub target_user_name: String,
    pub set: BTreeMap<Field, serde_json::Value>,
    pub unset: Vec<Field>,
    pub fields: Vec<FieldChange>,
}

/// A proposed change. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub id: String,
    pub action: Action,
    pub rule_type: RuleType,
    pub rule_label: String,
    pub group_id: String,
    pub group_name: String,
    pub value: Option<String>,
    pub expression: Option<String>,
    /// Matched record ids at propose time
    pub matches: Vec<String>,
    pub match_count: usize,
    pub match_names: Vec<String>,
    pub policy_notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_change: Option<RecordChangePlan>,
}

// ============================================================================
// Audit and rule events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub label: String,
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// Count plus truncated names and rule labels for a set of memberships
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipTally {
    pub count: usize,
    pub names: Vec<String>,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTallies {
    pub before: MembershipTally,
    pub after: MembershipTally,
    pub added: MembershipTally,
    pub removed: MembershipTally,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecordDetail {
    pub user_id: String,
    pub user_display_name: String,
    pub user_email: Option<String>,
    pub changes: Vec<FieldChange>,
    pub set: BTreeMap<Field, serde_json::Value>,
    pub unset: Vec<Field>,
}

/// Append-only record of one apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub op: String,
    pub diff_id: String,
    pub group_id: String,
    pub group_name: String,
    pub rule: RuleSummary,
    pub before: Vec<Membership>,
    pub after: Vec<Membership>,
    pub summary: ChangeTallies,
    pub match_count: usize,
    pub match_names: Vec<String>,
    pub policy_notes: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_record: Option<EmployeeRecordDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventActor {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub label: String,
    pub status_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTargets {
    pub user_ids: Vec<String>,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub matched_count: usize,
}

/// Per-group activity feed entry written after every apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvent {
    pub id: String,
    pub group_id: String,
    pub group_name: String,
    pub rule_type: RuleType,
    pub action: Action,
    pub actor: EventActor,
    pub timestamp: DateTime<Utc>,
    pub summary: EventSummary,
    pub targets: EventTargets,
    pub details: serde_json::Value,
    pub diff_id: Option<String>,
    pub audit_id: Option<String>,
}
