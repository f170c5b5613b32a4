//! Advisory notes attached to a diff. Never fails.

use crate::rules::{Action, RuleType};

pub const EDIT_UPSERT_NOTE: &str = "Edit will upsert matching memberships in demo mode.";
pub const DYNAMIC_EXPRESSION_NOTE: &str = "Dynamic expressions evaluate against live demo attributes.";
pub const NO_MATCH_NOTE: &str = "No users matched this rule.";
pub const LARGE_CHANGE_NOTE: &str =
    "Large change detected - confirm with a stakeholder before applying.";

pub fn policy_notes(
    action: Action,
    rule_type: RuleType,
    match_count: usize,
    large_change_threshold: usize,
) -> Vec<String> {
    let mut notes = Vec::new();
    if action == Action::Edit {
        notes.push(EDIT_UPSERT_NOTE.to_string());
    }
    if rule_type == RuleType::Expression {
        notes.push(DYNAMIC_EXPRESSION_NOTE.to_string());
    }
    if match_count == 0 {
        notes.push(NO_MATCH_NOTE.to_string());
    } else if match_count > large_change_threshold {
        notes.push(LARGE_CHANGE_NOTE.to_string());
    }
    notes
}
