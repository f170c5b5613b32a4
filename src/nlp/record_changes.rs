//! Employee-record field changes from free text

use regex::Regex;
use rule_expr::Field;
use serde_json::json;
use std::sync::LazyLock;

use super::model::intents;
use super::slots::RecordUpdate;
use super::synonyms::{SynonymCategory, SynonymTable};

static TENURE_DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:day|days)").unwrap());

static TOGGLE_INACTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:make|set|turn|keep|switch|bring|enable)\s+(?:[\w']+\s+){0,5}\binactive\b").unwrap()
});

static TOGGLE_ACTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:make|set|turn|keep|switch|bring|enable)\s+(?:[\w']+\s+){0,5}\bactive\b").unwrap()
});

const INACTIVE_KEYWORDS: &[&str] = &[
    "deactivate",
    "set inactive",
    "make inactive",
    "turn off",
    "mark inactive",
    "inactive again",
    "disable",
    "switch off",
    "shut off",
];

const ACTIVE_KEYWORDS: &[&str] = &[
    "activate",
    "reactivate",
    "make active",
    "set active",
    "active again",
    "re-enable",
    "enable",
    "turn on",
    "switch on",
    "back on",
    "back online",
];

const LOCATION_CONTEXT: &[&str] = &["location", "office", "move to", "assign to"];
const CLEAR_KEYWORDS: &[&str] = &["clear", "remove", "wipe"];

/// Keyword -> field cleared by `employee_record_clear`
const CLEARABLE: &[(&str, Field)] = &[
    ("tenure", Field::TenureDays),
    ("location", Field::Location),
    ("manager", Field::Manager),
    ("role", Field::Role),
    ("employment", Field::EmploymentType),
    ("status", Field::Active),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordChanges {
    pub updates: Vec<RecordUpdate>,
    pub clears: Vec<Field>,
}

fn contains_any(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

/// Field updates (for `employee_record_set`) or clears (for
/// `employee_record_clear`) mentioned in `text`.
pub fn infer_record_changes(text: &str, intent: &str, synonyms: &SynonymTable) -> RecordChanges {
    let lowered = text.to_lowercase();
    let mut changes = RecordChanges::default();

    if intent == intents::EMPLOYEE_RECORD_SET {
        let mut update = |field: Field, value: serde_json::Value| {
            changes.updates.push(RecordUpdate { field, value });
        };

        if lowered.contains("tenure") {
            if let Some(days) = TENURE_DAYS_RE
                .captures(&lowered)
                .and_then(|caps| caps[1].parse::<i64>().ok())
            {
                update(Field::TenureDays, json!(days));
            }
        }

        if contains_any(&lowered, INACTIVE_KEYWORDS) || TOGGLE_INACTIVE_RE.is_match(&lowered) {
            update(Field::Active, json!(false));
        } else if contains_any(&lowered, ACTIVE_KEYWORDS) || TOGGLE_ACTIVE_RE.is_match(&lowered) {
            update(Field::Active, json!(true));
        }

        if lowered.contains("manager") {
            if let Some(found) = synonyms.find_first(SynonymCategory::Manager, text) {
                update(Field::Manager, json!(found.canonical));
            }
        }

        if contains_any(&lowered, LOCATION_CONTEXT) {
            if let Some(found) = synonyms.find_first(SynonymCategory::Location, text) {
                update(Field::Location, json!(found.canonical));
            }
        }
    }

    if intent == intents::EMPLOYEE_RECORD_CLEAR && contains_any(&lowered, CLEAR_KEYWORDS) {
        changes.clears = CLEARABLE
            .iter()
            .filter(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, field)| *field)
            .collect();
    }

    changes
}
