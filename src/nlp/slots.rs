//! Parsed slot values and span normalization

use rule_expr::Field;
use serde::{Deserialize, Serialize};

use super::spans::{SpanCategory, SpanSet};
use super::synonyms::{SynonymCategory, SynonymTable};
use crate::rules::{find_saved_filter, Action, RuleType};

/// One employee-record field assignment inferred from text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub field: Field,
    pub value: serde_json::Value,
}

/// Slot values; empty values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<RuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_updates: Vec<RecordUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub record_clears: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_value: Option<String>,
}

/// `Some(trimmed)` unless blank
pub(crate) fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl Slots {
    pub fn is_empty(&self) -> bool {
        *self == Slots::default()
    }

    /// Set the rule type together with its value
    pub(crate) fn set_rule(&mut self, rule_type: RuleType, value: impl AsRef<str>) {
        self.rule_type = Some(rule_type);
        self.rule_value = non_empty(value);
    }
}

/// Turn decoded spans into canonical slots.
pub fn normalize_slots(spans: &SpanSet, table: &SynonymTable) -> Slots {
    let mut slots = Slots {
        user: spans.get(SpanCategory::User).and_then(non_empty),
        group: spans
            .get(SpanCategory::Group)
            .and_then(|group| non_empty(group.replace(" - ", "-"))),
        location: spans
            .get(SpanCategory::Location)
            .and_then(|raw| non_empty(table.canonicalize(SynonymCategory::Location, raw.trim()))),
        ..Slots::default()
    };

    if let Some(raw) = spans.get(SpanCategory::RuleValue) {
        if let Some((category, canonical)) = table.canonical_rule_value(raw) {
            slots.set_rule(category.rule_type(), canonical);
        } else if let Some(filter) = find_saved_filter(raw) {
            slots.set_rule(RuleType::SavedFilter, filter.name);
        } else {
            slots.rule_value = non_empty(raw);
        }
    }
    slots
}
