//! Rule inference chain
//!
//! Each step is a pure function from the current [`Inference`] to the next
//! one. Steps run in the order of [`STEPS`]; a step leaves the state alone
//! when its own rule type is already set, so span decoding and earlier steps
//! take precedence.

use regex::Regex;
use std::sync::LazyLock;

use super::model::intents;
use super::slots::{non_empty, Slots};
use super::synonyms::{SynonymCategory, SynonymTable};
use crate::rules::RuleType;

const NAME: &str = r"[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)+";

static REPORTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:reporting to|reports to|who report to|under|managed by)\s+(?P<name>{NAME})"
    ))
    .unwrap()
});

static RETARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:retarget|switch|swap|change)\s+(?:the\s+)?manager rule\s+(?:from\s+)?(?P<from>{NAME})\s+to\s+(?P<to>{NAME})"
    ))
    .unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:tagged|tag)\s+(?:with\s+|as\s+)?(?P<tag>[A-Za-z0-9_]+)").unwrap()
});

static DL_EDIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:replace|switch|swap|change)\s+dl").unwrap());

const REMOVE_KEYWORDS: &[&str] = &["remove", "delete", "exclude", "drop"];
const ADD_KEYWORDS: &[&str] = &["add", "include", "ensure", "pull"];
const RETIRE_KEYWORDS: &[&str] = &["remove", "drop", "delete", "eliminate", "retire"];
const EMPLOYMENT_CONTEXT: &[&str] = &[
    "employment type",
    "employment status",
    "contract type",
    "employment rule",
];

/// Text under inference, shared by every step
#[derive(Debug, Clone, Copy)]
pub struct InferenceInput<'a> {
    pub raw: &'a str,
    pub lowered: &'a str,
    pub synonyms: &'a SynonymTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub intent: String,
    pub slots: Slots,
}

pub type InferenceStep = fn(&InferenceInput<'_>, Inference) -> Inference;

pub const STEPS: &[(&str, InferenceStep)] = &[
    ("manager-relationship", manager_relationship),
    ("manager-retarget", manager_retarget),
    ("tag", tag_rule),
    ("location", location_rule),
    ("employment-type", employment_type_rule),
    ("directory-group", directory_group_rule),
];

/// Run every step in order
pub fn infer_rule(input: &InferenceInput<'_>, initial: Inference) -> Inference {
    STEPS.iter().fold(initial, |state, (name, step)| {
        let next = step(input, state.clone());
        if next != state {
            tracing::debug!(
                step = name,
                intent = %next.intent,
                rule_type = ?next.slots.rule_type,
                rule_value = ?next.slots.rule_value,
                "inference step applied"
            );
        }
        next
    })
}

fn contains_any(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

/// Add/remove intent implied by keywords, if any
pub fn membership_intent(lowered: &str) -> Option<&'static str> {
    if contains_any(lowered, REMOVE_KEYWORDS) {
        Some(intents::REMOVE_RULE)
    } else if contains_any(lowered, ADD_KEYWORDS) {
        Some(intents::ADD_RULE)
    } else {
        None
    }
}

fn has_rule_type(inference: &Inference, rule_type: RuleType) -> bool {
    inference.slots.rule_type == Some(rule_type)
}

// ============================================================================
// Steps
// ============================================================================

/// "reporting to Casey Lee", "managed by Alex Rivera"
pub fn manager_relationship(input: &InferenceInput<'_>, mut state: Inference) -> Inference {
    if has_rule_type(&state, RuleType::Manager) {
        return state;
    }
    let Some(caps) = REPORTING_RE.captures(input.raw) else {
        return state;
    };
    let Some(manager) = input.synonyms.names().match_fragment(&caps["name"]) else {
        return state;
    };
    state.slots.set_rule(RuleType::Manager, manager);
    if let Some(intent) = membership_intent(input.lowered) {
        state.intent = intent.to_string();
    }
    state
}

/// "switch the manager rule from Casey Lee to Alex Rivera"
pub fn manager_retarget(input: &InferenceInput<'_>, mut state: Inference) -> Inference {
    let Some(caps) = RETARGET_RE.captures(input.raw) else {
        return state;
    };
    let names = input.synonyms.names();
    let (Some(from), Some(to)) = (
        names.match_fragment(&caps["from"]),
        names.match_fragment(&caps["to"]),
    ) else {
        return state;
    };
    state.slots.rule_type = Some(RuleType::Manager);
    state.slots.from_value = Some(from);
    state.slots.to_value = Some(to);
    state.intent = intents::EDIT_RULE.to_string();
    state
}

/// "tagged HSE", "tag with Responder"
pub fn tag_rule(input: &InferenceInput<'_>, mut state: Inference) -> Inference {
    if has_rule_type(&state, RuleType::Tag) {
        return state;
    }
    let Some(caps) = TAG_RE.captures(input.raw) else {
        return state;
    };
    let raw_tag = &caps["tag"];
    if matches!(raw_tag.to_lowercase().as_str(), "rule" | "rules") {
        return state;
    }
    let tag = input.synonyms.canonicalize(SynonymCategory::Tags, raw_tag);
    state.slots.set_rule(RuleType::Tag, tag);
    if let Some(intent) = membership_intent(input.lowered) {
        state.intent = intent.to_string();
    }
    state
}

/// Location rule removal, or "location rule" edits naming two locations
pub fn location_rule(input: &InferenceInput<'_>, mut state: Inference) -> Inference {
    if has_rule_type(&state, RuleType::Location) {
        return state;
    }
    let locations = input.synonyms.find_all(SynonymCategory::Location, input.raw);
    let Some(first) = locations.first() else {
        return state;
    };
    if contains_any(input.lowered, &["remove", "drop"]) {
        state.slots.set_rule(RuleType::Location, first);
        state.intent = intents::REMOVE_RULE.to_string();
    } else if input.lowered.contains("location rule") && locations.len() >= 2 {
        edit_between(&mut state, RuleType::Location, first, &locations[1]);
    }
    state
}

/// Employment-type rules: removal, two-value edits, or a plain add
pub fn employment_type_rule(input: &InferenceInput<'_>, mut state: Inference) -> Inference {
    if has_rule_type(&state, RuleType::EmploymentType) {
        return state;
    }
    let values = input
        .synonyms
        .find_all(SynonymCategory::EmploymentType, input.raw);
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return state;
    };
    let removing = contains_any(input.lowered, RETIRE_KEYWORDS);
    let mentions_rule = input.lowered.contains("rule");
    if !(removing || mentions_rule || contains_any(input.lowered, EMPLOYMENT_CONTEXT)) {
        return state;
    }

    if removing {
        state.slots.set_rule(RuleType::EmploymentType, first);
        state.intent = intents::REMOVE_RULE.to_string();
    } else if mentions_rule && values.len() >= 2 {
        edit_between(&mut state, RuleType::EmploymentType, first, &values[1]);
    } else {
        state.slots.set_rule(RuleType::EmploymentType, last);
        state.intent = membership_intent(input.lowered)
            .unwrap_or(intents::ADD_RULE)
            .to_string();
    }
    state
}

/// Directory-group rule removal, or "replace/switch DL ..." edits
pub fn directory_group_rule(input: &InferenceInput<'_>, mut state: Inference) -> Inference {
    if has_rule_type(&state, RuleType::DirectoryGroup) {
        return state;
    }
    let groups = input
        .synonyms
        .find_all(SynonymCategory::DirectoryGroup, input.raw);
    let Some(first) = groups.first() else {
        return state;
    };
    if contains_any(input.lowered, RETIRE_KEYWORDS) {
        state.slots.set_rule(RuleType::DirectoryGroup, first);
        state.intent = intents::REMOVE_RULE.to_string();
    } else if groups.len() >= 2 && DL_EDIT_RE.is_match(input.lowered) {
        edit_between(&mut state, RuleType::DirectoryGroup, first, &groups[1]);
    }
    state
}

fn edit_between(state: &mut Inference, rule_type: RuleType, from: &str, to: &str) {
    state.slots.set_rule(rule_type, to);
    state.slots.from_value = non_empty(from);
    state.slots.to_value = non_empty(to);
    state.intent = intents::EDIT_RULE.to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::synonyms::SynonymSeed;
    use pretty_assertions::assert_eq;

    fn run(text: &str, intent: &str, slots: Slots) -> Inference {
        let table = SynonymTable::from_seed(&SynonymSeed::builtin().unwrap());
        let lowered = text.to_lowercase();
        let input = InferenceInput {
            raw: text,
            lowered: &lowered,
            synonyms: &table,
        };
        infer_rule(
            &input,
            Inference {
                intent: intent.to_string(),
                slots,
            },
        )
    }

    #[test]
    fn test_manager_relationship() {
        let out = run("Remove everyone reporting to Casey Lee from DRILL_Permian", "add_rule", Slots::default());
        assert_eq!(out.slots.rule_type, Some(RuleType::Manager));
        assert_eq!(out.slots.rule_value.as_deref(), Some("Casey Lee"));
        assert_eq!(out.intent, intents::REMOVE_RULE);
    }

    #[test]
    fn test_manager_relationship_trims_trailing_words() {
        let out = run("add people managed by Alex Rivera To Corporate", "expression_rule", Slots::default());
        assert_eq!(out.slots.rule_value.as_deref(), Some("Alex Rivera"));
        assert_eq!(out.intent, intents::ADD_RULE);
    }

    #[test]
    fn test_manager_retarget() {
        let out = run(
            "switch the manager rule from Casey Lee to Alex Rivera",
            "add_rule",
            Slots::default(),
        );
        assert_eq!(out.intent, intents::EDIT_RULE);
        assert_eq!(out.slots.rule_type, Some(RuleType::Manager));
        assert_eq!(out.slots.from_value.as_deref(), Some("Casey Lee"));
        assert_eq!(out.slots.to_value.as_deref(), Some("Alex Rivera"));
    }

    #[test]
    fn test_tag_phrase() {
        let out = run("include users tagged responders", "expression_rule", Slots::default());
        assert_eq!(out.slots.rule_type, Some(RuleType::Tag));
        assert_eq!(out.slots.rule_value.as_deref(), Some("Responder"));
        assert_eq!(out.intent, intents::ADD_RULE);
    }

    #[test]
    fn test_location_removal_and_edit() {
        let out = run("drop the Remote folks", "add_rule", Slots::default());
        assert_eq!(out.slots.rule_type, Some(RuleType::Location));
        assert_eq!(out.slots.rule_value.as_deref(), Some("Remote"));
        assert_eq!(out.intent, intents::REMOVE_RULE);

        let out = run(
            "move the location rule from Houston HQ to Midland Regional HQ",
            "add_rule",
            Slots::default(),
        );
        assert_eq!(out.intent, intents::EDIT_RULE);
        assert_eq!(out.slots.from_value.as_deref(), Some("Houston HQ"));
        assert_eq!(out.slots.to_value.as_deref(), Some("Midland Regional HQ"));
        assert_eq!(out.slots.rule_value.as_deref(), Some("Midland Regional HQ"));
    }

    #[test]
    fn test_employment_type_variants() {
        let out = run("retire the contractor rule", "add_rule", Slots::default());
        assert_eq!(out.slots.rule_type, Some(RuleType::EmploymentType));
        assert_eq!(out.slots.rule_value.as_deref(), Some("Contractor"));
        assert_eq!(out.intent, intents::REMOVE_RULE);

        let out = run("change the rule from interns to full time", "add_rule", Slots::default());
        assert_eq!(out.intent, intents::EDIT_RULE);
        assert_eq!(out.slots.from_value.as_deref(), Some("Intern"));
        assert_eq!(out.slots.to_value.as_deref(), Some("Full-time"));

        let out = run("set employment type to contractor", "expression_rule", Slots::default());
        assert_eq!(out.slots.rule_value.as_deref(), Some("Contractor"));
        assert_eq!(out.intent, intents::ADD_RULE);
    }

    #[test]
    fn test_employment_needs_context() {
        let out = run("contractors in houston", "expression_rule", Slots::default());
        assert_eq!(out.slots.rule_type, None);
        assert_eq!(out.intent, intents::EXPRESSION_RULE);
    }

    #[test]
    fn test_directory_group_edit() {
        let out = run(
            "swap DL_Permian_Operators for DL_Permian_Engineers",
            "add_rule",
            Slots::default(),
        );
        assert_eq!(out.slots.rule_type, Some(RuleType::DirectoryGroup));
        assert_eq!(out.slots.from_value.as_deref(), Some("DL_Permian_Operators"));
        assert_eq!(out.slots.rule_value.as_deref(), Some("DL_Permian_Engineers"));
        assert_eq!(out.intent, intents::EDIT_RULE);
    }

    #[test]
    fn test_existing_rule_type_is_kept() {
        let mut slots = Slots::default();
        slots.set_rule(RuleType::Location, "Houston HQ");
        let out = run("remove Houston HQ and Remote", "remove_rule", slots.clone());
        assert_eq!(out.slots, slots);
    }
}
