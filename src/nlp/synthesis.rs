//! Expression synthesis from free text
//!
//! Builds an `and`-joined expression in the rule language from whatever
//! clauses the text supports, in a fixed order: active state, employment
//! type, location, manager, tag, tenure.

use super::duration::extract_tenure_clause;
use super::slots::Slots;
use super::synonyms::{contains_phrase, normalize_surface, SynonymCategory, SynonymTable};
use crate::rules::{Action, RuleType};

const CATCH_ALL: &[&str] = &[
    "all user",
    "everyone",
    "entire company",
    "whole company",
    "every user",
    "all employees",
];

/// The expression that selects every active record
pub const ALL_ACTIVE: &str = "active == 1";

pub struct Synthesizer<'a> {
    pub synonyms: &'a SynonymTable,
    /// Phrases that must directly precede a manager name for a manager clause
    pub manager_context: &'a [String],
}

fn quoted(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl Synthesizer<'_> {
    pub fn synthesize(&self, text: &str, slots: &Slots) -> Option<String> {
        let lowered = text.to_lowercase();
        if CATCH_ALL.iter().any(|phrase| lowered.contains(phrase)) {
            return Some(ALL_ACTIVE.to_string());
        }

        let mut clauses: Vec<String> = Vec::new();
        let mut push = |clause: Option<String>| {
            if let Some(clause) = clause {
                if !clauses.contains(&clause) {
                    clauses.push(clause);
                }
            }
        };

        let phrases = self.synonyms.boolean_phrases();
        push(if contains_phrase(text, &phrases.inactive) {
            Some("active == 0".to_string())
        } else if contains_phrase(text, &phrases.active) {
            Some(ALL_ACTIVE.to_string())
        } else {
            None
        });

        let employment = match (&slots.rule_type, &slots.rule_value) {
            (Some(RuleType::EmploymentType), Some(value)) => Some(value.clone()),
            _ => self.first(SynonymCategory::EmploymentType, text),
        };
        push(employment.map(|value| format!("employmentType == {}", quoted(&value))));

        let location = slots
            .location
            .clone()
            .or_else(|| self.first(SynonymCategory::Location, text));
        push(location.map(|value| format!("location == {}", quoted(&value))));

        push(
            self.synonyms
                .find_first(SynonymCategory::Manager, text)
                .filter(|found| self.has_manager_context(text, &found.surface))
                .map(|found| format!("manager == {}", quoted(&found.canonical))),
        );

        push(
            self.first(SynonymCategory::Tags, text)
                .map(|tag| format!("contains(tags, {})", quoted(&tag))),
        );

        push(extract_tenure_clause(text, self.synonyms.tenure_phrases()).map(|c| c.to_string()));

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" and "))
        }
    }

    fn first(&self, category: SynonymCategory, text: &str) -> Option<String> {
        self.synonyms
            .find_first(category, text)
            .map(|found| found.canonical)
    }

    fn has_manager_context(&self, text: &str, surface: &str) -> bool {
        let haystack = normalize_surface(text);
        self.manager_context.iter().any(|phrase| {
            let phrase = normalize_surface(phrase);
            !phrase.is_empty() && haystack.contains(&format!("{phrase} {surface}"))
        })
    }
}

/// Add/remove direction for a synthesized expression rule
pub fn expression_action(lowered: &str) -> Option<Action> {
    const REMOVE: &[&str] = &["remove", "exclude", "drop", "less than"];
    const ADD: &[&str] = &["add", "include", "greater than", "over", "at least"];
    if REMOVE.iter().any(|k| lowered.contains(k)) {
        Some(Action::Remove)
    } else if ADD.iter().any(|k| lowered.contains(k)) {
        Some(Action::Add)
    } else {
        None
    }
}
