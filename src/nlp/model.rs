//! Statistical model seams
//!
//! The parser consumes an intent classifier and a BIO slot tagger through
//! the [`IntentClassifier`] and [`SlotTagger`] traits. Trained models live
//! outside this crate; the implementations here are deterministic stand-ins
//! for tests and for running without a trained model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::spans::SpanCategory;
use super::synonyms::{SynonymCategory, SynonymTable};
use super::tokenize::{tokenize, Token};

/// Intent labels the parser understands
pub mod intents {
    pub const ADD_RULE: &str = "add_rule";
    pub const REMOVE_RULE: &str = "remove_rule";
    pub const EDIT_RULE: &str = "edit_rule";
    pub const EXPRESSION_RULE: &str = "expression_rule";
    pub const EMPLOYEE_RECORD_SET: &str = "employee_record_set";
    pub const EMPLOYEE_RECORD_CLEAR: &str = "employee_record_clear";
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("intent classifier failed: {0}")]
    Intent(String),

    #[error("slot tagger failed: {0}")]
    Slots(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPrediction {
    pub label: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
}

impl IntentPrediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            confidence,
        }
    }
}

pub trait IntentClassifier: Send + Sync {
    fn predict(&self, text: &str) -> Result<IntentPrediction, ModelError>;
}

/// Produces one BIO label (`O`, `B-TAG`, `I-TAG`) per token
pub trait SlotTagger: Send + Sync {
    fn predict_labels(&self, tokens: &[Token]) -> Result<Vec<String>, ModelError>;
}

// ============================================================================
// Fixed predictors
// ============================================================================

/// Always returns the same prediction
#[derive(Debug, Clone)]
pub struct FixedIntentClassifier {
    prediction: IntentPrediction,
}

impl FixedIntentClassifier {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            prediction: IntentPrediction::new(label, confidence),
        }
    }
}

impl IntentClassifier for FixedIntentClassifier {
    fn predict(&self, _text: &str) -> Result<IntentPrediction, ModelError> {
        Ok(self.prediction.clone())
    }
}

/// Returns a fixed label sequence regardless of input
#[derive(Debug, Clone, Default)]
pub struct FixedSlotTagger {
    labels: Vec<String>,
}

impl FixedSlotTagger {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Tags every token `O`
    pub fn outside() -> Self {
        Self::default()
    }
}

impl SlotTagger for FixedSlotTagger {
    fn predict_labels(&self, tokens: &[Token]) -> Result<Vec<String>, ModelError> {
        if self.labels.is_empty() {
            return Ok(vec!["O".to_string(); tokens.len()]);
        }
        Ok(self.labels.clone())
    }
}

// ============================================================================
// Keyword classifier
// ============================================================================

const RECORD_WORDS: &[&str] = &["record", "profile", "employee"];
const CLEAR_WORDS: &[&str] = &["clear", "wipe", "unset", "blank"];
const TOGGLE_WORDS: &[&str] = &["activate", "deactivate", "reactivate", "disable", "enable"];
const EDIT_WORDS: &[&str] = &["switch", "swap", "change", "replace", "retarget"];
const REMOVE_WORDS: &[&str] = &["remove", "drop", "delete", "exclude", "eliminate", "retire"];
const ADD_WORDS: &[&str] = &["add", "include", "ensure", "pull", "grant"];
const EXPRESSION_WORDS: &[&str] = &["tenure", "everyone", "where", "longer", "who"];

/// Keyword fallback when no trained intent model is available
#[derive(Debug, Clone, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    fn classify(words: &BTreeSet<String>) -> IntentPrediction {
        let any = |set: &[&str]| set.iter().any(|word| words.contains(*word));
        let ruleish = words.contains("rule") || words.contains("dl");

        if any(RECORD_WORDS) && !ruleish {
            if any(CLEAR_WORDS) {
                return IntentPrediction::new(intents::EMPLOYEE_RECORD_CLEAR, 0.8);
            }
            return IntentPrediction::new(intents::EMPLOYEE_RECORD_SET, 0.8);
        }
        if any(TOGGLE_WORDS) {
            return IntentPrediction::new(intents::EMPLOYEE_RECORD_SET, 0.7);
        }
        if any(EDIT_WORDS) && ruleish {
            return IntentPrediction::new(intents::EDIT_RULE, 0.7);
        }
        if any(REMOVE_WORDS) {
            return IntentPrediction::new(intents::REMOVE_RULE, 0.75);
        }
        if any(EXPRESSION_WORDS) || (words.contains("all") && words.contains("users")) {
            return IntentPrediction::new(intents::EXPRESSION_RULE, 0.6);
        }
        if any(ADD_WORDS) {
            return IntentPrediction::new(intents::ADD_RULE, 0.7);
        }
        IntentPrediction::new(intents::ADD_RULE, 0.3)
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn predict(&self, text: &str) -> Result<IntentPrediction, ModelError> {
        let words: BTreeSet<String> = tokenize(text)
            .into_iter()
            .map(|token| token.text.to_lowercase())
            .collect();
        Ok(Self::classify(&words))
    }
}

// ============================================================================
// Gazetteer tagger
// ============================================================================

#[derive(Debug, Clone)]
struct GazetteerEntry {
    words: Vec<String>,
    category: SpanCategory,
}

/// Longest-match BIO tagger over known phrases.
///
/// At each position the longest phrase that matches (case-insensitively, on
/// token boundaries) wins; among equally long phrases the first one added
/// wins.
#[derive(Debug, Clone, Default)]
pub struct GazetteerSlotTagger {
    entries: Vec<GazetteerEntry>,
}

impl GazetteerSlotTagger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phrase(mut self, category: SpanCategory, phrase: &str) -> Self {
        self.add_phrase(category, phrase);
        self
    }

    pub fn add_phrase(&mut self, category: SpanCategory, phrase: &str) {
        let words: Vec<String> = tokenize(phrase)
            .into_iter()
            .map(|token| token.text.to_lowercase())
            .collect();
        if words.is_empty() || self.entries.iter().any(|entry| entry.words == words) {
            return;
        }
        self.entries.push(GazetteerEntry { words, category });
    }

    /// Gazetteer from group names, employee names and synonym surfaces
    pub fn from_vocabulary<'a>(
        group_names: impl IntoIterator<Item = &'a str>,
        table: &SynonymTable,
        extra_rule_values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut tagger = Self::new();
        for name in group_names {
            tagger.add_phrase(SpanCategory::Group, name);
        }
        for name in table.names().names() {
            tagger.add_phrase(SpanCategory::User, name);
        }
        for category in SynonymCategory::ALL {
            let span = match category {
                SynonymCategory::Location => SpanCategory::Location,
                _ => SpanCategory::RuleValue,
            };
            for canonical in table.canonical_values(category) {
                tagger.add_phrase(span, canonical);
                for variant in table.variants(category, canonical).into_iter().flatten() {
                    tagger.add_phrase(span, variant);
                }
            }
        }
        for value in extra_rule_values {
            tagger.add_phrase(SpanCategory::RuleValue, value);
        }
        tracing::debug!(phrases = tagger.entries.len(), "built gazetteer tagger");
        tagger
    }

    fn longest_at<'e>(&'e self, words: &[String]) -> Option<&'e GazetteerEntry> {
        let mut best: Option<&GazetteerEntry> = None;
        for entry in &self.entries {
            let fits = entry.words.len() <= words.len()
                && entry.words.iter().zip(words).all(|(a, b)| a == b);
            if fits && best.map_or(true, |b| entry.words.len() > b.words.len()) {
                best = Some(entry);
            }
        }
        best
    }
}

impl SlotTagger for GazetteerSlotTagger {
    fn predict_labels(&self, tokens: &[Token]) -> Result<Vec<String>, ModelError> {
        let words: Vec<String> = tokens.iter().map(|t| t.text.to_lowercase()).collect();
        let mut labels = vec!["O".to_string(); tokens.len()];
        let mut i = 0;
        while i < words.len() {
            match self.longest_at(&words[i..]) {
                Some(entry) => {
                    let tag = entry.category.tag();
                    labels[i] = format!("B-{tag}");
                    for label in labels.iter_mut().skip(i + 1).take(entry.words.len() - 1) {
                        *label = format!("I-{tag}");
                    }
                    i += entry.words.len();
                }
                None => i += 1,
            }
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::synonyms::SynonymSeed;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(IntentPrediction::new("x", 1.7).confidence, 1.0);
        assert_eq!(IntentPrediction::new("x", -0.2).confidence, 0.0);
        assert_eq!(IntentPrediction::new("x", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_fixed_tagger_defaults_to_outside() {
        let tokens = tokenize("add Jane");
        let labels = FixedSlotTagger::outside().predict_labels(&tokens).unwrap();
        assert_eq!(labels, vec!["O", "O"]);
    }

    #[test]
    fn test_keyword_classifier() {
        let classifier = KeywordIntentClassifier;
        let label = |text: &str| classifier.predict(text).unwrap().label;
        assert_eq!(label("Add Jane Doe to DRILL_Permian"), intents::ADD_RULE);
        assert_eq!(label("remove contractors from Corporate_IT"), intents::REMOVE_RULE);
        assert_eq!(label("switch the manager rule from Casey Lee to Alex Rivera"), intents::EDIT_RULE);
        assert_eq!(label("clear the tenure on Jane Doe's record"), intents::EMPLOYEE_RECORD_CLEAR);
        assert_eq!(label("deactivate Frank Patel"), intents::EMPLOYEE_RECORD_SET);
        assert_eq!(label("users with tenure over 2 years"), intents::EXPRESSION_RULE);
    }

    #[test]
    fn test_gazetteer_prefers_longest_match() {
        let tagger = GazetteerSlotTagger::new()
            .with_phrase(SpanCategory::Location, "Houston")
            .with_phrase(SpanCategory::Location, "Houston HQ")
            .with_phrase(SpanCategory::Group, "ACL_EVIN-North");
        let tokens = tokenize("add houston hq to ACL_EVIN-North");
        let labels = tagger.predict_labels(&tokens).unwrap();
        assert_eq!(
            labels,
            vec!["O", "B-LOCATION", "I-LOCATION", "O", "B-GROUP", "I-GROUP", "I-GROUP"]
        );
    }

    #[test]
    fn test_gazetteer_from_vocabulary() {
        let table = SynonymTable::from_seed(&SynonymSeed::builtin().unwrap());
        let tagger = GazetteerSlotTagger::from_vocabulary(
            ["MSG_Production_East"],
            &table,
            ["Contractors Ending Soon"],
        );
        let tokens = tokenize("Add contractors ending soon to MSG_Production_East");
        let labels = tagger.predict_labels(&tokens).unwrap();
        assert_eq!(
            labels,
            vec!["O", "B-RULE_VALUE", "I-RULE_VALUE", "I-RULE_VALUE", "O", "B-GROUP"]
        );
    }
}
