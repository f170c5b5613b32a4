//! Natural-language rule parsing
//!
//! [`IntentSlotParser::parse`] runs the pipeline:
//!
//! ```text
//! text -> tokens -> BIO labels -> spans -> canonical slots
//!      -> rule inference -> (expression synthesis) -> (record changes)
//! ```
//!
//! The intent classifier and slot tagger are injected; the synonym snapshot
//! is read once per parse and can be swapped at any time without affecting
//! parses already in flight.

pub mod duration;
pub mod inference;
pub mod model;
pub mod names;
pub mod record_changes;
pub mod slots;
pub mod spans;
pub mod synonyms;
pub mod synthesis;
pub mod tokenize;

pub use model::{
    intents, FixedIntentClassifier, FixedSlotTagger, GazetteerSlotTagger, IntentClassifier,
    IntentPrediction, KeywordIntentClassifier, ModelError, SlotTagger,
};
pub use names::EmployeeNameIndex;
pub use slots::{RecordUpdate, Slots};
pub use spans::{decode_spans, LabeledSpan, SpanCategory, SpanSet};
pub use synonyms::{
    assemble_from_directory, SharedSynonyms, SynonymCategory, SynonymSeed, SynonymTable,
};
pub use tokenize::{tokenize, Token};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MANAGER_CONTEXT;
use crate::directory::DirectoryStore;
use crate::error::DlResult;
use inference::{infer_rule, Inference, InferenceInput};
use record_changes::infer_record_changes;
use synthesis::{expression_action, Synthesizer};

/// Output of [`IntentSlotParser::parse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub intent: String,
    pub confidence: f64,
    pub slots: Slots,
    pub tokens: Vec<String>,
}

pub struct IntentSlotParser {
    classifier: Arc<dyn IntentClassifier>,
    tagger: Arc<dyn SlotTagger>,
    synonyms: SharedSynonyms,
    manager_context: Vec<String>,
}

impl IntentSlotParser {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        tagger: Arc<dyn SlotTagger>,
        synonyms: SynonymTable,
    ) -> Self {
        Self {
            classifier,
            tagger,
            synonyms: SharedSynonyms::new(synonyms),
            manager_context: DEFAULT_MANAGER_CONTEXT
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Phrases that tie a manager name to a reporting relationship in
    /// synthesized expressions
    pub fn with_manager_context(mut self, phrases: Vec<String>) -> Self {
        self.manager_context = phrases;
        self
    }

    pub fn synonyms(&self) -> Arc<SynonymTable> {
        self.synonyms.current()
    }

    /// Install a new synonym snapshot, returning the previous one
    pub fn reload_synonyms(&self, table: SynonymTable) -> Arc<SynonymTable> {
        self.synonyms.swap(table)
    }

    /// Rebuild the snapshot from live directory values and swap it in.
    /// Returns the new snapshot version.
    pub async fn refresh_from_directory(
        &self,
        store: &dyn DirectoryStore,
        seed: &SynonymSeed,
    ) -> String {
        let table = assemble_from_directory(store, seed).await;
        let version = table.version().to_string();
        self.synonyms.swap(table);
        version
    }

    pub fn parse(&self, text: &str) -> DlResult<ParseResult> {
        let tokens = tokenize(text);
        let prediction = self.classifier.predict(text)?;
        let labels = self.tagger.predict_labels(&tokens)?;
        let spans = decode_spans(&tokens, &labels);
        let table = self.synonyms.current();

        tracing::debug!(
            intent = %prediction.label,
            confidence = prediction.confidence,
            tokens = tokens.len(),
            spans = ?spans.to_map(),
            synonyms = %table.version(),
            "classified text"
        );

        let lowered = text.to_lowercase();
        let input = InferenceInput {
            raw: text,
            lowered: &lowered,
            synonyms: &table,
        };
        let Inference {
            mut intent,
            mut slots,
        } = infer_rule(
            &input,
            Inference {
                intent: prediction.label,
                slots: slots::normalize_slots(&spans, &table),
            },
        );

        slots.user = match slots.user.take() {
            Some(user) => Some(table.names().canonicalize(&user).unwrap_or(user)),
            None => table.names().find_in_text(text),
        };

        let infer_expression = intent == intents::EXPRESSION_RULE
            || (slots.rule_type.is_none() && lowered.contains("tenure"));
        if infer_expression {
            let synthesizer = Synthesizer {
                synonyms: &table,
                manager_context: &self.manager_context,
            };
            if let Some(expression) = synthesizer.synthesize(text, &slots) {
                slots.expression = Some(expression);
                slots.expression_action = expression_action(&lowered);
                if slots.rule_type.is_none() {
                    intent = intents::EXPRESSION_RULE.to_string();
                }
            }
        }

        if intent == intents::EMPLOYEE_RECORD_SET || intent == intents::EMPLOYEE_RECORD_CLEAR {
            let changes = infer_record_changes(text, &intent, &table);
            slots.record_updates = changes.updates;
            slots.record_clears = changes.clears;
        }

        tracing::info!(
            intent = %intent,
            rule_type = ?slots.rule_type,
            expression = ?slots.expression,
            "parsed rule request"
        );

        Ok(ParseResult {
            intent,
            confidence: prediction.confidence,
            slots,
            tokens: tokens.into_iter().map(|token| token.text).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DlError, ErrorKind};
    use crate::rules::{Action, RuleType};
    use pretty_assertions::assert_eq;

    fn parser(intent: &str, labels: &[&str]) -> IntentSlotParser {
        IntentSlotParser::new(
            Arc::new(FixedIntentClassifier::new(intent, 0.9)),
            Arc::new(FixedSlotTagger::new(labels.iter().copied())),
            SynonymTable::from_seed(&SynonymSeed::builtin().unwrap()),
        )
    }

    #[test]
    fn test_parse_user_and_group_spans() {
        let result = parser(intents::ADD_RULE, &["O", "B-USER", "I-USER", "O", "B-GROUP"])
            .parse("add jane doe to DRILL_Permian")
            .unwrap();
        assert_eq!(result.intent, intents::ADD_RULE);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.slots.user.as_deref(), Some("Jane Doe"));
        assert_eq!(result.slots.group.as_deref(), Some("DRILL_Permian"));
        assert_eq!(result.tokens, vec!["add", "jane", "doe", "to", "DRILL_Permian"]);
    }

    #[test]
    fn test_user_is_inferred_from_text() {
        let result = parser(intents::ADD_RULE, &[])
            .parse("please add Devon Price")
            .unwrap();
        assert_eq!(result.slots.user.as_deref(), Some("Devon Price"));
    }

    #[test]
    fn test_tenure_text_becomes_expression_rule() {
        let result = parser(intents::ADD_RULE, &[])
            .parse("add contractors with tenure under 6 months to MSG_Production_East")
            .unwrap();
        assert_eq!(result.intent, intents::EXPRESSION_RULE);
        assert_eq!(
            result.slots.expression.as_deref(),
            Some("employmentType == \"Contractor\" and tenureDays <= 180")
        );
        assert_eq!(result.slots.expression_action, Some(Action::Add));
    }

    #[test]
    fn test_record_set_updates() {
        let result = parser(intents::EMPLOYEE_RECORD_SET, &[])
            .parse("deactivate Frank Patel")
            .unwrap();
        assert_eq!(result.slots.user.as_deref(), Some("Frank Patel"));
        assert_eq!(result.slots.record_updates.len(), 1);
        assert_eq!(result.slots.record_updates[0].value, serde_json::json!(false));
    }

    #[test]
    fn test_manager_inference_overrides_intent() {
        let result = parser(intents::EXPRESSION_RULE, &[])
            .parse("remove everyone reporting to Maria Gonzales")
            .unwrap();
        assert_eq!(result.slots.rule_type, Some(RuleType::Manager));
        assert_eq!(result.slots.rule_value.as_deref(), Some("Maria Gonzales"));
        assert_eq!(result.intent, intents::REMOVE_RULE);
    }

    #[test]
    fn test_snapshot_swap_applies_to_next_parse() {
        let parser = parser(intents::ADD_RULE, &["O", "B-LOCATION", "I-LOCATION"]);
        let before = parser.parse("add Denver Hub").unwrap();
        assert_eq!(before.slots.location.as_deref(), Some("Denver Hub"));

        let seed = SynonymSeed::builtin().unwrap();
        let table = synonyms::SynonymTableBuilder::from_seed(&seed)
            .category_values(SynonymCategory::Location, ["Denver Hub"])
            .build();
        parser.reload_synonyms(table);
        let after = parser.parse("add denver hubs").unwrap();
        assert_eq!(after.slots.location.as_deref(), Some("Denver Hub"));
    }

    struct BrokenTagger;

    impl SlotTagger for BrokenTagger {
        fn predict_labels(&self, _tokens: &[Token]) -> Result<Vec<String>, ModelError> {
            Err(ModelError::Slots("model file missing".into()))
        }
    }

    #[test]
    fn test_model_failure_is_wrapped() {
        let parser = IntentSlotParser::new(
            Arc::new(FixedIntentClassifier::new(intents::ADD_RULE, 1.0)),
            Arc::new(BrokenTagger),
            SynonymTable::from_seed(&SynonymSeed::builtin().unwrap()),
        );
        let err = parser.parse("add someone").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
        assert!(matches!(err, DlError::CollaboratorFailure(_)));
    }
}
