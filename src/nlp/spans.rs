//! BIO span decoding
//!
//! Turns per-token `O` / `B-TAG` / `I-TAG` labels into one surface string per
//! tag. If a tag occurs more than once, the last span wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tokenize::Token;

/// Slot categories produced by the tagger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanCategory {
    User,
    Group,
    Location,
    RuleValue,
}

impl SpanCategory {
    pub fn tag(&self) -> &'static str {
        match self {
            SpanCategory::User => "USER",
            SpanCategory::Group => "GROUP",
            SpanCategory::Location => "LOCATION",
            SpanCategory::RuleValue => "RULE_VALUE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "USER" => Some(SpanCategory::User),
            "GROUP" => Some(SpanCategory::Group),
            "LOCATION" => Some(SpanCategory::Location),
            "RULE_VALUE" => Some(SpanCategory::RuleValue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BioLabel<'a> {
    Outside,
    Begin(&'a str),
    Inside(&'a str),
}

fn parse_label(label: &str) -> BioLabel<'_> {
    match label.split_once('-') {
        Some(("B", tag)) if !tag.is_empty() => BioLabel::Begin(tag),
        Some(("I", tag)) if !tag.is_empty() => BioLabel::Inside(tag),
        _ => {
            if label != "O" {
                tracing::debug!(label, "treating unrecognized BIO label as outside");
            }
            BioLabel::Outside
        }
    }
}

/// A decoded span with the token offsets it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSpan {
    pub tag: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Decoded spans keyed by tag name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanSet {
    spans: BTreeMap<String, LabeledSpan>,
}

impl SpanSet {
    pub fn get(&self, category: SpanCategory) -> Option<&str> {
        self.spans.get(category.tag()).map(|span| span.text.as_str())
    }

    pub fn get_tag(&self, tag: &str) -> Option<&LabeledSpan> {
        self.spans.get(tag)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// `tag -> surface text`
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.spans
            .iter()
            .map(|(tag, span)| (tag.clone(), span.text.clone()))
            .collect()
    }
}

struct OpenSpan<'a> {
    tag: &'a str,
    words: Vec<&'a str>,
    start: usize,
    end: usize,
}

impl OpenSpan<'_> {
    fn close(self, spans: &mut BTreeMap<String, LabeledSpan>) {
        spans.insert(
            self.tag.to_string(),
            LabeledSpan {
                tag: self.tag.to_string(),
                text: self.words.join(" "),
                start: self.start,
                end: self.end,
            },
        );
    }
}

/// Decode BIO labels over tokens.
///
/// Labels beyond the token count (or tokens beyond the label count) are
/// ignored.
pub fn decode_spans(tokens: &[Token], labels: &[String]) -> SpanSet {
    if tokens.len() != labels.len() {
        tracing::warn!(
            tokens = tokens.len(),
            labels = labels.len(),
            "label sequence length differs from token count"
        );
    }

    let mut spans = BTreeMap::new();
    let mut open: Option<OpenSpan<'_>> = None;

    for (token, label) in tokens.iter().zip(labels) {
        match parse_label(label) {
            BioLabel::Outside => {
                if let Some(span) = open.take() {
                    span.close(&mut spans);
                }
            }
            BioLabel::Inside(tag) if open.as_ref().is_some_and(|span| span.tag == tag) => {
                if let Some(span) = open.as_mut() {
                    span.words.push(&token.text);
                    span.end = token.end;
                }
            }
            BioLabel::Begin(tag) | BioLabel::Inside(tag) => {
                if let Some(span) = open.take() {
                    span.close(&mut spans);
                }
                open = Some(OpenSpan {
                    tag,
                    words: vec![&token.text],
                    start: token.start,
                    end: token.end,
                });
            }
        }
    }
    if let Some(span) = open.take() {
        span.close(&mut spans);
    }

    SpanSet { spans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::tokenize::tokenize;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_user_and_group() {
        let tokens = tokenize("x Jane Doe to DL1");
        let spans = decode_spans(&tokens, &labels(&["O", "B-USER", "I-USER", "O", "B-GROUP"]));
        assert_eq!(spans.get(SpanCategory::User), Some("Jane Doe"));
        assert_eq!(spans.get(SpanCategory::Group), Some("DL1"));
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let tokens = tokenize("Houston and Remote");
        let spans = decode_spans(&tokens, &labels(&["B-LOCATION", "O", "B-LOCATION"]));
        assert_eq!(spans.get(SpanCategory::Location), Some("Remote"));
    }

    #[test]
    fn test_begin_starts_new_span_even_for_same_tag() {
        let tokens = tokenize("Jane Alex");
        let spans = decode_spans(&tokens, &labels(&["B-USER", "B-USER"]));
        assert_eq!(spans.get(SpanCategory::User), Some("Alex"));
    }

    #[test]
    fn test_orphan_inside_starts_span() {
        let tokens = tokenize("to Houston HQ");
        let spans = decode_spans(&tokens, &labels(&["O", "I-LOCATION", "I-LOCATION"]));
        assert_eq!(spans.get(SpanCategory::Location), Some("Houston HQ"));
    }

    #[test]
    fn test_tag_change_closes_span() {
        let tokens = tokenize("Jane Doe Houston");
        let spans = decode_spans(&tokens, &labels(&["B-USER", "I-USER", "I-LOCATION"]));
        assert_eq!(spans.get(SpanCategory::User), Some("Jane Doe"));
        assert_eq!(spans.get(SpanCategory::Location), Some("Houston"));
    }

    #[test]
    fn test_hyphenated_group_is_space_joined() {
        let tokens = tokenize("ACL_EVIN-North");
        let spans = decode_spans(&tokens, &labels(&["B-GROUP", "I-GROUP", "I-GROUP"]));
        let span = spans.get_tag("GROUP").unwrap();
        assert_eq!(span.text, "ACL_EVIN - North");
        assert_eq!((span.start, span.end), (0, 14));
    }

    #[test]
    fn test_length_mismatch_truncates() {
        let tokens = tokenize("Jane Doe");
        let spans = decode_spans(&tokens, &labels(&["B-USER"]));
        assert_eq!(spans.get(SpanCategory::User), Some("Jane"));
    }
}
