//! Propose requests
//!
//! [`ProposeRequest`] is the JSON-shaped body a caller sends;
//! [`RuleIntent::resolve`] validates it into a typed rule. A request can also
//! be built from a [`ParseResult`] with [`ProposeRequest::from_parse`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DlError, DlResult};
use crate::nlp::slots::non_empty;
use crate::nlp::{intents, ParseResult};
use crate::rules::{Action, RuleType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordChangesRequest {
    #[serde(default)]
    pub set: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub unset: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_changes: Option<RecordChangesRequest>,
}

impl ProposeRequest {
    pub fn new(action: Action, rule_type: RuleType, group: impl Into<String>) -> Self {
        Self {
            action: action.as_str().to_string(),
            rule_type: Some(rule_type.as_str().to_string()),
            group: group.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_record_changes(mut self, changes: RecordChangesRequest) -> Self {
        self.record_changes = Some(changes);
        self
    }

    /// Build a request from a parse. `group` overrides the GROUP slot.
    pub fn from_parse(parse: &ParseResult, group: Option<&str>) -> DlResult<Self> {
        let slots = &parse.slots;
        let group = group
            .and_then(non_empty)
            .or_else(|| slots.group.clone())
            .unwrap_or_default();

        let request = match parse.intent.as_str() {
            intents::EMPLOYEE_RECORD_SET | intents::EMPLOYEE_RECORD_CLEAR => {
                let (action, changes) = if parse.intent == intents::EMPLOYEE_RECORD_SET {
                    let set = slots
                        .record_updates
                        .iter()
                        .map(|update| (update.field.name().to_string(), update.value.clone()))
                        .collect();
                    (Action::Edit, RecordChangesRequest { set, unset: Vec::new() })
                } else {
                    let unset = slots
                        .record_clears
                        .iter()
                        .map(|field| field.name().to_string())
                        .collect();
                    (Action::Remove, RecordChangesRequest { set: BTreeMap::new(), unset })
                };
                let mut request = Self::new(action, RuleType::EmployeeRecord, group)
                    .with_record_changes(changes);
                request.value = slots.user.clone();
                request
            }
            intents::ADD_RULE | intents::REMOVE_RULE | intents::EDIT_RULE
            | intents::EXPRESSION_RULE => {
                let action = match parse.intent.as_str() {
                    intents::ADD_RULE => Action::Add,
                    intents::REMOVE_RULE => Action::Remove,
                    intents::EDIT_RULE => Action::Edit,
                    _ => slots.expression_action.unwrap_or(Action::Add),
                };

                if let Some(rule_type) = slots.rule_type {
                    let value = if action == Action::Edit {
                        slots.to_value.clone().or_else(|| slots.rule_value.clone())
                    } else {
                        slots.rule_value.clone()
                    };
                    let mut request = Self::new(action, rule_type, group);
                    request.value = value;
                    request
                } else if let Some(expression) = &slots.expression {
                    Self::new(action, RuleType::Expression, group).with_expression(expression)
                } else if let Some(location) = &slots.location {
                    Self::new(action, RuleType::Location, group).with_value(location)
                } else if let Some(user) = &slots.user {
                    Self::new(action, RuleType::User, group).with_value(user)
                } else {
                    return Err(DlError::InvalidRequest(
                        "Could not determine a rule from the request.".into(),
                    ));
                }
            }
            other => {
                return Err(DlError::InvalidRequest(format!(
                    "Unsupported intent '{other}'."
                )))
            }
        };

        tracing::debug!(
            intent = %parse.intent,
            action = %request.action,
            rule_type = ?request.rule_type,
            "built propose request from parse"
        );
        Ok(request)
    }
}

// ============================================================================
// Resolved intent
// ============================================================================

/// What a rule selects
#[derive(Debug, Clone, PartialEq)]
pub enum RuleTarget {
    /// Rule value, possibly blank; the matcher decides whether it is required.
    Value(String),
    Expression(String),
    Record {
        employee: String,
        changes: RecordChangesRequest,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleIntent {
    pub action: Action,
    pub rule_type: RuleType,
    pub group_ref: String,
    pub target: RuleTarget,
}

impl RuleIntent {
    /// Validate action, rule type and group reference. A missing rule type
    /// means a single-user rule.
    pub fn resolve(request: &ProposeRequest) -> DlResult<Self> {
        let action: Action = request.action.parse()?;
        let rule_type = match request.rule_type.as_deref().map(str::trim) {
            None | Some("") => RuleType::User,
            Some(raw) => raw.parse()?,
        };

        let group_ref = request.group.trim();
        if group_ref.is_empty() {
            return Err(DlError::InvalidRequest("Group is required.".into()));
        }

        let value = request.value.as_deref().unwrap_or_default().trim().to_string();
        let target = match rule_type {
            RuleType::Expression => RuleTarget::Expression(
                request
                    .expression
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            ),
            RuleType::EmployeeRecord => RuleTarget::Record {
                employee: value,
                changes: request.record_changes.clone().unwrap_or_default(),
            },
            _ => RuleTarget::Value(value),
        };

        Ok(Self {
            action,
            rule_type,
            group_ref: group_ref.to_string(),
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::nlp::{RecordUpdate, Slots};
    use pretty_assertions::assert_eq;
    use rule_expr::Field;

    fn parse(intent: &str, slots: Slots) -> ParseResult {
        ParseResult {
            intent: intent.to_string(),
            confidence: 0.9,
            slots,
            tokens: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_defaults_to_user_rule() {
        let request = ProposeRequest {
            action: "ADD".into(),
            group: " Corporate_IT ".into(),
            value: Some(" Jane Doe ".into()),
            ..ProposeRequest::default()
        };
        let intent = RuleIntent::resolve(&request).unwrap();
        assert_eq!(intent.action, Action::Add);
        assert_eq!(intent.rule_type, RuleType::User);
        assert_eq!(intent.group_ref, "Corporate_IT");
        assert_eq!(intent.target, RuleTarget::Value("Jane Doe".into()));
    }

    #[test]
    fn test_resolve_validation_order() {
        let request = ProposeRequest {
            action: "merge".into(),
            rule_type: Some("department".into()),
            ..ProposeRequest::default()
        };
        assert_eq!(
            RuleIntent::resolve(&request).unwrap_err().kind(),
            ErrorKind::UnsupportedAction
        );

        let request = ProposeRequest {
            action: "add".into(),
            rule_type: Some("department".into()),
            ..ProposeRequest::default()
        };
        assert_eq!(
            RuleIntent::resolve(&request).unwrap_err().kind(),
            ErrorKind::UnknownRuleType
        );

        let request = ProposeRequest::new(Action::Add, RuleType::Location, "  ");
        assert_eq!(
            RuleIntent::resolve(&request).unwrap_err().to_string(),
            "Group is required."
        );
    }

    #[test]
    fn test_from_parse_edit_uses_target_value() {
        let slots = Slots {
            rule_type: Some(RuleType::Location),
            rule_value: Some("Midland Regional HQ".into()),
            from_value: Some("Houston HQ".into()),
            to_value: Some("Midland Regional HQ".into()),
            group: Some("Corporate_IT".into()),
            ..Slots::default()
        };
        let request = ProposeRequest::from_parse(&parse(intents::EDIT_RULE, slots), None).unwrap();
        assert_eq!(request.action, "edit");
        assert_eq!(request.rule_type.as_deref(), Some("location"));
        assert_eq!(request.value.as_deref(), Some("Midland Regional HQ"));
        assert_eq!(request.group, "Corporate_IT");
    }

    #[test]
    fn test_from_parse_expression_action() {
        let slots = Slots {
            expression: Some("tenureDays <= 30".into()),
            expression_action: Some(Action::Remove),
            ..Slots::default()
        };
        let request =
            ProposeRequest::from_parse(&parse(intents::EXPRESSION_RULE, slots), Some("DRILL_Permian"))
                .unwrap();
        assert_eq!(request.action, "remove");
        assert_eq!(request.rule_type.as_deref(), Some("expression"));
        assert_eq!(request.expression.as_deref(), Some("tenureDays <= 30"));
        assert_eq!(request.group, "DRILL_Permian");
    }

    #[test]
    fn test_from_parse_record_set() {
        let slots = Slots {
            user: Some("Frank Patel".into()),
            record_updates: vec![RecordUpdate {
                field: Field::Active,
                value: serde_json::json!(false),
            }],
            ..Slots::default()
        };
        let request =
            ProposeRequest::from_parse(&parse(intents::EMPLOYEE_RECORD_SET, slots), Some("Corporate_IT"))
                .unwrap();
        assert_eq!(request.action, "edit");
        assert_eq!(request.rule_type.as_deref(), Some("employee-record"));
        assert_eq!(request.value.as_deref(), Some("Frank Patel"));
        let changes = request.record_changes.unwrap();
        assert_eq!(changes.set.get("active"), Some(&serde_json::json!(false)));
    }

    #[test]
    fn test_from_parse_falls_back_to_user() {
        let slots = Slots {
            user: Some("Jane Doe".into()),
            ..Slots::default()
        };
        let request = ProposeRequest::from_parse(&parse(intents::ADD_RULE, slots), Some("g")).unwrap();
        assert_eq!(request.rule_type.as_deref(), Some("user"));

        let err = ProposeRequest::from_parse(&parse(intents::ADD_RULE, Slots::default()), Some("g"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = ProposeRequest::from_parse(&parse("greeting", Slots::default()), None).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported intent 'greeting'.");
    }
}
