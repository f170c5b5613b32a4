//! Diff creation

use chrono::Utc;
use uuid::Uuid;

use super::intent::{ProposeRequest, RuleIntent, RuleTarget};
use super::policy::policy_notes;
use super::{ChangeEntry, ChangeService, MembershipChange, ProposeResult};
use crate::directory::Diff;
use crate::error::{DlError, DlResult};
use crate::rules::{RuleMatcher, RuleType};

impl ChangeService {
    /// Validate a request, resolve its matches and store an immutable diff.
    /// Membership state is not touched.
    pub async fn propose(&self, request: &ProposeRequest) -> DlResult<ProposeResult> {
        let intent = RuleIntent::resolve(request)?;
        let group = self
            .store
            .find_group(&intent.group_ref)
            .await?
            .ok_or_else(|| DlError::GroupNotFound(intent.group_ref.clone()))?;

        let (value, compiled) = match &intent.target {
            RuleTarget::Record { employee, changes } => {
                return self
                    .propose_employee_record(intent.action, &group, employee, changes)
                    .await;
            }
            RuleTarget::Expression(expression) => (None, Some(rule_expr::compile(expression)?)),
            RuleTarget::Value(value) => (Some(value.clone()), None),
        };
        let expression = compiled.as_ref().map(|c| c.source().trim().to_string());

        let matches = RuleMatcher::new(self.store.as_ref())
            .match_users(intent.rule_type, value.as_deref(), compiled.as_ref())
            .await?;

        let rule_type = intent.rule_type;
        let action = intent.action;
        let notes = policy_notes(
            action,
            rule_type,
            matches.len(),
            self.config.large_change_threshold,
        );

        let changes: Vec<ChangeEntry> = matches
            .iter()
            .map(|record| {
                ChangeEntry::Membership(MembershipChange {
                    action: action.op_label().to_string(),
                    rule_type,
                    rule_label: rule_type.label().to_string(),
                    rule_value: value.clone(),
                    rule_value_label: match rule_type {
                        RuleType::Expression => expression.clone().unwrap_or_default(),
                        _ => value.clone().unwrap_or_default(),
                    },
                    expression: expression.clone(),
                    user_id: record.id.clone(),
                    user_display_name: record.display_name.clone(),
                    user_email: record.email.clone(),
                })
            })
            .collect();

        let diff = Diff {
            id: format!("d_{}", Uuid::new_v4().simple()),
            action,
            rule_type,
            rule_label: rule_type.label().to_string(),
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            value: value.clone(),
            expression: expression.clone(),
            matches: matches.iter().map(|record| record.id.clone()).collect(),
            match_count: matches.len(),
            match_names: matches
                .iter()
                .map(|record| record.display_name.clone())
                .filter(|name| !name.is_empty())
                .collect(),
            policy_notes: notes.clone(),
            created_at: Utc::now(),
            record_change: None,
        };
        let diff_id = diff.id.clone();
        self.store.insert_diff(diff).await?;

        tracing::info!(
            diff_id = %diff_id,
            %action,
            %rule_type,
            group = %group.name,
            matches = matches.len(),
            notes = notes.len(),
            "proposed diff"
        );

        Ok(ProposeResult {
            id: diff_id,
            group_id: group.id,
            group_name: group.name,
            action,
            rule_type,
            match_count: matches.len(),
            changes,
            policy_notes: notes,
            rule_label: rule_type.label().to_string(),
            rule_value: value.or(expression),
            record_changes: None,
        })
    }
}
