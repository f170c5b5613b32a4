//! Diff application

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use uuid::Uuid;

use super::summary::{tally_changes, MAX_SUMMARY_NAMES};
use super::{ApplyResult, ApplySummary, ChangeService};
use crate::config::ReplayPolicy;
use crate::directory::{
    AuditEntry, Diff, DiffClaim, DirectoryRecord, EventSummary, EventTargets, Membership,
    RuleSummary, UserFilter, INCLUDE_FLAG,
};
use crate::error::{DlError, DlResult};
use crate::rules::{Action, RuleMatcher, RuleType};

/// Membership before and after applying a diff to one record
type Transition = (Option<Membership>, Option<Membership>);

impl ChangeService {
    /// Apply a stored diff on behalf of `actor`.
    ///
    /// User and expression rules are resolved again against the live
    /// directory; every other rule type trusts the ids recorded at propose
    /// time. Records removed since then are skipped.
    pub async fn apply(&self, diff_id: &str, actor: &str) -> DlResult<ApplyResult> {
        let diff = self
            .store
            .find_diff(diff_id)
            .await?
            .ok_or_else(|| DlError::DiffNotFound(diff_id.to_string()))?;

        if self.store.claim_diff(&diff.id).await? == DiffClaim::AlreadyApplied {
            match self.config.replay_policy {
                ReplayPolicy::Reject => {
                    tracing::warn!(diff_id = %diff.id, "rejected replay of applied diff");
                    return Err(DlError::DiffAlreadyApplied(diff.id));
                }
                ReplayPolicy::Rerun => {
                    tracing::info!(diff_id = %diff.id, "re-applying diff");
                }
            }
        }

        if let Some(plan) = &diff.record_change {
            return self.apply_employee_record(&diff, plan, actor).await;
        }

        let records = self.apply_targets(&diff).await?;
        let now = Utc::now();
        let transitions = try_join_all(
            records
                .iter()
                .map(|record| self.apply_to_record(&diff, record, now)),
        )
        .await?;

        let (before, after): (Vec<Membership>, Vec<Membership>) = transitions.into_iter().fold(
            (Vec::new(), Vec::new()),
            |(mut before, mut after), (old, new)| {
                before.extend(old);
                after.extend(new);
                (before, after)
            },
        );

        let names = self
            .name_map(before.iter().chain(&after).map(|m| m.user_id.clone()))
            .await?;
        let tallies = tally_changes(&before, &after, &names);

        let rule = RuleSummary {
            rule_type: diff.rule_type,
            label: diff.rule_label.clone(),
            value: match diff.rule_type {
                RuleType::Expression => diff.expression.clone(),
                _ => diff.value.clone(),
            },
            expression: diff.expression.clone(),
        };

        let audit = AuditEntry {
            id: format!("a_{}", Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            actor: actor.to_string(),
            op: diff.action.op_label().to_string(),
            diff_id: diff.id.clone(),
            group_id: diff.group_id.clone(),
            group_name: diff.group_name.clone(),
            rule: rule.clone(),
            before,
            after,
            summary: tallies.clone(),
            match_count: diff.match_count,
            match_names: diff
                .match_names
                .iter()
                .take(MAX_SUMMARY_NAMES)
                .cloned()
                .collect(),
            policy_notes: diff.policy_notes.clone(),
            status: "success".to_string(),
            employee_record: None,
        };
        let audit_id = audit.id.clone();
        self.record_audit(audit).await;

        let status_label = match diff.action {
            Action::Add => "Added",
            Action::Remove => "Removed",
            Action::Edit => "Updated",
        };
        let label = match &rule.value {
            Some(value) => format!(
                "{}: {} (+{} / -{})",
                rule.label, value, tallies.added.count, tallies.removed.count
            ),
            None => format!(
                "{} (+{} / -{})",
                rule.label, tallies.added.count, tallies.removed.count
            ),
        };
        self.record_event(
            &diff,
            actor,
            EventSummary {
                label,
                status_label: status_label.to_string(),
                field_count: None,
            },
            EventTargets {
                user_ids: records.iter().map(|record| record.id.clone()).collect(),
                entity_id: None,
                entity_name: None,
                matched_count: records.len(),
            },
            serde_json::json!({ "rule": &rule, "summary": &tallies }),
            &audit_id,
        )
        .await;

        tracing::info!(
            diff_id = %diff.id,
            actor,
            added = tallies.added.count,
            removed = tallies.removed.count,
            "applied diff"
        );

        Ok(ApplyResult {
            ok: true,
            audit_id,
            applied: tallies.added.count,
            removed: tallies.removed.count,
            summary: ApplySummary {
                group_id: diff.group_id.clone(),
                group_name: diff.group_name.clone(),
                rule,
                added: tallies.added,
                removed: tallies.removed,
                before: tallies.before,
                after: tallies.after,
                policy_notes: diff.policy_notes.clone(),
                record_change: None,
            },
        })
    }

    async fn apply_targets(&self, diff: &Diff) -> DlResult<Vec<DirectoryRecord>> {
        let matcher = RuleMatcher::new(self.store.as_ref());
        match diff.rule_type {
            RuleType::Expression => {
                let compiled = rule_expr::compile(diff.expression.as_deref().unwrap_or_default())?;
                matcher.match_expression(&compiled).await
            }
            RuleType::User => {
                matcher
                    .match_users(RuleType::User, diff.value.as_deref(), None)
                    .await
            }
            _ if diff.matches.is_empty() => Ok(Vec::new()),
            _ => Ok(self
                .store
                .find_users(&UserFilter::Ids(diff.matches.clone()))
                .await?),
        }
    }

    async fn apply_to_record(
        &self,
        diff: &Diff,
        record: &DirectoryRecord,
        now: DateTime<Utc>,
    ) -> DlResult<Transition> {
        let existing = self
            .store
            .find_membership(&record.id, &diff.group_id)
            .await?;

        if diff.action == Action::Remove {
            if existing.is_some() {
                self.store
                    .delete_membership(&record.id, &diff.group_id)
                    .await?;
            }
            return Ok((existing, None));
        }

        let membership = Membership {
            id: existing
                .as_ref()
                .map(|m| m.id.clone())
                .unwrap_or_else(|| format!("m_{}", Uuid::new_v4().simple())),
            user_id: record.id.clone(),
            group_id: diff.group_id.clone(),
            rule_type: diff.rule_type,
            rule_value: match diff.rule_type {
                RuleType::Expression => diff.expression.clone(),
                _ => diff.value.clone(),
            },
            added_at: existing.as_ref().map_or(now, |m| m.added_at),
            updated_at: now,
            flag: existing
                .as_ref()
                .map(|m| m.flag.clone())
                .filter(|flag| !flag.is_empty())
                .unwrap_or_else(|| INCLUDE_FLAG.to_string()),
        };
        self.store.upsert_membership(membership.clone()).await?;
        Ok((existing, Some(membership)))
    }
}
