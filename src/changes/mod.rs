//! Propose/apply change service
//!
//! ```text
//! ProposeRequest -> RuleIntent -> matches -> Diff (stored, immutable)
//!                                               |
//!                     apply(diff_id, actor) ----+-> membership upserts/deletes
//!                                                   -> AuditEntry + RuleEvent
//! ```
//!
//! `propose` never mutates membership state. `apply` claims the diff id
//! through the store before doing any work; what happens on a replay is
//! decided by [`ReplayPolicy`](crate::config::ReplayPolicy). Audit and
//! rule-event writes are best-effort: a failure is logged and dropped.

pub mod apply;
pub mod intent;
pub mod policy;
pub mod propose;
pub mod record;
pub mod summary;

pub use intent::{ProposeRequest, RecordChangesRequest, RuleIntent, RuleTarget};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rule_expr::Field;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DlConfig;
use crate::directory::{
    AuditEntry, Diff, DirectoryStore, EventActor, EventSummary, EventTargets, FieldChange,
    MembershipTally, RuleEvent, RuleSummary, UserFilter, INCLUDE_FLAG,
};
use crate::error::DlResult;
use crate::rules::{Action, RuleMatcher, RuleType};

/// Display names in an expression validation sample
const VALIDATION_SAMPLE: usize = 5;
/// Recent rule events listed with a group's memberships
const RECENT_EVENTS: usize = 50;
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

// ============================================================================
// Results
// ============================================================================

/// Preview of one membership change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    pub action: String,
    pub rule_type: RuleType,
    pub rule_label: String,
    pub rule_value: Option<String>,
    pub rule_value_label: String,
    pub expression: Option<String>,
    pub user_id: String,
    pub user_display_name: String,
    pub user_email: Option<String>,
}

/// Preview of field changes on one employee record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFieldsChange {
    pub change_type: RuleType,
    pub action: String,
    pub user_id: String,
    pub user_display_name: String,
    pub user_email: Option<String>,
    pub rule_label: String,
    pub rule_type: RuleType,
    pub rule_value_label: String,
    pub fields: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeEntry {
    EmployeeRecord(RecordFieldsChange),
    Membership(MembershipChange),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordChangeView {
    pub set: BTreeMap<Field, serde_json::Value>,
    pub unset: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeResult {
    pub id: String,
    pub group_id: String,
    pub group_name: String,
    pub action: Action,
    pub rule_type: RuleType,
    pub match_count: usize,
    pub changes: Vec<ChangeEntry>,
    pub policy_notes: Vec<String>,
    pub rule_label: String,
    pub rule_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_changes: Option<RecordChangeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordChangeSummary {
    pub user_id: String,
    pub user_display_name: String,
    pub user_email: Option<String>,
    pub fields: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    pub group_id: String,
    pub group_name: String,
    pub rule: RuleSummary,
    pub added: MembershipTally,
    pub removed: MembershipTally,
    pub before: MembershipTally,
    pub after: MembershipTally,
    pub policy_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_change: Option<RecordChangeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub ok: bool,
    pub audit_id: String,
    /// Memberships written, or fields changed for employee records
    pub applied: usize,
    pub removed: usize,
    pub summary: ApplySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub matches: usize,
    pub sample: Vec<String>,
}

/// One row of a group's membership listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRow {
    pub status_label: String,
    pub rule_type: RuleType,
    pub rule_label: String,
    pub value: Option<String>,
    pub value_label: String,
    pub user_display_name: Option<String>,
    pub user_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_recent_record_event: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

// ============================================================================
// Service
// ============================================================================

pub struct ChangeService {
    store: Arc<dyn DirectoryStore>,
    config: DlConfig,
}

impl ChangeService {
    pub fn new(store: Arc<dyn DirectoryStore>, config: DlConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn DirectoryStore> {
        &self.store
    }

    pub fn config(&self) -> &DlConfig {
        &self.config
    }

    /// Compile and run an expression against every record
    pub async fn validate_expression(&self, expression: &str) -> DlResult<ValidationResult> {
        let compiled = rule_expr::compile(expression)?;
        let matched = RuleMatcher::new(self.store.as_ref())
            .match_expression(&compiled)
            .await?;
        Ok(ValidationResult {
            ok: true,
            matches: matched.len(),
            sample: matched
                .into_iter()
                .take(VALIDATION_SAMPLE)
                .map(|record| record.display_name)
                .collect(),
        })
    }

    /// Most recent audit entries first
    pub async fn audit_log(&self, limit: usize) -> DlResult<Vec<AuditEntry>> {
        Ok(self.store.list_audit(limit).await?)
    }

    /// Membership rows for a group, newest first, followed by its recent rule
    /// events. An unknown group lists nothing.
    pub async fn group_memberships(&self, group_ref: &str) -> DlResult<Vec<MembershipRow>> {
        let Some(group) = self.store.find_group(group_ref.trim()).await? else {
            return Ok(Vec::new());
        };

        let mut memberships = self.store.list_memberships(&group.id).await?;
        memberships.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let names = self
            .name_map(memberships.iter().map(|m| m.user_id.clone()))
            .await?;

        let mut rows: Vec<MembershipRow> = memberships
            .into_iter()
            .map(|membership| {
                let name = names.get(&membership.user_id).cloned();
                let value_label = match membership.rule_type {
                    RuleType::User => name
                        .clone()
                        .or_else(|| membership.rule_value.clone())
                        .unwrap_or_else(|| membership.user_id.clone()),
                    RuleType::Expression => membership
                        .rule_value
                        .clone()
                        .unwrap_or_else(|| "(expression)".to_string()),
                    _ => membership
                        .rule_value
                        .clone()
                        .unwrap_or_else(|| "(none)".to_string()),
                };
                let status_label = if membership.flag.eq_ignore_ascii_case(INCLUDE_FLAG) {
                    "Included".to_string()
                } else {
                    membership.flag.clone()
                };
                MembershipRow {
                    status_label,
                    rule_type: membership.rule_type,
                    rule_label: membership.rule_type.label().to_string(),
                    value: membership.rule_value,
                    value_label,
                    user_display_name: name,
                    user_id: Some(membership.user_id),
                    updated_at: membership.updated_at,
                    is_recent_record_event: false,
                    event_id: None,
                }
            })
            .collect();

        let events = self.store.list_rule_events(&group.id, RECENT_EVENTS).await?;
        rows.extend(events.into_iter().map(|event| MembershipRow {
            status_label: event.summary.status_label,
            rule_type: event.rule_type,
            rule_label: event.rule_type.label().to_string(),
            value: event.targets.entity_id.clone(),
            value_label: event.summary.label,
            user_display_name: event.targets.entity_name,
            user_id: event.targets.entity_id,
            updated_at: event.timestamp,
            is_recent_record_event: true,
            event_id: Some(event.id),
        }));
        Ok(rows)
    }

    /// User id -> display name for the given ids
    async fn name_map(
        &self,
        ids: impl IntoIterator<Item = String>,
    ) -> DlResult<BTreeMap<String, String>> {
        let mut ids: Vec<String> = ids.into_iter().filter(|id| !id.is_empty()).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let records = self.store.find_users(&UserFilter::Ids(ids)).await?;
        Ok(records
            .into_iter()
            .map(|record| (record.id, record.display_name))
            .collect())
    }

    async fn record_audit(&self, entry: AuditEntry) {
        let audit_id = entry.id.clone();
        if let Err(error) = self.store.insert_audit(entry).await {
            tracing::warn!(%audit_id, %error, "failed to write audit entry");
        }
    }

    async fn record_event(
        &self,
        diff: &Diff,
        actor: &str,
        summary: EventSummary,
        targets: EventTargets,
        details: serde_json::Value,
        audit_id: &str,
    ) {
        let event = RuleEvent {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            group_id: diff.group_id.clone(),
            group_name: diff.group_name.clone(),
            rule_type: diff.rule_type,
            action: diff.action,
            actor: EventActor {
                id: actor.to_string(),
                display_name: actor.to_string(),
            },
            timestamp: Utc::now(),
            summary,
            targets,
            details,
            diff_id: Some(diff.id.clone()),
            audit_id: Some(audit_id.to_string()),
        };
        let event_id = event.id.clone();
        if let Err(error) = self.store.insert_rule_event(event).await {
            tracing::warn!(%event_id, %error, "failed to write rule event");
        }
    }
}
