//! Employee-record changes
//!
//! Instead of matching a population, an `employee-record` rule edits fields
//! on one record. Propose computes the field deltas; apply writes them and
//! reads the result back for the audit entry.

use std::collections::BTreeMap;

use chrono::Utc;
use rule_expr::Field;
use serde_json::Value as Json;
use uuid::Uuid;

use super::intent::RecordChangesRequest;
use super::{ApplyResult, ApplySummary, ChangeEntry, ChangeService, ProposeResult, RecordChangeSummary, RecordChangeView, RecordFieldsChange};
use crate::directory::{
    AuditEntry, ChangeTallies, Diff, DirectoryRecord, EmployeeRecordDetail, EventSummary,
    EventTargets, FieldChange, Group, RecordChangePlan, RuleSummary,
};
use crate::error::{DlError, DlResult};
use crate::rules::{Action, RuleType};

// ============================================================================
// Field metadata
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Select,
    Number,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditableField {
    pub field: Field,
    pub label: &'static str,
    pub kind: FieldKind,
}

pub const EDITABLE_FIELDS: &[EditableField] = &[
    EditableField { field: Field::EmploymentType, label: "Employment Type", kind: FieldKind::Select },
    EditableField { field: Field::Role, label: "Role / Job Title", kind: FieldKind::Select },
    EditableField { field: Field::Department, label: "Department", kind: FieldKind::Select },
    EditableField { field: Field::Location, label: "Location", kind: FieldKind::Select },
    EditableField { field: Field::Manager, label: "Manager / Team Lead", kind: FieldKind::Select },
    EditableField { field: Field::TenureDays, label: "Tenure (days)", kind: FieldKind::Number },
    EditableField { field: Field::Active, label: "Active Status", kind: FieldKind::Boolean },
];

const CLEARED: &str = "(cleared)";
const EMPTY: &str = "(empty)";

pub fn editable_field(name: &str) -> DlResult<&'static EditableField> {
    let name = name.trim();
    EDITABLE_FIELDS
        .iter()
        .find(|meta| meta.field.name() == name)
        .ok_or_else(|| DlError::InvalidRequest(format!("Field '{name}' cannot be edited.")))
}

fn meta_for(field: Field) -> Option<&'static EditableField> {
    EDITABLE_FIELDS.iter().find(|meta| meta.field == field)
}

fn label_for(field: Field) -> String {
    meta_for(field).map_or_else(|| field.name().to_string(), |meta| meta.label.to_string())
}

/// Coerce a raw value to the field's kind. Blank strings become `null`.
pub fn normalize_value(meta: &EditableField, raw: &Json) -> DlResult<Json> {
    if raw.is_null() || raw.as_str().is_some_and(|s| s.trim().is_empty()) {
        return Ok(Json::Null);
    }
    match meta.kind {
        FieldKind::Number => {
            let number = match raw {
                Json::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
                Json::String(s) => s.trim().parse::<i64>().ok(),
                Json::Bool(b) => Some(i64::from(*b)),
                _ => None,
            };
            number.map(Json::from).ok_or_else(|| {
                DlError::MalformedRuleValue(format!("'{}' must be a number.", meta.label))
            })
        }
        FieldKind::Boolean => Ok(Json::Bool(match raw {
            Json::Bool(b) => *b,
            Json::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
            Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        })),
        FieldKind::Select => Ok(match raw {
            Json::String(s) => Json::String(s.clone()),
            other => Json::String(other.to_string()),
        }),
    }
}

/// Display form used in previews and audit entries
pub fn format_value(value: &Json) -> String {
    match value {
        Json::Null => EMPTY.to_string(),
        Json::String(s) if s.is_empty() => EMPTY.to_string(),
        Json::Array(items) if items.is_empty() => EMPTY.to_string(),
        Json::Bool(true) => "Active".to_string(),
        Json::Bool(false) => "Inactive".to_string(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalized set values plus the unset fields not also being set
pub fn normalize_changes(
    changes: &RecordChangesRequest,
) -> DlResult<(BTreeMap<Field, Json>, Vec<Field>)> {
    let mut set = BTreeMap::new();
    for (name, raw) in &changes.set {
        let meta = editable_field(name)?;
        set.entry(meta.field).or_insert(normalize_value(meta, raw)?);
    }

    let mut unset = Vec::new();
    for name in &changes.unset {
        let field = editable_field(name)?.field;
        if !set.contains_key(&field) && !unset.contains(&field) {
            unset.push(field);
        }
    }
    Ok((set, unset))
}

fn field_change(field: Field, before: Json, after: Json, after_display: String) -> FieldChange {
    FieldChange {
        field,
        label: label_for(field),
        before_display: format_value(&before),
        before,
        after,
        after_display,
    }
}

/// Deltas against the current record; sets that change nothing are dropped.
pub fn plan_field_changes(
    record: &DirectoryRecord,
    set: &BTreeMap<Field, Json>,
    unset: &[Field],
) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for (field, after) in set {
        let before = record.field_json(*field);
        if before == *after {
            continue;
        }
        changes.push(field_change(*field, before, after.clone(), format_value(after)));
    }
    for field in unset {
        changes.push(field_change(*field, record.field_json(*field), Json::Null, CLEARED.to_string()));
    }
    changes
}

fn field_count_label(name: &str, count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("{name} ({count} field{plural})")
}

// ============================================================================
// Propose and apply
// ============================================================================

impl ChangeService {
    pub(super) async fn propose_employee_record(
        &self,
        action: Action,
        group: &Group,
        employee: &str,
        changes: &RecordChangesRequest,
    ) -> DlResult<ProposeResult> {
        let employee = employee.trim();
        if employee.is_empty() {
            return Err(DlError::InvalidRequest(
                "Select an employee record to modify.".into(),
            ));
        }

        let (set, unset) = normalize_changes(changes)?;
        if action == Action::Remove && unset.is_empty() {
            return Err(DlError::InvalidRequest("Choose at least one field to clear.".into()));
        }
        if action != Action::Remove && set.is_empty() {
            return Err(DlError::InvalidRequest("Provide at least one field to update.".into()));
        }

        let record = self
            .store
            .find_user(employee)
            .await?
            .ok_or_else(|| DlError::EmployeeNotFound(employee.to_string()))?;

        let fields = plan_field_changes(&record, &set, &unset);
        if fields.is_empty() {
            return Err(DlError::NoChangesDetected);
        }

        let rule_type = RuleType::EmployeeRecord;
        let diff = Diff {
            id: format!("d_{}", Uuid::new_v4().simple()),
            action,
            rule_type,
            rule_label: rule_type.label().to_string(),
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            value: Some(employee.to_string()),
            expression: None,
            matches: vec![record.id.clone()],
            match_count: fields.len(),
            match_names: vec![record.display_name.clone()],
            policy_notes: Vec::new(),
            created_at: Utc::now(),
            record_change: Some(RecordChangePlan {
                target_user_id: record.id.clone(),
                target_user_email: record.email.clone(),
                target_user_name: record.display_name.clone(),
                set: set.clone(),
                unset: unset.clone(),
                fields: fields.clone(),
            }),
        };
        self.store.insert_diff(diff.clone()).await?;
        tracing::info!(
            diff_id = %diff.id,
            user = %record.id,
            fields = fields.len(),
            "proposed employee record change"
        );

        Ok(ProposeResult {
            id: diff.id,
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            action,
            rule_type,
            match_count: fields.len(),
            changes: vec![ChangeEntry::EmployeeRecord(RecordFieldsChange {
                change_type: rule_type,
                action: action.op_label().to_string(),
                user_id: record.id.clone(),
                user_display_name: record.display_name.clone(),
                user_email: record.email.clone(),
                rule_label: rule_type.label().to_string(),
                rule_type,
                rule_value_label: record.display_name.clone(),
                fields,
            })],
            policy_notes: Vec::new(),
            rule_label: rule_type.label().to_string(),
            rule_value: Some(record.display_name),
            record_changes: Some(RecordChangeView { set, unset }),
        })
    }

    pub(super) async fn apply_employee_record(
        &self,
        diff: &Diff,
        plan: &RecordChangePlan,
        actor: &str,
    ) -> DlResult<ApplyResult> {
        let record = self
            .store
            .find_user(&plan.target_user_id)
            .await?
            .ok_or_else(|| DlError::EmployeeNotFound(plan.target_user_id.clone()))?;

        let mut set = BTreeMap::new();
        for (field, raw) in &plan.set {
            let value = match meta_for(*field) {
                Some(meta) => normalize_value(meta, raw)?,
                None => raw.clone(),
            };
            set.insert(*field, value);
        }
        let unset: Vec<Field> = plan
            .unset
            .iter()
            .copied()
            .filter(|field| !set.contains_key(field))
            .collect();

        let touched: Vec<Field> = set.keys().copied().chain(unset.iter().copied()).collect();
        let before: Vec<Json> = touched.iter().map(|f| record.field_json(*f)).collect();

        let updated = self
            .store
            .update_user_fields(&record.id, &set, &unset)
            .await?
            .ok_or_else(|| DlError::EmployeeNotFound(record.id.clone()))?;

        let changes: Vec<FieldChange> = touched
            .iter()
            .zip(before)
            .map(|(field, before)| {
                let after = updated.field_json(*field);
                let after_display = format_value(&after);
                field_change(*field, before, after, after_display)
            })
            .collect();

        let rule = RuleSummary {
            rule_type: RuleType::EmployeeRecord,
            label: RuleType::EmployeeRecord.label().to_string(),
            value: Some(updated.display_name.clone()),
            expression: None,
        };
        let detail = EmployeeRecordDetail {
            user_id: updated.id.clone(),
            user_display_name: updated.display_name.clone(),
            user_email: updated.email.clone(),
            changes: changes.clone(),
            set: set.clone(),
            unset: unset.clone(),
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
            before: Vec::new(),
            after: Vec::new(),
            summary: ChangeTallies::default(),
            match_count: diff.match_count,
            match_names: diff.match_names.clone(),
            policy_notes: diff.policy_notes.clone(),
            status: "success".to_string(),
            employee_record: Some(detail),
        };
        let audit_id = audit.id.clone();
        self.record_audit(audit).await;

        self.record_event(
            diff,
            actor,
            EventSummary {
                label: field_count_label(&updated.display_name, changes.len()),
                status_label: "Updated".to_string(),
                field_count: Some(changes.len()),
            },
            EventTargets {
                user_ids: vec![updated.id.clone()],
                entity_id: Some(updated.id.clone()),
                entity_name: Some(updated.display_name.clone()),
                matched_count: 1,
            },
            serde_json::json!({
                "employeeRecord": { "set": &set, "unset": &unset, "fields": &changes }
            }),
            &audit_id,
        )
        .await;

        tracing::info!(
            diff_id = %diff.id,
            user = %updated.id,
            fields = changes.len(),
            "applied employee record change"
        );

        Ok(ApplyResult {
            ok: true,
            audit_id,
            applied: changes.len(),
            removed: 0,
            summary: ApplySummary {
                group_id: diff.group_id.clone(),
                group_name: diff.group_name.clone(),
                rule,
                added: Default::default(),
                removed: Default::default(),
                before: Default::default(),
                after: Default::default(),
                policy_notes: diff.policy_notes.clone(),
                record_change: Some(RecordChangeSummary {
                    user_id: updated.id,
                    user_display_name: updated.display_name,
                    user_email: updated.email,
                    fields: changes,
                }),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn meta(field: Field) -> &'static EditableField {
        meta_for(field).unwrap()
    }

    #[test]
    fn test_normalize_values() {
        assert_eq!(normalize_value(meta(Field::Location), &json!("  ")).unwrap(), Json::Null);
        assert_eq!(normalize_value(meta(Field::TenureDays), &json!("45")).unwrap(), json!(45));
        assert_eq!(normalize_value(meta(Field::TenureDays), &json!(45.9)).unwrap(), json!(45));
        let err = normalize_value(meta(Field::TenureDays), &json!("soon")).unwrap_err();
        assert_eq!(err.to_string(), "'Tenure (days)' must be a number.");
        assert_eq!(normalize_value(meta(Field::Active), &json!("Yes")).unwrap(), json!(true));
        assert_eq!(normalize_value(meta(Field::Active), &json!("off")).unwrap(), json!(false));
        assert_eq!(normalize_value(meta(Field::Active), &json!(0)).unwrap(), json!(false));
    }

    #[test]
    fn test_format_values() {
        assert_eq!(format_value(&Json::Null), "(empty)");
        assert_eq!(format_value(&json!("")), "(empty)");
        assert_eq!(format_value(&json!(false)), "Inactive");
        assert_eq!(format_value(&json!(120)), "120");
        assert_eq!(format_value(&json!("Remote")), "Remote");
    }

    #[test]
    fn test_set_wins_over_unset() {
        let request = RecordChangesRequest {
            set: BTreeMap::from([("location".to_string(), json!("Remote"))]),
            unset: vec!["location".into(), "manager".into(), "manager".into()],
        };
        let (set, unset) = normalize_changes(&request).unwrap();
        assert_eq!(set.get(&Field::Location), Some(&json!("Remote")));
        assert_eq!(unset, vec![Field::Manager]);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let request = RecordChangesRequest {
            set: BTreeMap::from([("salary".to_string(), json!(1))]),
            unset: Vec::new(),
        };
        assert_eq!(
            normalize_changes(&request).unwrap_err().kind(),
            ErrorKind::InvalidRequest
        );
    }

    #[test]
    fn test_plan_drops_noop_sets() {
        let record = DirectoryRecord {
            id: "u1".into(),
            display_name: "Pat".into(),
            location: Some("Remote".into()),
            manager: Some("Casey Lee".into()),
            ..DirectoryRecord::default()
        };
        let set = BTreeMap::from([
            (Field::Location, json!("Remote")),
            (Field::TenureDays, json!(30)),
        ]);
        let changes = plan_field_changes(&record, &set, &[Field::Manager]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, Field::TenureDays);
        assert_eq!(changes[0].before_display, "(empty)");
        assert_eq!(changes[0].after_display, "30");
        assert_eq!(changes[1].label, "Manager / Team Lead");
        assert_eq!(changes[1].after_display, "(cleared)");
    }

    #[test]
    fn test_field_count_label() {
        assert_eq!(field_count_label("Jane Doe", 1), "Jane Doe (1 field)");
        assert_eq!(field_count_label("Jane Doe", 3), "Jane Doe (3 fields)");
    }
}
