//! In-memory directory store
//!
//! Backs the CLI, the integration tests and any embedding that does not need
//! persistence. Collections are `BTreeMap`s keyed by id so every listing is
//! deterministic. [`FaultPlan`] lets tests fail individual write paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rule_expr::Field;
use tokio::sync::RwLock;

use super::store::{DiffClaim, DirectoryStore, StoreError};
use super::types::{
    AuditEntry, Diff, DirectoryRecord, Group, Membership, RuleEvent, UserFilter,
};

/// Switches for failing individual store operations
#[derive(Debug, Default)]
pub struct FaultPlan {
    pub audit_writes: AtomicBool,
    pub rule_event_writes: AtomicBool,
    pub distinct_values: AtomicBool,
}

impl FaultPlan {
    fn check(flag: &AtomicBool, operation: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Backend(format!("injected failure: {operation}")))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<String, DirectoryRecord>,
    groups: BTreeMap<String, Group>,
    /// Keyed by `(user_id, group_id)`
    memberships: BTreeMap<(String, String), Membership>,
    diffs: BTreeMap<String, Diff>,
    applied: BTreeSet<String>,
    audit: Vec<AuditEntry>,
    rule_events: Vec<RuleEvent>,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    state: RwLock<State>,
    faults: FaultPlan,
}

impl InMemoryDirectoryStore {
    pub fn new(
        users: impl IntoIterator<Item = DirectoryRecord>,
        groups: impl IntoIterator<Item = Group>,
        memberships: impl IntoIterator<Item = Membership>,
    ) -> Self {
        let state = State {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            groups: groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
            memberships: memberships
                .into_iter()
                .map(|m| ((m.user_id.clone(), m.group_id.clone()), m))
                .collect(),
            ..State::default()
        };
        Self {
            state: RwLock::new(state),
            faults: FaultPlan::default(),
        }
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn audit_count(&self) -> usize {
        self.state.read().await.audit.len()
    }

    pub async fn rule_event_count(&self) -> usize {
        self.state.read().await.rule_events.len()
    }
}

fn user_field_values(record: &DirectoryRecord, field: &str) -> Option<Vec<String>> {
    let values = match field {
        "displayName" => vec![record.display_name.clone()],
        "email" => record.email.iter().cloned().collect(),
        other => {
            let field = Field::from_name(other)?;
            match field {
                Field::Tags | Field::DirectoryGroups => record.list(field).to_vec(),
                Field::TenureDays => record.tenure_days.iter().map(|d| d.to_string()).collect(),
                Field::Active => record.active.iter().map(|a| a.to_string()).collect(),
                _ => record.text(field).map(str::to_string).into_iter().collect(),
            }
        }
    };
    Some(values)
}

fn group_field_values(group: &Group, field: &str) -> Option<Vec<String>> {
    match field {
        "name" => Some(vec![group.name.clone()]),
        "businessUnit" => Some(vec![group.business_unit.clone()]),
        _ => None,
    }
}

fn unknown(collection: &str, field: &str) -> StoreError {
    StoreError::UnknownField {
        collection: collection.to_string(),
        field: field.to_string(),
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn find_user(&self, reference: &str) -> Result<Option<DirectoryRecord>, StoreError> {
        let state = self.state.read().await;
        if let Some(record) = state.users.get(reference) {
            return Ok(Some(record.clone()));
        }
        Ok(state
            .users
            .values()
            .find(|record| record.is_referenced_by(reference))
            .cloned())
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<DirectoryRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn distinct_values(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Vec<String>, StoreError> {
        FaultPlan::check(&self.faults.distinct_values, "distinct_values")?;
        let state = self.state.read().await;
        let mut values = BTreeSet::new();
        match collection {
            "users" => {
                for record in state.users.values() {
                    let found =
                        user_field_values(record, field).ok_or_else(|| unknown(collection, field))?;
                    values.extend(found);
                }
            }
            "groups" => {
                for group in state.groups.values() {
                    let found =
                        group_field_values(group, field).ok_or_else(|| unknown(collection, field))?;
                    values.extend(found);
                }
            }
            _ => return Err(unknown(collection, field)),
        }
        Ok(values
            .into_iter()
            .filter(|value| !value.trim().is_empty())
            .collect())
    }

    async fn update_user_fields(
        &self,
        user_id: &str,
        set: &BTreeMap<Field, serde_json::Value>,
        unset: &[Field],
    ) -> Result<Option<DirectoryRecord>, StoreError> {
        let mut state = self.state.write().await;
        let Some(record) = state.users.get_mut(user_id) else {
            return Ok(None);
        };
        for (field, value) in set {
            record.set_field_json(*field, value);
        }
        for field in unset {
            record.clear_field(*field);
        }
        Ok(Some(record.clone()))
    }

    async fn find_group(&self, reference: &str) -> Result<Option<Group>, StoreError> {
        let state = self.state.read().await;
        if let Some(group) = state.groups.get(reference) {
            return Ok(Some(group.clone()));
        }
        Ok(state
            .groups
            .values()
            .find(|group| group.is_referenced_by(reference))
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        Ok(self.state.read().await.groups.values().cloned().collect())
    }

    async fn find_membership(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .get(&(user_id.to_string(), group_id.to_string()))
            .cloned())
    }

    async fn upsert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        let key = (membership.user_id.clone(), membership.group_id.clone());
        self.state.write().await.memberships.insert(key, membership);
        Ok(())
    }

    async fn delete_membership(&self, user_id: &str, group_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .memberships
            .remove(&(user_id.to_string(), group_id.to_string()))
            .is_some())
    }

    async fn list_memberships(&self, group_id: &str) -> Result<Vec<Membership>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .values()
            .filter(|membership| membership.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn insert_diff(&self, diff: Diff) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.diffs.contains_key(&diff.id) {
            return Err(StoreError::Duplicate(diff.id));
        }
        state.diffs.insert(diff.id.clone(), diff);
        Ok(())
    }

    async fn find_diff(&self, id: &str) -> Result<Option<Diff>, StoreError> {
        Ok(self.state.read().await.diffs.get(id).cloned())
    }

    async fn claim_diff(&self, id: &str) -> Result<DiffClaim, StoreError> {
        let mut state = self.state.write().await;
        if state.applied.insert(id.to_string()) {
            Ok(DiffClaim::First)
        } else {
            Ok(DiffClaim::AlreadyApplied)
        }
    }

    async fn insert_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        FaultPlan::check(&self.faults.audit_writes, "insert_audit")?;
        self.state.write().await.audit.push(entry);
        Ok(())
    }

    async fn list_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state.audit.iter().rev().take(limit).cloned().collect())
    }

    async fn insert_rule_event(&self, event: RuleEvent) -> Result<(), StoreError> {
        FaultPlan::check(&self.faults.rule_event_writes, "insert_rule_event")?;
        self.state.write().await.rule_events.push(event);
        Ok(())
    }

    async fn list_rule_events(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<RuleEvent>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .rule_events
            .iter()
            .rev()
            .filter(|event| event.group_id == group_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_find_user_by_any_reference() {
        let store = InMemoryDirectoryStore::demo();
        for reference in ["u_jane", "jane.doe@demo.local", "Jane Doe"] {
            let user = store.find_user(reference).await.unwrap().unwrap();
            assert_eq!(user.id, "u_jane");
        }
        assert!(store.find_user("jane").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_distinct_values_flatten_lists() {
        let store = InMemoryDirectoryStore::demo();
        let tags = store.distinct_values("users", "tags").await.unwrap();
        assert_eq!(
            tags,
            vec!["AI", "Analytics", "HSE", "Leadership", "Operations", "Responder"]
        );
        let err = store.distinct_values("users", "salary").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }

    #[tokio::test]
    async fn test_claim_diff_is_at_most_once_under_concurrency() {
        let store = Arc::new(InMemoryDirectoryStore::demo());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.claim_diff("d_1").await }));
        }
        let claims = futures::future::join_all(handles).await;
        let first = claims
            .into_iter()
            .filter(|claim| matches!(claim, Ok(Ok(DiffClaim::First))))
            .count();
        assert_eq!(first, 1);
    }

    #[tokio::test]
    async fn test_distinct_values_fault() {
        let store = InMemoryDirectoryStore::demo();
        store.faults().distinct_values.store(true, Ordering::SeqCst);
        let err = store.distinct_values("users", "location").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_update_user_fields() {
        let store = InMemoryDirectoryStore::demo();
        let set = BTreeMap::from([(Field::Location, serde_json::json!("Remote"))]);
        let updated = store
            .update_user_fields("u_jane", &set, &[Field::Manager])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.location.as_deref(), Some("Remote"));
        assert_eq!(updated.manager, None);
        assert!(store
            .update_user_fields("u_nobody", &set, &[])
            .await
            .unwrap()
            .is_none());
    }
}
