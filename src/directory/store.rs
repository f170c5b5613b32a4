//! Directory store collaborator
//!
//! Everything the core reads or writes goes through [`DirectoryStore`]. The
//! persistence technology behind it is not the core's concern; the only
//! storage-level guarantee the core relies on is the at-most-once claim in
//! [`DirectoryStore::claim_diff`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use rule_expr::Field;
use thiserror::Error;

use super::types::{
    AuditEntry, Diff, DirectoryRecord, Group, Membership, RuleEvent, UserFilter,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("directory backend error: {0}")]
    Backend(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("unknown collection or field: {collection}.{field}")]
    UnknownField { collection: String, field: String },
}

/// Outcome of claiming a diff for application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffClaim {
    /// This caller is the first to apply the diff.
    First,
    /// The diff was claimed by an earlier apply.
    AlreadyApplied,
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Record by id, email or display name
    async fn find_user(&self, reference: &str) -> Result<Option<DirectoryRecord>, StoreError>;

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<DirectoryRecord>, StoreError>;

    /// Distinct non-empty values of a field, flattening list fields
    async fn distinct_values(&self, collection: &str, field: &str)
        -> Result<Vec<String>, StoreError>;

    /// Set and unset fields on one record, returning the updated record
    async fn update_user_fields(
        &self,
        user_id: &str,
        set: &BTreeMap<Field, serde_json::Value>,
        unset: &[Field],
    ) -> Result<Option<DirectoryRecord>, StoreError>;

    /// Group by id or name
    async fn find_group(&self, reference: &str) -> Result<Option<Group>, StoreError>;

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    async fn find_membership(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Option<Membership>, StoreError>;

    /// Insert or replace the membership keyed by `(user_id, group_id)`
    async fn upsert_membership(&self, membership: Membership) -> Result<(), StoreError>;

    /// Returns whether a membership was deleted
    async fn delete_membership(&self, user_id: &str, group_id: &str) -> Result<bool, StoreError>;

    async fn list_memberships(&self, group_id: &str) -> Result<Vec<Membership>, StoreError>;

    async fn insert_diff(&self, diff: Diff) -> Result<(), StoreError>;

    async fn find_diff(&self, id: &str) -> Result<Option<Diff>, StoreError>;

    /// Atomically mark a diff as applied. Concurrent callers for the same id
    /// see exactly one [`DiffClaim::First`].
    async fn claim_diff(&self, id: &str) -> Result<DiffClaim, StoreError>;

    async fn insert_audit(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Most recent first
    async fn list_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;

    async fn insert_rule_event(&self, event: RuleEvent) -> Result<(), StoreError>;

    /// Most recent first
    async fn list_rule_events(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<RuleEvent>, StoreError>;
}
