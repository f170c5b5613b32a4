//! Directory store boundary
//!
//! Record, group, membership, diff and audit documents, the async
//! [`DirectoryStore`] collaborator trait, and an in-memory implementation
//! seeded with demo data.

pub mod memory;
pub mod seed;
pub mod store;
pub mod types;

pub use memory::{FaultPlan, InMemoryDirectoryStore};
pub use store::{DiffClaim, DirectoryStore, StoreError};
pub use types::{
    AuditEntry, ChangeTallies, Diff, DirectoryRecord, EmployeeRecordDetail, EventActor,
    EventSummary, EventTargets, FieldChange, Group, Membership, MembershipTally,
    RecordChangePlan, RuleEvent, RuleSummary, UserFilter, INCLUDE_FLAG,
};
