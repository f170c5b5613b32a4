//! dl-intent: natural-language directory group rules
//!
//! Turns operator text such as "add contractors ending soon to
//! MSG_Production_East" into a validated rule, matches it against directory
//! records and commits the change through a two-phase propose/apply protocol
//! with audit history.
//!
//! ```text
//! text -> tokens -> spans -> canonical slots -> inferred rule
//!      -> (expression synthesis + compile) -> matcher -> diff -> apply -> audit
//! ```
//!
//! - [`nlp`]: tokenizer, BIO span decoding, synonym snapshots, rule
//!   inference and expression synthesis behind [`IntentSlotParser`].
//! - [`rules`]: rule types, saved filters and the [`RuleMatcher`].
//! - [`directory`]: the [`DirectoryStore`] collaborator and an in-memory
//!   implementation.
//! - [`changes`]: the [`ChangeService`] propose/apply state machine.
//!
//! The expression language itself lives in the `rule-expr` crate.

pub mod changes;
pub mod config;
pub mod directory;
pub mod error;
pub mod nlp;
pub mod rules;

pub use changes::{
    ApplyResult, ChangeService, ProposeRequest, ProposeResult, RecordChangesRequest,
    ValidationResult,
};
pub use config::{DlConfig, ReplayPolicy};
pub use directory::{DirectoryStore, InMemoryDirectoryStore, StoreError};
pub use error::{DlError, DlResult, ErrorKind, ErrorResponse};
pub use nlp::{IntentSlotParser, ParseResult, SynonymSeed, SynonymTable};
pub use rules::{Action, RuleMatcher, RuleType};
