//! Runtime configuration
//!
//! Read from the environment with sensible defaults; every knob can also be
//! set directly for tests.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DlError;

/// Default number of affected records above which a large-change note is added
pub const DEFAULT_LARGE_CHANGE_THRESHOLD: usize = 25;

/// Phrases that tie a manager name to a reporting relationship
pub const DEFAULT_MANAGER_CONTEXT: &[&str] = &["under", "reporting to", "reports to", "managed by"];

/// What `apply` does with a diff id that was already applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// Re-run resolution and upserts; a second audit entry is written.
    #[default]
    Rerun,
    /// Refuse with `DiffAlreadyApplied`.
    Reject,
}

impl FromStr for ReplayPolicy {
    type Err = DlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rerun" => Ok(ReplayPolicy::Rerun),
            "reject" => Ok(ReplayPolicy::Reject),
            other => Err(DlError::InvalidRequest(format!(
                "Unknown replay policy '{other}' (expected 'rerun' or 'reject')."
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DlConfig {
    pub large_change_threshold: usize,
    pub replay_policy: ReplayPolicy,
    /// Synonym seed file; `None` uses the built-in seed.
    pub synonyms_path: Option<PathBuf>,
    /// Build the synonym snapshot from live directory values.
    pub dynamic_synonyms: bool,
    pub manager_context_phrases: Vec<String>,
}

impl Default for DlConfig {
    fn default() -> Self {
        Self {
            large_change_threshold: DEFAULT_LARGE_CHANGE_THRESHOLD,
            replay_policy: ReplayPolicy::default(),
            synonyms_path: None,
            dynamic_synonyms: true,
            manager_context_phrases: DEFAULT_MANAGER_CONTEXT
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DlConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let replay_policy = match std::env::var("DL_REPLAY_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|err: DlError| {
                tracing::warn!(error = %err, "ignoring DL_REPLAY_POLICY");
                defaults.replay_policy
            }),
            Err(_) => defaults.replay_policy,
        };
        let manager_context_phrases = std::env::var("DL_MANAGER_CONTEXT")
            .map(|raw| {
                raw.split(',')
                    .map(|phrase| phrase.trim().to_lowercase())
                    .filter(|phrase| !phrase.is_empty())
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|phrases| !phrases.is_empty())
            .unwrap_or(defaults.manager_context_phrases);

        Self {
            large_change_threshold: env_usize(
                "DL_LARGE_CHANGE_THRESHOLD",
                defaults.large_change_threshold,
            ),
            replay_policy,
            synonyms_path: std::env::var("DL_SYNONYMS_PATH").ok().map(PathBuf::from),
            dynamic_synonyms: env_bool("DL_DYNAMIC_SYNONYMS", defaults.dynamic_synonyms),
            manager_context_phrases,
        }
    }

    pub fn with_replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.replay_policy = policy;
        self
    }

    pub fn with_large_change_threshold(mut self, threshold: usize) -> Self {
        self.large_change_threshold = threshold;
        self
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => default,
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DlConfig::default();
        assert_eq!(config.large_change_threshold, 25);
        assert_eq!(config.replay_policy, ReplayPolicy::Rerun);
        assert!(config.dynamic_synonyms);
        assert_eq!(config.manager_context_phrases.len(), 4);
    }

    #[test]
    fn test_replay_policy_parse() {
        assert_eq!("Reject".parse::<ReplayPolicy>().unwrap(), ReplayPolicy::Reject);
        assert_eq!(" rerun ".parse::<ReplayPolicy>().unwrap(), ReplayPolicy::Rerun);
        assert!("twice".parse::<ReplayPolicy>().is_err());
    }

    #[test]
    fn test_builders() {
        let config = DlConfig::default()
            .with_replay_policy(ReplayPolicy::Reject)
            .with_large_change_threshold(3);
        assert_eq!(config.replay_policy, ReplayPolicy::Reject);
        assert_eq!(config.large_change_threshold, 3);
    }
}
