//! Rule matching
//!
//! Each rule type becomes one query against the directory store:
//!
//! | Rule type | Query |
//! |---|---|
//! | user | display name or email, at most one record |
//! | tree | orgUnit or department equals value |
//! | location, role, employment-type, manager | field equals value |
//! | tag, directory-group | list field contains value |
//! | tenure-window | `N+` or inclusive `A-B` on tenureDays |
//! | saved-filter | named predicate; unknown names match nobody |
//! | expression | evaluated record by record; any failure fails the request |

use std::fmt;

use rule_expr::{CompiledExpression, ExprError, Field};

use super::saved_filters::find_saved_filter;
use super::RuleType;
use crate::directory::{DirectoryRecord, DirectoryStore, UserFilter};
use crate::error::{DlError, DlResult};

// ============================================================================
// Tenure windows
// ============================================================================

/// Inclusive tenure range in days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenureWindow {
    pub min: i64,
    pub max: Option<i64>,
}

impl TenureWindow {
    /// Parse `"N+"` or `"A-B"`
    pub fn parse(value: &str) -> DlResult<Self> {
        let malformed = || DlError::MalformedRuleValue("Invalid tenure window format.".into());
        let value = value.trim();
        if value.is_empty() {
            return Err(DlError::MalformedRuleValue(
                "Tenure window value required.".into(),
            ));
        }

        if let Some(min) = value.strip_suffix('+') {
            let min = min.trim().parse::<i64>().map_err(|_| malformed())?;
            return Ok(Self { min, max: None });
        }

        let (lower, upper) = value.split_once('-').ok_or_else(malformed)?;
        let min = lower.trim().parse::<i64>().map_err(|_| malformed())?;
        let max = upper.trim().parse::<i64>().map_err(|_| malformed())?;
        Ok(Self {
            min,
            max: Some(max),
        })
    }

    pub fn contains(&self, days: i64) -> bool {
        days >= self.min && self.max.map_or(true, |max| days <= max)
    }

    pub fn to_filter(self) -> UserFilter {
        UserFilter::TenureRange {
            min: self.min,
            max: self.max,
        }
    }
}

impl fmt::Display for TenureWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}-{}", self.min, max),
            None => write!(f, "{}+", self.min),
        }
    }
}

// ============================================================================
// Matcher
// ============================================================================

pub struct RuleMatcher<'a> {
    store: &'a dyn DirectoryStore,
}

fn required<'v>(rule_type: RuleType, value: Option<&'v str>) -> DlResult<&'v str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            DlError::MalformedRuleValue(format!("{} value is required.", rule_type.label()))
        })
}

impl<'a> RuleMatcher<'a> {
    pub fn new(store: &'a dyn DirectoryStore) -> Self {
        Self { store }
    }

    /// Records matching a rule. `expression` is used only by expression
    /// rules and must already be compiled.
    pub async fn match_users(
        &self,
        rule_type: RuleType,
        value: Option<&str>,
        expression: Option<&CompiledExpression>,
    ) -> DlResult<Vec<DirectoryRecord>> {
        let filter = match rule_type {
            RuleType::User => {
                let value = value
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| DlError::MalformedRuleValue("User value is required.".into()))?;
                let mut found = self
                    .store
                    .find_users(&UserFilter::Identity(value.to_string()))
                    .await?;
                found.truncate(1);
                return Ok(found);
            }
            RuleType::Tree => UserFilter::AnyFieldEquals(
                vec![Field::OrgUnit, Field::Department],
                required(rule_type, value)?.to_string(),
            ),
            RuleType::Location => Self::equals(Field::Location, rule_type, value)?,
            RuleType::Role => Self::equals(Field::Role, rule_type, value)?,
            RuleType::EmploymentType => Self::equals(Field::EmploymentType, rule_type, value)?,
            RuleType::Manager => Self::equals(Field::Manager, rule_type, value)?,
            RuleType::Tag => {
                UserFilter::HasElement(Field::Tags, required(rule_type, value)?.to_string())
            }
            RuleType::DirectoryGroup => UserFilter::HasElement(
                Field::DirectoryGroups,
                required(rule_type, value)?.to_string(),
            ),
            RuleType::TenureWindow => TenureWindow::parse(value.unwrap_or_default())?.to_filter(),
            RuleType::SavedFilter => {
                let name = required(rule_type, value)?;
                let Some(saved) = find_saved_filter(name) else {
                    tracing::debug!(name, "unknown saved filter; matching nobody");
                    return Ok(Vec::new());
                };
                let everyone = self.store.find_users(&UserFilter::All).await?;
                return Ok(everyone
                    .into_iter()
                    .filter(|record| saved.matches(record))
                    .collect());
            }
            RuleType::Expression => {
                let compiled = expression.ok_or(DlError::Expression(ExprError::Empty))?;
                return self.match_expression(compiled).await;
            }
            RuleType::EmployeeRecord => {
                return Err(DlError::InvalidRequest(
                    "Employee record rules change fields, not memberships.".into(),
                ));
            }
        };

        let found = self.store.find_users(&filter).await?;
        tracing::debug!(%rule_type, ?filter, matches = found.len(), "matched rule");
        Ok(found)
    }

    /// Evaluate against every record. The first evaluation error fails the
    /// whole match.
    pub async fn match_expression(
        &self,
        compiled: &CompiledExpression,
    ) -> DlResult<Vec<DirectoryRecord>> {
        let everyone = self.store.find_users(&UserFilter::All).await?;
        let mut matched = Vec::new();
        for record in everyone {
            if compiled.evaluate(&record)? {
                matched.push(record);
            }
        }
        tracing::debug!(
            expression = compiled.source(),
            matches = matched.len(),
            "evaluated expression"
        );
        Ok(matched)
    }

    fn equals(field: Field, rule_type: RuleType, value: Option<&str>) -> DlResult<UserFilter> {
        Ok(UserFilter::FieldEquals(
            field,
            required(rule_type, value)?.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectoryStore;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    async fn ids(rule_type: RuleType, value: &str) -> Vec<String> {
        let store = InMemoryDirectoryStore::demo();
        RuleMatcher::new(&store)
            .match_users(rule_type, Some(value), None)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect()
    }

    #[test]
    fn test_tenure_window_parse() {
        assert_eq!(TenureWindow::parse("365+").unwrap(), TenureWindow { min: 365, max: None });
        assert_eq!(
            TenureWindow::parse(" 91 - 180 ").unwrap(),
            TenureWindow { min: 91, max: Some(180) }
        );
        assert_eq!(TenureWindow::parse("91-180").unwrap().to_string(), "91-180");
        for bad in ["ninety", "1-2-3", "a+", "10"] {
            let err = TenureWindow::parse(bad).unwrap_err();
            assert_eq!(err.to_string(), "Invalid tenure window format.", "{bad}");
        }
        assert_eq!(
            TenureWindow::parse("").unwrap_err().to_string(),
            "Tenure window value required."
        );
    }

    #[test]
    fn test_tenure_window_bounds_are_inclusive() {
        let window = TenureWindow::parse("91-180").unwrap();
        assert!(window.contains(91));
        assert!(window.contains(180));
        assert!(!window.contains(181));
        assert!(TenureWindow::parse("365+").unwrap().contains(365));
    }

    #[tokio::test]
    async fn test_equality_and_membership_rules() {
        assert_eq!(
            ids(RuleType::Location, "Houston HQ").await,
            vec!["u_casey", "u_frank", "u_maria"]
        );
        assert_eq!(ids(RuleType::Tag, "Responder").await, vec!["u_jane", "u_maria"]);
        assert_eq!(
            ids(RuleType::DirectoryGroup, "DL_Data_Analytics").await,
            vec!["u_casey", "u_frank"]
        );
        assert_eq!(ids(RuleType::EmploymentType, "Contractor").await, vec!["u_temp"]);
        assert_eq!(ids(RuleType::Tree, "HSE").await, vec!["u_maria"]);
    }

    #[tokio::test]
    async fn test_tenure_window_rule() {
        assert_eq!(ids(RuleType::TenureWindow, "91-180").await, vec!["u_frank"]);
        assert_eq!(ids(RuleType::TenureWindow, "820+").await, vec!["u_alex", "u_casey"]);
    }

    #[tokio::test]
    async fn test_user_rule_matches_at_most_one() {
        assert_eq!(ids(RuleType::User, "casey.lee@demo.local").await, vec!["u_casey"]);
        assert!(ids(RuleType::User, "Nobody Here").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_saved_filter_matches_nobody() {
        assert!(ids(RuleType::SavedFilter, "Night Shift").await.is_empty());
        assert_eq!(ids(RuleType::SavedFilter, "HSE Responders").await, vec!["u_maria"]);
    }

    #[tokio::test]
    async fn test_missing_values_are_malformed() {
        let store = InMemoryDirectoryStore::demo();
        let matcher = RuleMatcher::new(&store);
        let err = matcher
            .match_users(RuleType::User, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User value is required.");
        let err = matcher
            .match_users(RuleType::Location, Some("  "), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRuleValue);
        let err = matcher
            .match_users(RuleType::Expression, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Expression is required.");
    }

    #[tokio::test]
    async fn test_expression_rule() {
        let store = InMemoryDirectoryStore::demo();
        let compiled =
            rule_expr::compile("tenureDays >= 90 and tenureDays <= 180").unwrap();
        let matched = RuleMatcher::new(&store)
            .match_users(RuleType::Expression, None, Some(&compiled))
            .await
            .unwrap();
        let ids: Vec<_> = matched.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["u_frank"]);
    }

    #[tokio::test]
    async fn test_expression_failure_fails_whole_match() {
        let store = InMemoryDirectoryStore::demo();
        let compiled = rule_expr::compile("tenureDays > location").unwrap();
        let err = RuleMatcher::new(&store)
            .match_expression(&compiled)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EvaluationFailed);
    }
}
