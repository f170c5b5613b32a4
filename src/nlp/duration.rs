//! Tenure phrases to day boundaries
//!
//! "over 2 years" becomes `tenureDays >= 730`, "under 6 months" becomes
//! `tenureDays <= 180`. Lower bounds round up and upper bounds round down so
//! both stay inclusive.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use super::synonyms::TenurePhrases;

const UNIT: &str = r"(day|days|month|months|year|years)";
const NUMBER: &str = r"(\d+(?:\.\d+)?)";

static BETWEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:between|from)\s+{NUMBER}\s+(?:and|to|-)\s+{NUMBER}\s+{UNIT}"
    ))
    .unwrap()
});

static AT_LEAST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:over|more than|greater than|at least)\s+{NUMBER}\s+{UNIT}"
    ))
    .unwrap()
});

static AT_MOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:under|less than|fewer than|at most|no more than)\s+{NUMBER}\s+{UNIT}"
    ))
    .unwrap()
});

static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"{NUMBER}\s+{UNIT}\s+tenure")).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Inclusive lower bound
    Ceil,
    /// Inclusive upper bound
    Floor,
    Round,
}

fn unit_days(unit: &str) -> Option<f64> {
    match unit.to_lowercase().as_str() {
        "day" | "days" => Some(1.0),
        "month" | "months" => Some(30.0),
        "year" | "years" => Some(365.0),
        _ => None,
    }
}

/// Convert `value unit` to whole days. Unknown units give `None`.
pub fn duration_to_days(value: f64, unit: &str, rounding: Rounding) -> Option<i64> {
    let days = value * unit_days(unit)?;
    if !days.is_finite() {
        return None;
    }
    let rounded = match rounding {
        Rounding::Ceil => days.ceil(),
        Rounding::Floor => days.floor(),
        Rounding::Round => days.round_ties_even(),
    };
    Some(rounded as i64)
}

/// A tenure constraint in days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenureClause {
    AtLeast(i64),
    AtMost(i64),
    Below(i64),
    Between(i64, i64),
}

impl fmt::Display for TenureClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenureClause::AtLeast(days) => write!(f, "tenureDays >= {days}"),
            TenureClause::AtMost(days) => write!(f, "tenureDays <= {days}"),
            TenureClause::Below(days) => write!(f, "tenureDays < {days}"),
            TenureClause::Between(low, high) => {
                write!(f, "tenureDays >= {low} and tenureDays <= {high}")
            }
        }
    }
}

fn captured_days(caps: &regex::Captures<'_>, value: usize, unit: usize, rounding: Rounding) -> Option<i64> {
    let number: f64 = caps.get(value)?.as_str().parse().ok()?;
    duration_to_days(number, caps.get(unit)?.as_str(), rounding)
}

/// First tenure constraint stated in `text`.
///
/// Numeric forms are tried in order (between, at least, at most,
/// "N unit tenure"), then the seed's tenure phrases. A bound of zero days is
/// treated as no constraint.
pub fn extract_tenure_clause(text: &str, phrases: &TenurePhrases) -> Option<TenureClause> {
    let lowered = text.to_lowercase();

    if let Some(caps) = BETWEEN_RE.captures(&lowered) {
        let low = captured_days(&caps, 1, 3, Rounding::Ceil).filter(|d| *d != 0);
        let high = captured_days(&caps, 2, 3, Rounding::Floor).filter(|d| *d != 0);
        if let (Some(low), Some(high)) = (low, high) {
            return Some(TenureClause::Between(low.min(high), low.max(high)));
        }
    }
    if let Some(days) = AT_LEAST_RE
        .captures(&lowered)
        .and_then(|caps| captured_days(&caps, 1, 2, Rounding::Ceil))
        .filter(|d| *d != 0)
    {
        return Some(TenureClause::AtLeast(days));
    }
    if let Some(days) = AT_MOST_RE
        .captures(&lowered)
        .and_then(|caps| captured_days(&caps, 1, 2, Rounding::Floor))
        .filter(|d| *d != 0)
    {
        return Some(TenureClause::AtMost(days));
    }
    if let Some(days) = SINGLE_RE
        .captures(&lowered)
        .and_then(|caps| captured_days(&caps, 1, 2, Rounding::Ceil))
        .filter(|d| *d != 0)
    {
        return Some(TenureClause::AtLeast(days));
    }

    let mentions = |list: &[String]| {
        list.iter()
            .map(|phrase| phrase.trim().to_lowercase())
            .any(|phrase| !phrase.is_empty() && lowered.contains(&phrase))
    };
    if mentions(&phrases.less_than_30) {
        return Some(TenureClause::Below(30));
    }
    if mentions(&phrases.greater_than_365) {
        return Some(TenureClause::AtLeast(365));
    }
    None
}
