//! Membership tallies for audit entries and apply results

use std::collections::{BTreeMap, BTreeSet};

use crate::directory::{ChangeTallies, Membership, MembershipTally};

pub const MAX_SUMMARY_NAMES: usize = 5;
pub const MAX_SUMMARY_RULES: usize = 3;

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Count plus the first unique display names and `Label: value` rule strings
pub fn summarize(entries: &[Membership], names: &BTreeMap<String, String>) -> MembershipTally {
    let mut display_names = Vec::new();
    let mut rules = Vec::new();
    for entry in entries {
        if let Some(name) = names.get(&entry.user_id) {
            push_unique(&mut display_names, name.clone());
        }
        let label = entry.rule_type.label();
        let rule = match entry.rule_value.as_deref().filter(|v| !v.is_empty()) {
            Some(value) => format!("{label}: {value}"),
            None => label.to_string(),
        };
        push_unique(&mut rules, rule);
    }
    display_names.truncate(MAX_SUMMARY_NAMES);
    rules.truncate(MAX_SUMMARY_RULES);
    MembershipTally {
        count: entries.len(),
        names: display_names,
        rules,
    }
}

/// Every after entry counts as added; a before entry counts as removed when
/// its `(user, group)` pair is gone afterwards.
pub fn tally_changes(
    before: &[Membership],
    after: &[Membership],
    names: &BTreeMap<String, String>,
) -> ChangeTallies {
    let kept: BTreeSet<(&str, &str)> = after
        .iter()
        .map(|m| (m.user_id.as_str(), m.group_id.as_str()))
        .collect();
    let removed: Vec<Membership> = before
        .iter()
        .filter(|m| !kept.contains(&(m.user_id.as_str(), m.group_id.as_str())))
        .cloned()
        .collect();

    ChangeTallies {
        before: summarize(before, names),
        after: summarize(after, names),
        added: summarize(after, names),
        removed: summarize(&removed, names),
    }
}
