//! Employee display-name resolution

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static NAME_CANDIDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").unwrap());

/// Known employee names with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeNameIndex {
    names: Vec<String>,
    by_lower: BTreeMap<String, String>,
}

fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn unique<'a>(mut matches: impl Iterator<Item = &'a String>) -> Option<String> {
    let first = matches.next()?;
    match matches.next() {
        Some(_) => None,
        None => Some(first.clone()),
    }
}

impl EmployeeNameIndex {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for name in names {
            let name = name.as_ref().split_whitespace().collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();
            if index.by_lower.contains_key(&key) {
                continue;
            }
            index.by_lower.insert(key, name.clone());
            index.names.push(name);
        }
        index
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolve a (possibly partial) name.
    ///
    /// Tries, in order: exact match, a unique prefix match, a unique first-name
    /// match, a unique last-name match.
    pub fn canonicalize(&self, candidate: &str) -> Option<String> {
        let needle = fold(candidate);
        if needle.is_empty() {
            return None;
        }
        if let Some(name) = self.by_lower.get(&needle) {
            return Some(name.clone());
        }
        if let Some(name) = unique(
            self.by_lower
                .iter()
                .filter(|(lower, _)| lower.starts_with(&needle))
                .map(|(_, name)| name),
        ) {
            return Some(name);
        }

        let parts: Vec<&str> = needle.split(' ').collect();
        let first = parts.first().copied().unwrap_or_default();
        if let Some(name) = unique(
            self.by_lower
                .iter()
                .filter(|(lower, _)| lower.split(' ').next() == Some(first))
                .map(|(_, name)| name),
        ) {
            return Some(name);
        }

        let last = parts.last().copied().unwrap_or_default();
        unique(
            self.by_lower
                .iter()
                .filter(|(lower, _)| lower.split(' ').last() == Some(last))
                .map(|(_, name)| name),
        )
    }

    /// Resolve a greedy regex capture such as "Alex Rivera to the group".
    ///
    /// Leading word runs are tried longest first before falling back to
    /// [`canonicalize`](Self::canonicalize).
    pub fn match_fragment(&self, fragment: &str) -> Option<String> {
        let words: Vec<&str> = fragment.split_whitespace().collect();
        for n in (2..=words.len()).rev() {
            if let Some(name) = self.by_lower.get(&words[..n].join(" ").to_lowercase()) {
                return Some(name.clone());
            }
        }
        self.canonicalize(fragment)
    }

    /// First known employee mentioned in free text
    pub fn find_in_text(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        let earliest = self
            .by_lower
            .iter()
            .filter_map(|(lower, name)| {
                find_word(&lowered, lower).map(|position| (position, name))
            })
            .min_by_key(|(position, name)| (*position, std::cmp::Reverse(name.len())));
        if let Some((_, name)) = earliest {
            return Some(name.clone());
        }

        NAME_CANDIDATE_RE
            .find_iter(text)
            .find_map(|m| self.canonicalize(m.as_str()))
    }
}

/// Byte position of `needle` in `haystack` as a whole-word occurrence
pub(crate) fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.match_indices(needle).map(|(i, _)| i).find(|&i| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
