//! Synonym canonicalization
//!
//! A [`SynonymTable`] maps surface phrasings ("full time", "FULL_TIME",
//! "contractors") onto the canonical value stored in the directory
//! ("Full-time", "Contractor"). Tables are immutable snapshots: they are
//! built once from a [`SynonymSeed`] and optionally from live directory
//! values, then swapped whole through [`SharedSynonyms`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use super::names::{find_word, EmployeeNameIndex};
use crate::directory::DirectoryStore;
use crate::rules::RuleType;

const BUILTIN_SEED: &str = include_str!("../../config/nlp_synonyms.yaml");

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynonymCategory {
    Location,
    Role,
    EmploymentType,
    Manager,
    DirectoryGroup,
    Department,
    Tags,
    User,
}

impl SynonymCategory {
    /// Lookup order for resolving a bare rule value
    pub const ALL: [SynonymCategory; 8] = [
        SynonymCategory::Location,
        SynonymCategory::Role,
        SynonymCategory::EmploymentType,
        SynonymCategory::Manager,
        SynonymCategory::DirectoryGroup,
        SynonymCategory::Department,
        SynonymCategory::Tags,
        SynonymCategory::User,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SynonymCategory::Location => "location",
            SynonymCategory::Role => "role",
            SynonymCategory::EmploymentType => "employment-type",
            SynonymCategory::Manager => "manager",
            SynonymCategory::DirectoryGroup => "directory-group",
            SynonymCategory::Department => "department",
            SynonymCategory::Tags => "tags",
            SynonymCategory::User => "user",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key)
    }

    /// Directory record field whose distinct values feed this category
    pub fn directory_field(&self) -> Option<&'static str> {
        match self {
            SynonymCategory::Location => Some("location"),
            SynonymCategory::Role => Some("role"),
            SynonymCategory::EmploymentType => Some("employmentType"),
            SynonymCategory::Manager => Some("manager"),
            SynonymCategory::DirectoryGroup => Some("directoryGroups"),
            SynonymCategory::Department => Some("department"),
            SynonymCategory::Tags => Some("tags"),
            SynonymCategory::User => None,
        }
    }

    pub fn rule_type(&self) -> RuleType {
        match self {
            SynonymCategory::Location => RuleType::Location,
            SynonymCategory::Role => RuleType::Role,
            SynonymCategory::EmploymentType => RuleType::EmploymentType,
            SynonymCategory::Manager => RuleType::Manager,
            SynonymCategory::DirectoryGroup => RuleType::DirectoryGroup,
            SynonymCategory::Department => RuleType::Tree,
            SynonymCategory::Tags => RuleType::Tag,
            SynonymCategory::User => RuleType::User,
        }
    }
}

impl fmt::Display for SynonymCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ============================================================================
// Seed
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanPhrases {
    #[serde(default)]
    pub active: Vec<String>,
    #[serde(default)]
    pub inactive: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenurePhrases {
    #[serde(default)]
    pub less_than_30: Vec<String>,
    #[serde(default)]
    pub greater_than_365: Vec<String>,
}

/// Static synonym data, as stored in `config/nlp_synonyms.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymSeed {
    /// category key -> canonical value -> alternate phrasings
    #[serde(default)]
    pub value_synonyms: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub employee_names: Vec<String>,
    #[serde(default)]
    pub boolean_values: BooleanPhrases,
    #[serde(default)]
    pub tenure_phrases: TenurePhrases,
}

impl SynonymSeed {
    /// The seed compiled into the crate
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_yaml_str(BUILTIN_SEED).context("parsing built-in synonym seed")
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("invalid synonym seed YAML")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading synonym seed {}", path.display()))?;
        let seed = Self::from_yaml_str(&content)
            .with_context(|| format!("loading synonym seed {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            categories = seed.value_synonyms.len(),
            names = seed.employee_names.len(),
            "loaded synonym seed"
        );
        Ok(seed)
    }

    /// Canonical values listed for a category
    pub fn canonical_values(&self, category: SynonymCategory) -> Vec<String> {
        self.value_synonyms
            .get(category.key())
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Surface forms
// ============================================================================

/// Fold a phrase for lookup: NFKC, lowercase, `_`/`-` as spaces, single spaces.
pub fn normalize_surface(text: &str) -> String {
    let folded: String = text
        .nfkc()
        .flat_map(char::to_lowercase)
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// English plural heuristic; `None` for words already ending in `s`.
pub fn pluralize(word: &str) -> Option<String> {
    if word.is_empty() || word.ends_with('s') {
        return None;
    }
    if let Some(stem) = word.strip_suffix('y') {
        let consonant_before = stem
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphabetic() && !"aeiou".contains(c));
        if consonant_before {
            return Some(format!("{stem}ies"));
        }
    }
    Some(format!("{word}s"))
}

/// Every surface form generated for a canonical value
pub fn surface_variants(canonical: &str) -> BTreeSet<String> {
    let lower = canonical.trim().to_lowercase();
    let mut variants = BTreeSet::new();
    if lower.is_empty() {
        return variants;
    }
    variants.insert(lower.clone());
    variants.insert(lower.replace('_', " "));
    variants.insert(lower.replace(' ', "_"));
    variants.insert(lower.replace('-', " "));
    variants.insert(lower.replace(' ', "-"));
    if let Some(plural) = pluralize(&lower) {
        variants.insert(plural);
    }
    variants
}

/// Whether any phrase occurs in `text` as whole words
pub(crate) fn contains_phrase(text: &str, phrases: &[String]) -> bool {
    let lowered = text.to_lowercase();
    phrases
        .iter()
        .map(|phrase| phrase.trim().to_lowercase())
        .any(|phrase| find_word(&lowered, &phrase).is_some())
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CategoryIndex {
    /// canonical -> surface variants
    variants: BTreeMap<String, BTreeSet<String>>,
    /// normalized surface -> canonical
    inverse: BTreeMap<String, String>,
}

/// A phrase found in free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymMatch {
    pub canonical: String,
    /// Normalized surface that matched
    pub surface: String,
    pub position: usize,
}

/// Immutable, versioned synonym snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymTable {
    version: String,
    categories: BTreeMap<SynonymCategory, CategoryIndex>,
    names: EmployeeNameIndex,
    boolean: BooleanPhrases,
    tenure: TenurePhrases,
}

impl SynonymTable {
    pub fn from_seed(seed: &SynonymSeed) -> Self {
        SynonymTableBuilder::from_seed(seed).build()
    }

    pub fn builder() -> SynonymTableBuilder {
        SynonymTableBuilder::default()
    }

    /// Content hash of the snapshot
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn names(&self) -> &EmployeeNameIndex {
        &self.names
    }

    pub fn boolean_phrases(&self) -> &BooleanPhrases {
        &self.boolean
    }

    pub fn tenure_phrases(&self) -> &TenurePhrases {
        &self.tenure
    }

    pub fn canonical_values(&self, category: SynonymCategory) -> Vec<&str> {
        self.categories
            .get(&category)
            .map(|index| index.variants.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn variants(&self, category: SynonymCategory, canonical: &str) -> Option<&BTreeSet<String>> {
        self.categories.get(&category)?.variants.get(canonical)
    }

    /// Number of surface entries across all categories
    pub fn len(&self) -> usize {
        self.categories.values().map(|index| index.inverse.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical value for an exact (folded) surface form
    pub fn canonical(&self, category: SynonymCategory, raw: &str) -> Option<&str> {
        self.categories
            .get(&category)?
            .inverse
            .get(&normalize_surface(raw))
            .map(String::as_str)
    }

    /// Canonical value, or `raw` unchanged when unknown
    pub fn canonicalize(&self, category: SynonymCategory, raw: &str) -> String {
        self.canonical(category, raw)
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string())
    }

    /// First category (in [`SynonymCategory::ALL`] order) that knows `raw`
    pub fn canonical_rule_value(&self, raw: &str) -> Option<(SynonymCategory, String)> {
        SynonymCategory::ALL.into_iter().find_map(|category| {
            self.canonical(category, raw)
                .map(|canonical| (category, canonical.to_string()))
        })
    }

    /// Every whole-word mention of a category value, earliest first
    pub fn find_matches(&self, category: SynonymCategory, text: &str) -> Vec<SynonymMatch> {
        let Some(index) = self.categories.get(&category) else {
            return Vec::new();
        };
        let haystack = normalize_surface(text);
        let mut found: Vec<SynonymMatch> = index
            .inverse
            .iter()
            .filter_map(|(surface, canonical)| {
                find_word(&haystack, surface).map(|position| SynonymMatch {
                    canonical: canonical.clone(),
                    surface: surface.clone(),
                    position,
                })
            })
            .collect();
        found.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| b.surface.len().cmp(&a.surface.len()))
        });
        found
    }

    pub fn find_first(&self, category: SynonymCategory, text: &str) -> Option<SynonymMatch> {
        self.find_matches(category, text).into_iter().next()
    }

    /// Distinct canonical values mentioned in `text`, in order of first mention
    pub fn find_all(&self, category: SynonymCategory, text: &str) -> Vec<String> {
        let mut ordered: Vec<String> = Vec::new();
        for found in self.find_matches(category, text) {
            if !ordered.contains(&found.canonical) {
                ordered.push(found.canonical);
            }
        }
        ordered
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SynonymTableBuilder {
    values: BTreeMap<SynonymCategory, Vec<String>>,
    /// (category, lowercase canonical) -> alternate phrasings
    alternates: BTreeMap<(SynonymCategory, String), Vec<String>>,
    names: Vec<String>,
    boolean: BooleanPhrases,
    tenure: TenurePhrases,
}

/// Trimmed, case-insensitively unique values in first-seen order
fn unique_values<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter_map(|value| {
            let value = value.as_ref().trim();
            (!value.is_empty() && seen.insert(value.to_lowercase())).then(|| value.to_string())
        })
        .collect()
}

impl SynonymTableBuilder {
    pub fn from_seed(seed: &SynonymSeed) -> Self {
        let mut builder = Self {
            names: seed.employee_names.clone(),
            boolean: seed.boolean_values.clone(),
            tenure: seed.tenure_phrases.clone(),
            ..Self::default()
        };
        for (key, values) in &seed.value_synonyms {
            let Some(category) = SynonymCategory::from_key(key) else {
                tracing::debug!(category = %key, "ignoring unknown synonym category");
                continue;
            };
            for (canonical, alternates) in values {
                builder
                    .alternates
                    .insert((category, canonical.trim().to_lowercase()), alternates.clone());
            }
            builder
                .values
                .insert(category, unique_values(values.keys()));
        }
        builder
    }

    /// Replace the canonical values of one category; seed alternates for
    /// values that survive are kept.
    pub fn category_values<I, S>(mut self, category: SynonymCategory, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.values.insert(category, unique_values(values));
        self
    }

    pub fn employee_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names = unique_values(names);
        self
    }

    pub fn build(self) -> SynonymTable {
        let mut categories = BTreeMap::new();
        for (category, values) in &self.values {
            let mut index = CategoryIndex::default();
            for canonical in values {
                let mut variants = surface_variants(canonical);
                if let Some(alternates) = self.alternates.get(&(*category, canonical.to_lowercase())) {
                    variants.extend(
                        alternates
                            .iter()
                            .map(|alt| alt.trim().to_lowercase())
                            .filter(|alt| !alt.is_empty()),
                    );
                }
                for variant in &variants {
                    index
                        .inverse
                        .entry(normalize_surface(variant))
                        .or_insert_with(|| canonical.clone());
                }
                index.variants.insert(canonical.clone(), variants);
            }
            categories.insert(*category, index);
        }

        let names = EmployeeNameIndex::new(&self.names);
        let version = snapshot_version(&categories, &names, &self.boolean, &self.tenure);
        let table = SynonymTable {
            version,
            categories,
            names,
            boolean: self.boolean,
            tenure: self.tenure,
        };
        tracing::debug!(
            version = %table.version,
            entries = table.len(),
            names = table.names.names().len(),
            "built synonym snapshot"
        );
        table
    }
}

fn snapshot_version(
    categories: &BTreeMap<SynonymCategory, CategoryIndex>,
    names: &EmployeeNameIndex,
    boolean: &BooleanPhrases,
    tenure: &TenurePhrases,
) -> String {
    let mut hasher = Sha256::new();
    for (category, index) in categories {
        hasher.update(category.key().as_bytes());
        hasher.update(b"\n");
        for (surface, canonical) in &index.inverse {
            hasher.update(surface.as_bytes());
            hasher.update(b"=");
            hasher.update(canonical.as_bytes());
            hasher.update(b"\n");
        }
    }
    for (label, phrases) in [
        ("names", names.names()),
        ("active", boolean.active.as_slice()),
        ("inactive", boolean.inactive.as_slice()),
        ("lt30", tenure.less_than_30.as_slice()),
        ("gt365", tenure.greater_than_365.as_slice()),
    ] {
        hasher.update(label.as_bytes());
        for phrase in phrases {
            hasher.update(b"|");
            hasher.update(phrase.as_bytes());
        }
        hasher.update(b"\n");
    }
    hex::encode(&hasher.finalize()[..8])
}

// ============================================================================
// Dynamic assembly
// ============================================================================

/// Build a snapshot from the directory's distinct values.
///
/// Each category falls back to the seed when the query fails or returns
/// nothing. Never fails.
pub async fn assemble_from_directory(store: &dyn DirectoryStore, seed: &SynonymSeed) -> SynonymTable {
    let mut builder = SynonymTableBuilder::from_seed(seed);

    for category in SynonymCategory::ALL {
        let Some(field) = category.directory_field() else {
            continue;
        };
        match store.distinct_values("users", field).await {
            Ok(values) if !values.is_empty() => {
                builder = builder.category_values(category, values);
            }
            Ok(_) => {
                tracing::debug!(%category, "no directory values; using seed synonyms");
            }
            Err(error) => {
                tracing::warn!(%category, %error, "distinct value query failed; using seed synonyms");
            }
        }
    }

    match store.distinct_values("users", "displayName").await {
        Ok(names) if !names.is_empty() => builder = builder.employee_names(names),
        Ok(_) => tracing::debug!("no directory names; using seed employee names"),
        Err(error) => tracing::warn!(%error, "display name query failed; using seed employee names"),
    }

    builder.build()
}

// ============================================================================
// Shared snapshot
// ============================================================================

/// Current snapshot, replaced whole on reload
#[derive(Debug)]
pub struct SharedSynonyms {
    current: RwLock<Arc<SynonymTable>>,
}

impl SharedSynonyms {
    pub fn new(table: SynonymTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    /// Snapshot for one parse; later swaps do not affect it
    pub fn current(&self) -> Arc<SynonymTable> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a new snapshot, returning the previous one
    pub fn swap(&self, table: SynonymTable) -> Arc<SynonymTable> {
        let next = Arc::new(table);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(
            from = %guard.version(),
            to = %next.version(),
            entries = next.len(),
            "swapped synonym snapshot"
        );
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> SynonymTable {
        SynonymTable::from_seed(&SynonymSeed::builtin().unwrap())
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("contractor").as_deref(), Some("contractors"));
        assert_eq!(pluralize("secretary").as_deref(), Some("secretaries"));
        assert_eq!(pluralize("day").as_deref(), Some("days"));
        assert_eq!(pluralize("analytics"), None);
    }

    #[test]
    fn test_normalize_surface() {
        assert_eq!(normalize_surface("  FULL_TIME "), "full time");
        assert_eq!(normalize_surface("Full-Time"), "full time");
        assert_eq!(normalize_surface("Ｈｏｕｓｔｏｎ  HQ"), "houston hq");
    }

    #[test]
    fn test_canonicalization_is_separator_tolerant() {
        let table = table();
        for raw in ["full time", "Full-Time", "FULL_TIME", "full-times"] {
            assert_eq!(
                table.canonical(SynonymCategory::EmploymentType, raw),
                Some("Full-time"),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_unknown_passes_through() {
        let table = table();
        assert_eq!(table.canonicalize(SynonymCategory::Location, "Mars Base"), "Mars Base");
        assert_eq!(table.canonicalize(SynonymCategory::Location, "houston"), "Houston HQ");
    }

    #[test]
    fn test_rule_value_category_order() {
        let table = table();
        assert_eq!(
            table.canonical_rule_value("contractors"),
            Some((SynonymCategory::EmploymentType, "Contractor".into()))
        );
        // HSE is both a department and a tag; department comes first.
        assert_eq!(
            table.canonical_rule_value("hse"),
            Some((SynonymCategory::Department, "HSE".into()))
        );
        assert_eq!(table.canonical_rule_value("nothing like this"), None);
    }

    #[test]
    fn test_find_all_orders_by_first_mention() {
        let table = table();
        let found = table.find_all(
            SynonymCategory::Location,
            "move from Remote to the houston office",
        );
        assert_eq!(found, vec!["Remote".to_string(), "Houston HQ".to_string()]);
    }

    #[test]
    fn test_find_requires_word_boundaries() {
        let table = table();
        assert!(table.find_first(SynonymCategory::Tags, "hsexyz").is_none());
        let found = table.find_first(SynonymCategory::Tags, "people tagged HSE").unwrap();
        assert_eq!(found.canonical, "HSE");
    }

    #[test]
    fn test_dynamic_values_keep_seed_alternates() {
        let seed = SynonymSeed::builtin().unwrap();
        let table = SynonymTableBuilder::from_seed(&seed)
            .category_values(SynonymCategory::Location, ["Houston HQ", "Denver Hub"])
            .build();
        assert_eq!(table.canonical(SynonymCategory::Location, "houston office"), Some("Houston HQ"));
        assert_eq!(table.canonical(SynonymCategory::Location, "denver hubs"), Some("Denver Hub"));
        assert_eq!(table.canonical(SynonymCategory::Location, "remote"), None);
    }

    #[test]
    fn test_version_tracks_content() {
        let seed = SynonymSeed::builtin().unwrap();
        let a = SynonymTable::from_seed(&seed);
        let b = SynonymTable::from_seed(&seed);
        assert_eq!(a.version(), b.version());
        let c = SynonymTableBuilder::from_seed(&seed)
            .employee_names(["Someone Else"])
            .build();
        assert_ne!(a.version(), c.version());
    }

    #[test]
    fn test_shared_snapshot_swap_keeps_in_flight_arc() {
        let seed = SynonymSeed::builtin().unwrap();
        let shared = SharedSynonyms::new(SynonymTable::from_seed(&seed));
        let in_flight = shared.current();
        let replacement = SynonymTableBuilder::from_seed(&seed)
            .category_values(SynonymCategory::Location, ["Denver Hub"])
            .build();
        let previous = shared.swap(replacement);
        assert_eq!(previous.version(), in_flight.version());
        assert!(in_flight.canonical(SynonymCategory::Location, "houston").is_some());
        assert!(shared.current().canonical(SynonymCategory::Location, "houston").is_none());
    }

    #[test]
    fn test_load_seed_from_disk() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "value_synonyms:\n  location:\n    Denver Hub: [mile high]\nemployee_names: [Pat Quinn]"
        )
        .unwrap();
        let seed = SynonymSeed::load(file.path()).unwrap();
        let table = SynonymTable::from_seed(&seed);
        assert_eq!(table.canonical(SynonymCategory::Location, "Mile High"), Some("Denver Hub"));
        assert_eq!(table.names().names(), ["Pat Quinn".to_string()]);
    }

    #[test]
    fn test_bad_seed_is_an_error() {
        assert!(SynonymSeed::from_yaml_str("value_synonyms: [1, 2").is_err());
    }
}
