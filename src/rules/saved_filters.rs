//! Named population predicates

use crate::directory::DirectoryRecord;
use crate::nlp::synonyms::normalize_surface;

pub struct SavedFilter {
    pub name: &'static str,
    pub description: &'static str,
    pub predicate: fn(&DirectoryRecord) -> bool,
}

impl SavedFilter {
    pub fn matches(&self, record: &DirectoryRecord) -> bool {
        (self.predicate)(record)
    }
}

impl std::fmt::Debug for SavedFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedFilter").field("name", &self.name).finish()
    }
}

pub static SAVED_FILTERS: &[SavedFilter] = &[
    SavedFilter {
        name: "HSE Responders",
        description: "Anyone tagged HSE",
        predicate: |record| record.tags.iter().any(|tag| tag == "HSE"),
    },
    SavedFilter {
        name: "Permian Engineers",
        description: "Permian Operations staff with an engineering role",
        predicate: |record| {
            record.department.as_deref() == Some("Permian Operations")
                && record.role.as_deref().is_some_and(|role| role.contains("Engineer"))
        },
    },
    SavedFilter {
        name: "Contractors Ending Soon",
        description: "Contractors within their first 30 days",
        predicate: |record| {
            record.employment_type.as_deref() == Some("Contractor")
                && record.tenure_days.unwrap_or(0) <= 30
        },
    },
];

/// Exact name first, then a case and separator insensitive match
pub fn find_saved_filter(name: &str) -> Option<&'static SavedFilter> {
    let name = name.trim();
    SAVED_FILTERS
        .iter()
        .find(|filter| filter.name == name)
        .or_else(|| {
            let wanted = normalize_surface(name);
            SAVED_FILTERS
                .iter()
                .find(|filter| normalize_surface(filter.name) == wanted)
        })
}
