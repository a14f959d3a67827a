use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// String comparators
// ─────────────────────────────────────────────────────────────────────────────

/// How a string filter compares subject text against filter text.
///
/// Matching is case-insensitive; no whitespace trimming is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StringComparator {
    Equals,
    Contains,
    NotContains,
    BeginsWith,
    EndsWith,
}

impl StringComparator {
    pub fn matches(&self, subject: &str, filter: &str) -> bool {
        let subject = subject.to_lowercase();
        let filter = filter.to_lowercase();
        match self {
            Self::Equals => subject == filter,
            Self::Contains => subject.contains(&filter),
            Self::NotContains => !subject.contains(&filter),
            Self::BeginsWith => subject.starts_with(&filter),
            Self::EndsWith => subject.ends_with(&filter),
        }
    }
}

/// Apply an optional string filter. An unset comparator or empty filter text is
/// a no-op; a set filter against empty/absent subject text fails; otherwise the
/// comparator decides.
pub fn matches_string_filter(
    comparator: Option<StringComparator>,
    filter_text: Option<&str>,
    subject_text: Option<&str>,
) -> bool {
    let (Some(comparator), Some(filter)) = (comparator, filter_text.filter(|t| !t.is_empty()))
    else {
        return true;
    };
    match subject_text.filter(|t| !t.is_empty()) {
        Some(subject) => comparator.matches(subject, filter),
        None => false,
    }
}

/// Custom-attribute filter: succeeds on the first attribute entry whose name
/// matches `name_filter` (equality; empty/unset means any name) and where any
/// of its values matches the value filter. With neither a name nor a value
/// filter set this bypasses the map entirely and matches.
pub fn matches_custom_attribute(
    name_filter: Option<&str>,
    value_comparator: Option<StringComparator>,
    value_filter: Option<&str>,
    attributes: &HashMap<String, Vec<String>>,
) -> bool {
    let no_name_filter = name_filter.is_none_or(|n| n.is_empty());
    let no_value_filter = value_comparator.is_none() || value_filter.is_none_or(|v| v.is_empty());
    if no_name_filter && no_value_filter {
        return true;
    }
    for (name, values) in attributes {
        if !matches_string_filter(Some(StringComparator::Equals), name_filter, Some(name.as_str()))
        {
            // Name doesn't match, no need to test values.
            continue;
        }
        if values
            .iter()
            .any(|value| matches_string_filter(value_comparator, value_filter, Some(value.as_str())))
        {
            return true;
        }
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Point query
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded trace-point query. Immutable once decoded.
///
/// Field names follow the request-parameter spelling, so this decodes directly
/// from a JSON request body or query-string map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointQuery {
    /// Start of the window, wall-clock millis since the UNIX epoch.
    pub from: u64,
    /// End of the window; 0 means open-ended.
    pub to: u64,
    /// Lower duration bound in nanoseconds.
    pub duration_low: u64,
    /// Upper duration bound in nanoseconds, unbounded if unset.
    pub duration_high: Option<u64>,
    pub transaction_type: Option<String>,
    pub slow_only: bool,
    pub error_only: bool,
    pub headline: Option<String>,
    pub headline_comparator: Option<StringComparator>,
    pub transaction_name: Option<String>,
    pub transaction_name_comparator: Option<StringComparator>,
    pub error: Option<String>,
    pub error_comparator: Option<StringComparator>,
    pub user: Option<String>,
    pub user_comparator: Option<StringComparator>,
    pub custom_attribute_name: Option<String>,
    pub custom_attribute_value: Option<String>,
    pub custom_attribute_value_comparator: Option<StringComparator>,
    /// Maximum number of stored/active points to return; 0 means unbounded.
    pub limit: usize,
}

impl PointQuery {
    /// True if the queried transaction type matches `transaction_type`; an
    /// unset or empty filter matches everything.
    pub fn matches_transaction_type(&self, transaction_type: &str) -> bool {
        match self.transaction_type.as_deref().filter(|t| !t.is_empty()) {
            Some(filter) => filter == transaction_type,
            None => true,
        }
    }

    /// True if `duration_nanos` lies within the query's duration bounds.
    pub fn matches_duration(&self, duration_nanos: u64) -> bool {
        duration_nanos >= self.duration_low
            && self.duration_high.is_none_or(|high| duration_nanos <= high)
    }
}
