//! Pure alarm predicates.
//!
//! Each predicate takes already-fetched values and returns the alarm
//! message when the invariant it guards is violated, `None` otherwise.
//! Wording is shared by every check so the same judgment always reads the
//! same way in the logs.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;

use crate::backend::{Row, Value};

/// Fires when the reference count and the warehouse count differ.
pub fn mismatch(
    source: &str,
    target: &str,
    source_count: i64,
    warehouse_count: i64,
) -> Option<String> {
    (source_count != warehouse_count).then(|| {
        format!(
            "Number of {source} records does not match number of Redshift {target} records: \
             {source_count} {source} records and {warehouse_count} Redshift records"
        )
    })
}

/// [`mismatch`] for one day of a multi-day window.
pub fn mismatch_on(
    source: &str,
    target: &str,
    date: impl Display,
    source_count: i64,
    warehouse_count: i64,
) -> Option<String> {
    (source_count != warehouse_count).then(|| {
        format!(
            "Number of {source} records does not match number of Redshift {target} records \
             on {date}: {source_count} {source} records and {warehouse_count} Redshift records"
        )
    })
}

/// Fires when `count` is zero and the caller's condition holds.
pub fn no_records_found(
    source: &str,
    count: i64,
    date: impl Display,
    condition: bool,
) -> Option<String> {
    (count == 0 && condition).then(|| format!("No {source} records found for all of {date}"))
}

pub fn duplicate_code(code: &str, total: i64, distinct: i64) -> Option<String> {
    (total != distinct).then(|| {
        format!(
            "Duplicate {code} codes found in Redshift: {total} total active {code} codes \
             but only {distinct} distinct active {code} codes"
        )
    })
}

pub fn null_field(code: &str, rows: &[Row]) -> Option<String> {
    (!rows.is_empty()).then(|| {
        format!(
            "The following {code} have a null value for one or more of their inferred columns: {}",
            format_rows(rows)
        )
    })
}

/// Fires with `"{prefix}: {rows}"` when the violation query returned anything.
pub fn rows_present(prefix: &str, rows: &[Row]) -> Option<String> {
    (!rows.is_empty()).then(|| format!("{prefix}: {}", format_rows(rows)))
}

/// Fires with `"{prefix}: [...]"` when `keys` is non-empty. Keys are sorted.
pub fn keys_present<K: AsRef<str>>(prefix: &str, keys: &[K]) -> Option<String> {
    (!keys.is_empty()).then(|| format!("{prefix}: {}", format_keys(keys)))
}

pub fn threshold_floor(count: i64, floor: i64, label: &str, date: impl Display) -> Option<String> {
    (count < floor).then(|| format!("Found only {count} {label} rows for all of {date}"))
}

/// Outcome of a healthy-ratio evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthyRatio {
    /// No flags to evaluate.
    Insufficient,
    Healthy(f64),
    Unhealthy { ratio: f64, message: String },
}

impl HealthyRatio {
    pub fn message(&self) -> Option<&str> {
        match self {
            HealthyRatio::Unhealthy { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Share of `true` flags compared against `minimum` (a fraction in `[0, 1]`).
pub fn healthy_ratio(flags: &[bool], minimum: f64, label: &str) -> HealthyRatio {
    if flags.is_empty() {
        return HealthyRatio::Insufficient;
    }

    let healthy = flags.iter().filter(|flag| **flag).count();
    let ratio = healthy as f64 / flags.len() as f64;
    if ratio < minimum {
        HealthyRatio::Unhealthy {
            ratio,
            message: format!("Only {:.2}% of {label} were healthy", ratio * 100.0),
        }
    } else {
        HealthyRatio::Healthy(ratio)
    }
}

// ---- key-set comparison ----

/// Keys seen more than once, sorted and deduplicated.
pub fn duplicate_keys<K: AsRef<str>>(keys: &[K]) -> Vec<String> {
    let mut seen = HashSet::new();
    let duplicates: BTreeSet<&str> = keys
        .iter()
        .map(AsRef::as_ref)
        .filter(|key| !seen.insert(*key))
        .collect();
    duplicates.into_iter().map(str::to_string).collect()
}

/// Expected keys that were not found, sorted.
pub fn missing_keys<K: AsRef<str>, E: AsRef<str>>(found: &[K], expected: &[E]) -> Vec<String> {
    difference(expected, found)
}

/// Found keys that were not expected, sorted.
pub fn extra_keys<K: AsRef<str>, E: AsRef<str>>(found: &[K], expected: &[E]) -> Vec<String> {
    difference(found, expected)
}

fn difference<A: AsRef<str>, B: AsRef<str>>(left: &[A], right: &[B]) -> Vec<String> {
    let right: HashSet<&str> = right.iter().map(AsRef::as_ref).collect();
    let diff: BTreeSet<&str> = left
        .iter()
        .map(AsRef::as_ref)
        .filter(|key| !right.contains(key))
        .collect();
    diff.into_iter().map(str::to_string).collect()
}

// ---- formatting ----

/// Render rows for a log line. Single-column rows print as bare values,
/// wider rows as tuples: `['a', 'b']`, `[(1, 'x'), (2, 'y')]`.
pub fn format_rows(rows: &[Row]) -> String {
    let items: Vec<String> = rows.iter().map(|row| format_row(row)).collect();
    format!("[{}]", items.join(", "))
}

fn format_row(row: &[Value]) -> String {
    match row {
        [single] => single.to_string(),
        columns => {
            let values: Vec<String> = columns.iter().map(Value::to_string).collect();
            format!("({})", values.join(", "))
        }
    }
}

/// Render a sorted, quoted key list: `['a', 'b']`.
pub fn format_keys<K: AsRef<str>>(keys: &[K]) -> String {
    let mut sorted: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let quoted: Vec<String> = sorted.iter().map(|key| format!("'{key}'")).collect();
    format!("[{}]", quoted.join(", "))
}
