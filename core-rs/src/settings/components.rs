//! Priority-resolved component lists
//!
//! A component map associates an identifier with an optional priority. The base
//! map holds the defaults shipped with the crate, the custom map holds project
//! overrides. A `null` priority in either map disables the component.

use std::collections::BTreeMap;

/// Merge `base` and `custom` and return enabled identifiers ordered by priority.
///
/// Entries in `custom` replace entries in `base`. Identifiers with equal
/// priority keep map order (alphabetical), so the result is deterministic.
pub fn build_component_list(
    base: &BTreeMap<String, Option<i64>>,
    custom: &BTreeMap<String, Option<i64>>,
) -> Vec<String> {
    let mut merged = base.clone();
    for (identifier, priority) in custom {
        merged.insert(identifier.clone(), *priority);
    }

    let mut enabled: Vec<(String, i64)> = merged
        .into_iter()
        .filter_map(|(identifier, priority)| priority.map(|p| (identifier, p)))
        .collect();

    // sort_by_key is stable
    enabled.sort_by_key(|(_, priority)| *priority);
    enabled.into_iter().map(|(identifier, _)| identifier).collect()
}
