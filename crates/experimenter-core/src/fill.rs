//! Pure Cartesian-product and cross-join logic for the Work Table Manager
//! (§4.2). Nothing here touches a database; `experimenter-persistence` calls
//! `product`/`cross_join` and then handles dedup against the table's current
//! contents and the actual `INSERT`s.

use std::collections::HashMap;

use experimenter_domain::schema::KeyValue;

use crate::errors::CoreError;

/// One fully specified keyfield assignment: every keyfield name maps to
/// exactly one value.
pub type Assignment = HashMap<String, KeyValue>;

/// Computes the Cartesian product of `keyfield -> candidate values`,
/// enumerating all combinations in row-major order (the last key varies
/// fastest, §4.2). Keys are taken from `ordered_keys` so the enumeration
/// order is deterministic regardless of the input map's iteration order.
pub fn product(
    ordered_keys: &[String],
    values_by_key: &HashMap<String, Vec<KeyValue>>,
) -> Result<Vec<Assignment>, CoreError> {
    let mut combos: Vec<Assignment> = vec![HashMap::new()];
    for key in ordered_keys {
        let values = values_by_key
            .get(key)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let mut next = Vec::with_capacity(combos.len() * values.len().max(1));
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.insert(key.clone(), value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    if combos.iter().any(|c| c.is_empty()) || combos.is_empty() {
        return Err(CoreError::EmptyFill);
    }
    Ok(combos)
}

/// Cross-joins a set of product-derived combinations with a list of fully
/// specified fixed assignments (§4.2 fill from product). When only one side
/// is non-empty, the result is a plain concatenation copy of that side. A
/// keyfield present in both a product combination and a fixed assignment is
/// a `ParameterCombinationError` (`DuplicateKeyAcrossSources`).
pub fn cross_join(
    product_combos: &[Assignment],
    fixed: &[Assignment],
    all_keyfields: &[String],
) -> Result<Vec<Assignment>, CoreError> {
    let joined: Vec<Assignment> = match (product_combos.is_empty(), fixed.is_empty()) {
        (true, true) => Vec::new(),
        (false, true) => product_combos.to_vec(),
        (true, false) => fixed.to_vec(),
        (false, false) => {
            let mut out = Vec::with_capacity(product_combos.len() * fixed.len());
            for p in product_combos {
                for f in fixed {
                    for key in f.keys() {
                        if p.contains_key(key) {
                            return Err(CoreError::DuplicateKeyAcrossSources(key.clone()));
                        }
                    }
                    let mut merged = p.clone();
                    merged.extend(f.clone());
                    out.push(merged);
                }
            }
            out
        }
    };

    if joined.is_empty() {
        return Err(CoreError::EmptyFill);
    }

    for assignment in &joined {
        let mut got: Vec<String> = assignment.keys().cloned().collect();
        got.sort();
        let mut expected: Vec<String> = all_keyfields.to_vec();
        expected.sort();
        if got != expected {
            return Err(CoreError::IncompleteCombination {
                expected: all_keyfields.to_vec(),
                got: assignment.keys().cloned().collect(),
            });
        }
    }

    Ok(joined)
}

/// The ordered tuple representation of an assignment used to compare against
/// existing rows during dedup (§4.2, §9 "runtime reflection on column
/// names" design note: compare typed values, not string patterns).
pub fn canonical_tuple(keys: &[String], assignment: &Assignment) -> Vec<String> {
    keys.iter()
        .map(|k| {
            assignment
                .get(k)
                .map(|v| v.canonical_string())
                .unwrap_or_default()
        })
        .collect()
}

/// Filters `candidates` down to those whose canonical tuple is not already
/// present in `existing` (§4.2 deduplication).
pub fn dedup_against_existing(
    keys: &[String],
    candidates: Vec<Assignment>,
    existing: &std::collections::HashSet<Vec<String>>,
) -> Vec<Assignment> {
    candidates
        .into_iter()
        .filter(|c| !existing.contains(&canonical_tuple(keys, c)))
        .collect()
}
