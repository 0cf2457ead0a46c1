//! Collection ordering.
//!
//! Collections are small (typically well under 50 entries), so lookup is a
//! linear scan by key field. Insertion has two policies: plain appends for
//! interactive "add an entry" edits, and declaration order when a template
//! drives creation, so re-serializing after an edit leaves untouched siblings
//! in their original relative order.

use crate::model::BusinessObject;
use std::collections::HashMap;

/// Where a new entry lands relative to its siblings.
#[derive(Debug, Clone, Copy)]
pub enum InsertionPolicy<'a> {
    /// New entries go to the tail.
    Append,
    /// New entries keep the relative order their bindings are declared in the
    /// template. Entries from other sources (no rank) are left where they are.
    DeclarationOrder {
        rank: usize,
        key_field: &'a str,
        ranks: &'a HashMap<String, usize>,
    },
}

/// Index of the entry whose `key_field` equals `key_value`. An empty-string
/// key is a real key, matched like any other.
pub fn locate(entries: &[BusinessObject], key_field: &str, key_value: &str) -> Option<usize> {
    entries
        .iter()
        .position(|e| e.get_str(key_field) == Some(key_value))
}

pub fn insert_ordered(
    entries: &mut Vec<BusinessObject>,
    entry: BusinessObject,
    policy: InsertionPolicy<'_>,
) {
    match policy {
        InsertionPolicy::Append => entries.push(entry),
        InsertionPolicy::DeclarationOrder {
            rank,
            key_field,
            ranks,
        } => {
            // Insert before the first sibling declared after this one.
            let at = entries
                .iter()
                .position(|e| {
                    e.get_str(key_field)
                        .and_then(|k| ranks.get(k))
                        .is_some_and(|&r| r > rank)
                })
                .unwrap_or(entries.len());
            entries.insert(at, entry);
        }
    }
}
