//! Resolution of requested entries against a per-call split table.
//!
//! Decode failures and out-of-range indices collapse to the same `None`; the
//! caller surfaces both as "no such entry".

use super::name;
use super::table::{SplitDesc, SplitLayout};

pub fn resolve_index(layout: SplitLayout, index: u64, source_size: u64) -> Option<SplitDesc> {
    layout.desc(index, source_size)
}

pub fn resolve_name(
    layout: SplitLayout,
    entry: &str,
    base: &str,
    source_size: u64,
) -> Option<SplitDesc> {
    let index = name::decode(entry, base)?;
    layout.desc(index, source_size)
}

/// Entry names for the current table, one per descriptor, in index order.
pub fn list_names(layout: SplitLayout, base: &str, source_size: u64) -> Vec<String> {
    (0..layout.split_count(source_size))
        .map(|index| name::encode(index, base))
        .collect()
}
