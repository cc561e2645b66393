//! Split table derivation.
//!
//! A `SplitLayout` turns a backing-file size into an ordered sequence of
//! contiguous, non-overlapping descriptors covering exactly `[0, size)`.
//! Every descriptor except the last has length `split_size`; the last one
//! carries the remainder. Derivation is O(1) per descriptor and never looks
//! at the file's contents, so recomputing it on every call stays negligible.

/// Default maximum split size in bytes (~100 MB).
pub const DEFAULT_SPLIT_SIZE: u64 = 100_048_576;

/// Immutable split sizing, fixed for the lifetime of a mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitLayout {
    /// Maximum length of a single split; must be positive.
    pub split_size: u64,
}

impl Default for SplitLayout {
    fn default() -> Self {
        Self {
            split_size: DEFAULT_SPLIT_SIZE,
        }
    }
}

/// One virtual split: a window of `length` bytes starting `start` bytes into
/// the backing file. Ephemeral; recomputed from the latest size sample,
/// never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitDesc {
    pub index: u64,
    pub start: u64,
    pub length: u64,
}

impl SplitLayout {
    /// `split_size` must be positive; the whole table derivation divides by it.
    pub fn new(split_size: u64) -> Self {
        assert!(split_size > 0, "split size must be positive");
        Self { split_size }
    }

    /// Number of splits for a backing file of `source_size` bytes.
    ///
    /// A zero-size backing file has zero splits.
    pub fn split_count(&self, source_size: u64) -> u64 {
        source_size.div_ceil(self.split_size)
    }

    /// Descriptor for `index`, or `None` when the index is past the end of
    /// the table for `source_size`.
    pub fn desc(&self, index: u64, source_size: u64) -> Option<SplitDesc> {
        if index >= self.split_count(source_size) {
            return None;
        }
        let start = index * self.split_size;
        Some(SplitDesc {
            index,
            start,
            length: (source_size - start).min(self.split_size),
        })
    }

    /// Full table for `source_size`, in index order.
    pub fn table(&self, source_size: u64) -> Vec<SplitDesc> {
        (0..self.split_count(source_size))
            .map(|index| {
                let start = index * self.split_size;
                SplitDesc {
                    index,
                    start,
                    length: (source_size - start).min(self.split_size),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_invariants(size: u64, split_size: u64) {
        let layout = SplitLayout::new(split_size);
        let table = layout.table(size);
        assert_eq!(table.len() as u64, size.div_ceil(split_size));
        assert_eq!(table.iter().map(|d| d.length).sum::<u64>(), size);
        let mut expected_start = 0u64;
        for (i, d) in table.iter().enumerate() {
            assert_eq!(d.index, i as u64);
            assert_eq!(d.start, expected_start);
            if i + 1 < table.len() {
                assert_eq!(d.length, split_size);
            } else {
                assert!(d.length >= 1 && d.length <= split_size);
            }
            expected_start += d.length;
        }
        assert_eq!(expected_start, size);
    }

    #[test]
    fn table_invariants_hold() {
        for (size, split_size) in [
            (1, 1),
            (1, 100),
            (100, 100),
            (101, 100),
            (199, 100),
            (200, 100),
            (7, 3),
            (1 << 32, 4096),
        ] {
            check_invariants(size, split_size);
        }
    }

    #[test]
    fn zero_size_has_no_splits() {
        let layout = SplitLayout::default();
        assert_eq!(layout.split_count(0), 0);
        assert!(layout.table(0).is_empty());
        assert_eq!(layout.desc(0, 0), None);
    }

    #[test]
    fn reference_scenario_three_splits() {
        // 250,048,577 bytes at the default split size -> two full splits and
        // a 49,951,425-byte remainder.
        let layout = SplitLayout::default();
        let table = layout.table(250_048_577);
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].length, 100_048_576);
        assert_eq!(table[1].length, 100_048_576);
        assert_eq!(table[2].length, 49_951_425);
        assert_eq!(table[2].start, 200_097_152);
        assert_eq!(table.iter().map(|d| d.length).sum::<u64>(), 250_048_577);
    }

    #[test]
    fn trailing_single_byte_split() {
        // one byte past two full splits -> a third split of length 1
        let layout = SplitLayout::default();
        let table = layout.table(200_097_153);
        assert_eq!(table.len(), 3);
        assert_eq!(table[2].start, 200_097_152);
        assert_eq!(table[2].length, 1);
    }

    #[test]
    #[should_panic(expected = "split size must be positive")]
    fn zero_split_size_is_rejected() {
        let _ = SplitLayout::new(0);
    }

    #[test]
    fn desc_matches_table_and_rejects_out_of_range() {
        let layout = SplitLayout::new(10);
        let table = layout.table(25);
        for d in &table {
            assert_eq!(layout.desc(d.index, 25), Some(*d));
        }
        assert_eq!(layout.desc(3, 25), None);
        assert_eq!(layout.desc(u64::MAX / 2, 25), None);
    }
}
