//! Entry-name codec: `<decimal index>_<base name>`.
//!
//! The index is plain ASCII decimal with no zero padding; the base name is
//! the backing file's file name and may itself contain underscores, so
//! decoding splits on the first `_` only.

/// Directory-entry name for split `index` of `base`.
pub fn encode(index: u64, base: &str) -> String {
    format!("{index}_{base}")
}

/// Parses an entry name back into a split index.
///
/// Returns `None` unless `name` is exactly `<digits>_<base>`: the prefix must
/// be pure ASCII digits (no sign, `u64::from_str` would accept a leading `+`)
/// and the suffix must byte-equal the configured base name.
pub fn decode(name: &str, base: &str) -> Option<u64> {
    let (prefix, suffix) = name.split_once('_')?;
    if suffix != base || prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}
