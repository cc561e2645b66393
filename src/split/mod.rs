//! Split mapping: table derivation, entry naming and resolution.
//!
//! Main components:
//! - `table`: derives the ordered split table from a sampled backing-file size.
//! - `name`: the reversible `<index>_<base name>` entry-name codec.
//! - `resolve`: turns a requested entry name or index into a descriptor.
//!
//! Everything in here is pure; the backing file is never touched. Callers
//! sample the current size first and thread it through, so a table is always
//! a per-call snapshot rather than cached state.

pub mod name;
pub mod resolve;
pub mod table;
