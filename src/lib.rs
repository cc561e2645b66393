// Library crate for splinterfs: re-export internal modules for reuse by the
// binary and by integration tests.

pub mod error;
pub mod fuse;
pub mod source;
pub mod split;
pub mod vfs;
