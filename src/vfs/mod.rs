//! Core split filesystem.
//!
//! `vfs::fs` holds the immutable mount configuration, synthesizes read-only
//! attributes and implements the operations the FUSE adapter dispatches to.
//! Every operation samples the backing file's size first and works off that
//! per-call snapshot; nothing is retained between calls.

pub mod fs;
