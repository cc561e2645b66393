//! Error taxonomy for splinterfs.
//!
//! Every fallible operation collapses into one of three cases: the requested
//! entry does not exist against the current split table, the caller tried to
//! mutate a virtual entry, or the backing file itself failed underneath us.
//! A failure is always scoped to the call that triggered it; no shared state
//! exists that could be left inconsistent.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("virtual splits are read-only")]
    PermissionDenied,

    #[error("backing file I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Errno for surfacing through the FUSE boundary.
    pub fn errno(&self) -> libc::c_int {
        match self {
            Error::NotFound(_) => libc::ENOENT,
            Error::PermissionDenied => libc::EACCES,
            Error::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(Error::NotFound("x".into()).errno(), libc::ENOENT);
        assert_eq!(Error::PermissionDenied.errno(), libc::EACCES);
        let e: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "shrunk").into();
        assert_eq!(e.errno(), libc::EIO);
        let e: Error = io::Error::from_raw_os_error(libc::ENOENT).into();
        assert_eq!(e.errno(), libc::ENOENT);
    }
}
