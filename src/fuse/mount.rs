//! Mount helpers for starting/stopping FUSE
//!
//! Notes:
//! - Only supported on Unix-like systems. On Linux we support unprivileged
//!   mount via fusermount3.
//! - These helpers are thin wrappers over rfuse3 raw Session APIs.

use std::path::Path;

use rfuse3::MountOptions;

use crate::vfs::fs::SplitFs;

/// Build default mount options for splinterfs.
fn default_mount_options() -> MountOptions {
    let mut mo = MountOptions::default();
    mo.fs_name("splinterfs").read_only(true);
    // Map entries to the mounting user so the read-only bits are the only
    // thing standing between a caller and a denied write.
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };
    mo.uid(uid).gid(gid);
    mo
}

/// Mount a SplitFs instance on the given empty directory using unprivileged
/// mode (requires fusermount3 in PATH).
#[cfg(target_os = "linux")]
pub async fn mount_split_fs_unprivileged(
    fs: SplitFs,
    mount_point: impl AsRef<Path>,
) -> std::io::Result<rfuse3::raw::MountHandle> {
    let opts = default_mount_options();
    let session = rfuse3::raw::Session::new(opts);
    session.mount_with_unprivileged(fs, mount_point).await
}

/// Fallback stub for non-Linux targets.
#[cfg(not(target_os = "linux"))]
pub async fn mount_split_fs_unprivileged(
    _fs: SplitFs,
    _mount_point: impl AsRef<Path>,
) -> std::io::Result<rfuse3::raw::MountHandle> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "FUSE mount is only supported on Linux in this build",
    ))
}
