//! FUSE adapter for splinterfs.
//!
//! Implements the rfuse3 `Filesystem` trait for `SplitFs`, translating kernel
//! requests into split-table operations. The adapter is stateless: opens hand
//! out fh 0, every call re-samples the backing file through the core, and all
//! mutating operations are rejected before they can touch anything.

pub mod mount;

use std::ffi::{OsStr, OsString};
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use log::debug;
use rfuse3::raw::reply::{
    DirectoryEntry, DirectoryEntryPlus, ReplyAttr, ReplyData, ReplyDirectory, ReplyDirectoryPlus,
    ReplyEntry, ReplyInit, ReplyOpen, ReplyStatFs,
};
use rfuse3::raw::{Filesystem, Request};
use rfuse3::Result as FuseResult;
use rfuse3::{FileType as FuseFileType, SetAttr, Timestamp};

use crate::error::Error;
use crate::vfs::fs::{FileAttr as VfsFileAttr, FileType as VfsFileType, ROOT_INO, SplitFs};

const TTL: Duration = Duration::from_secs(1);

impl Filesystem for SplitFs {
    type DirEntryStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntry>> + Send + 'a>>
    where
        Self: 'a;

    type DirEntryPlusStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntryPlus>> + Send + 'a>>
    where
        Self: 'a;

    async fn init(&self, _req: Request) -> FuseResult<ReplyInit> {
        // max_write is irrelevant for a read-only tree; keep the conservative
        // value the kernel is always happy with.
        let max_write = NonZeroU32::new(1024 * 1024).unwrap();
        Ok(ReplyInit { max_write })
    }

    async fn destroy(&self, _req: Request) {}

    async fn lookup(&self, req: Request, parent: u64, name: &OsStr) -> FuseResult<ReplyEntry> {
        if parent != ROOT_INO {
            return Err(libc::ENOENT.into());
        }
        let name = name.to_string_lossy();
        let vattr = self
            .lookup_entry(name.as_ref())
            .await
            .map_err(fuse_errno)?;
        Ok(ReplyEntry {
            ttl: TTL,
            attr: vfs_to_fuse_attr(&vattr, req.uid, req.gid),
            generation: 0,
        })
    }

    async fn getattr(
        &self,
        req: Request,
        ino: u64,
        _fh: Option<u64>,
        _flags: u32,
    ) -> FuseResult<ReplyAttr> {
        let vattr = self.stat_ino(ino).await.map_err(fuse_errno)?;
        Ok(ReplyAttr {
            ttl: TTL,
            attr: vfs_to_fuse_attr(&vattr, req.uid, req.gid),
        })
    }

    // Read-only tree: any attribute change (truncate, chmod, chown, utimens)
    // is refused without touching the backing file.
    async fn setattr(
        &self,
        _req: Request,
        ino: u64,
        _fh: Option<u64>,
        set_attr: SetAttr,
    ) -> FuseResult<ReplyAttr> {
        debug!("setattr ino={ino} rejected: {set_attr:?}");
        Err(libc::EACCES.into())
    }

    async fn open(&self, _req: Request, ino: u64, flags: u32) -> FuseResult<ReplyOpen> {
        if ino == ROOT_INO {
            return Err(libc::EISDIR.into());
        }
        self.open_split(ino, flags).await.map_err(fuse_errno)?;
        // stateless IO: no per-handle resources, fh stays 0
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn opendir(&self, _req: Request, ino: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        if ino != ROOT_INO {
            let attr = self.stat_ino(ino).await.map_err(fuse_errno)?;
            if matches!(attr.kind, VfsFileType::File) {
                return Err(libc::ENOTDIR.into());
            }
        }
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn read(
        &self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: u64,
        size: u32,
    ) -> FuseResult<ReplyData> {
        let data = self
            .read_split(ino, offset, size as usize)
            .await
            .map_err(fuse_errno)?;
        Ok(ReplyData {
            data: Bytes::from(data),
        })
    }

    async fn write(
        &self,
        _req: Request,
        ino: u64,
        _fh: u64,
        _offset: u64,
        _data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> FuseResult<rfuse3::raw::reply::ReplyWrite> {
        debug!("write ino={ino} rejected");
        Err(fuse_errno(Error::PermissionDenied))
    }

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: i64,
    ) -> FuseResult<ReplyDirectory<Self::DirEntryStream<'a>>> {
        if ino != ROOT_INO {
            return Err(libc::ENOTDIR.into());
        }
        let entries = self.read_entries().await.map_err(fuse_errno)?;

        // "." and ".." first; offset is "offset of the previous entry", so
        // emission resumes at offset+1.
        let mut all: Vec<DirectoryEntry> = Vec::with_capacity(entries.len() + 2);
        all.push(DirectoryEntry {
            inode: ROOT_INO,
            kind: FuseFileType::Directory,
            name: OsString::from("."),
            offset: 1,
        });
        all.push(DirectoryEntry {
            inode: ROOT_INO,
            kind: FuseFileType::Directory,
            name: OsString::from(".."),
            offset: 2,
        });
        for (i, e) in entries.iter().enumerate() {
            all.push(DirectoryEntry {
                inode: e.ino,
                kind: FuseFileType::RegularFile,
                name: OsString::from(e.name.clone()),
                offset: (i as i64) + 3,
            });
        }

        let start = if offset <= 0 { 0 } else { offset as usize };
        let slice = if start >= all.len() {
            Vec::new()
        } else {
            all[start..].to_vec()
        };
        let stream_iter = stream::iter(slice.into_iter().map(Ok));
        let boxed: Self::DirEntryStream<'a> = Box::pin(stream_iter);
        Ok(ReplyDirectory::<Self::DirEntryStream<'a>> { entries: boxed })
    }

    async fn readdirplus<'a>(
        &'a self,
        req: Request,
        ino: u64,
        _fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> FuseResult<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>> {
        if ino != ROOT_INO {
            return Err(libc::ENOTDIR.into());
        }
        let entries = self.read_entries().await.map_err(fuse_errno)?;
        let root_attr = vfs_to_fuse_attr(&self.root_attr(), req.uid, req.gid);

        let mut children = Vec::with_capacity(entries.len());
        for e in entries {
            // a stat miss means the entry vanished between the listing and
            // this loop (source shrank); plus_entries drops it
            let attr = match self.stat_ino(e.ino).await {
                Ok(a) => Some(vfs_to_fuse_attr(&a, req.uid, req.gid)),
                Err(_) => None,
            };
            children.push((e.ino, e.name, attr));
        }
        let all = plus_entries(root_attr, children);

        let start = if offset == 0 { 0 } else { offset as usize };
        let slice = if start >= all.len() {
            Vec::new()
        } else {
            all[start..].to_vec()
        };
        let stream_iter = stream::iter(slice.into_iter().map(Ok));
        let boxed: Self::DirEntryPlusStream<'a> = Box::pin(stream_iter);
        Ok(ReplyDirectoryPlus { entries: boxed })
    }

    async fn access(&self, _req: Request, ino: u64, mask: u32) -> FuseResult<()> {
        let attr = self.stat_ino(ino).await.map_err(fuse_errno)?;
        // splits never grant write or execute; the root grants no write
        let denied = match attr.kind {
            VfsFileType::File => libc::W_OK | libc::X_OK,
            VfsFileType::Dir => libc::W_OK,
        };
        if (mask as i32) & denied != 0 {
            return Err(libc::EACCES.into());
        }
        Ok(())
    }

    async fn statfs(&self, _req: Request, _ino: u64) -> FuseResult<ReplyStatFs> {
        // conservative constants; nothing here is writable anyway
        Ok(ReplyStatFs {
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            bsize: 4096,
            namelen: 255,
            frsize: 4096,
        })
    }

    // ===== mutating namespace operations: always refused =====

    async fn mkdir(
        &self,
        _req: Request,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
    ) -> FuseResult<ReplyEntry> {
        Err(fuse_errno(Error::PermissionDenied))
    }

    async fn create(
        &self,
        _req: Request,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _flags: u32,
    ) -> FuseResult<rfuse3::raw::reply::ReplyCreated> {
        Err(fuse_errno(Error::PermissionDenied))
    }

    async fn unlink(&self, _req: Request, _parent: u64, _name: &OsStr) -> FuseResult<()> {
        Err(fuse_errno(Error::PermissionDenied))
    }

    async fn rmdir(&self, _req: Request, _parent: u64, _name: &OsStr) -> FuseResult<()> {
        Err(fuse_errno(Error::PermissionDenied))
    }

    async fn rename(
        &self,
        _req: Request,
        _parent: u64,
        _name: &OsStr,
        _new_parent: u64,
        _new_name: &OsStr,
    ) -> FuseResult<()> {
        Err(fuse_errno(Error::PermissionDenied))
    }

    // ===== release/sync: stateless, nothing to flush =====

    async fn release(
        &self,
        _req: Request,
        _inode: u64,
        _fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> FuseResult<()> {
        Ok(())
    }

    async fn flush(&self, _req: Request, _inode: u64, _fh: u64, _lock_owner: u64) -> FuseResult<()> {
        Ok(())
    }

    async fn fsync(&self, _req: Request, _inode: u64, _fh: u64, _datasync: bool) -> FuseResult<()> {
        Ok(())
    }

    async fn releasedir(&self, _req: Request, _inode: u64, _fh: u64, _flags: u32) -> FuseResult<()> {
        Ok(())
    }

    async fn fsyncdir(
        &self,
        _req: Request,
        _inode: u64,
        _fh: u64,
        _datasync: bool,
    ) -> FuseResult<()> {
        Ok(())
    }

    async fn forget(&self, _req: Request, _inode: u64, _nlookup: u64) {}

    async fn batch_forget(&self, _req: Request, _inodes: &[(u64, u64)]) {}

    async fn interrupt(&self, _req: Request, _unique: u64) -> FuseResult<()> {
        Ok(())
    }
}

// =============== helpers ===============

fn fuse_errno(e: Error) -> rfuse3::Errno {
    e.errno().into()
}

/// Assembles the readdirplus sequence: ".", ".." (the root is its own parent
/// in a single-level tree), then one entry per surviving child. Offsets are
/// positions in the emitted sequence, not listing indices, so a child whose
/// attributes could not be fetched (source shrank mid-listing) is dropped
/// without leaving a hole a resuming client would skip past.
fn plus_entries(
    root_attr: rfuse3::raw::reply::FileAttr,
    children: Vec<(u64, String, Option<rfuse3::raw::reply::FileAttr>)>,
) -> Vec<DirectoryEntryPlus> {
    let mut all: Vec<DirectoryEntryPlus> = Vec::with_capacity(children.len() + 2);
    all.push(DirectoryEntryPlus {
        inode: ROOT_INO,
        generation: 0,
        kind: FuseFileType::Directory,
        name: OsString::from("."),
        offset: 1,
        attr: root_attr,
        entry_ttl: TTL,
        attr_ttl: TTL,
    });
    all.push(DirectoryEntryPlus {
        inode: ROOT_INO,
        generation: 0,
        kind: FuseFileType::Directory,
        name: OsString::from(".."),
        offset: 2,
        attr: root_attr,
        entry_ttl: TTL,
        attr_ttl: TTL,
    });
    for (ino, name, attr) in children {
        let Some(attr) = attr else {
            continue;
        };
        all.push(DirectoryEntryPlus {
            inode: ino,
            generation: 0,
            kind: FuseFileType::RegularFile,
            name: OsString::from(name),
            offset: (all.len() as i64) + 1,
            attr,
            entry_ttl: TTL,
            attr_ttl: TTL,
        });
    }
    all
}

fn vfs_to_fuse_attr(v: &VfsFileAttr, uid: u32, gid: u32) -> rfuse3::raw::reply::FileAttr {
    let ts = Timestamp::from(v.mtime);
    let kind = match v.kind {
        VfsFileType::Dir => FuseFileType::Directory,
        VfsFileType::File => FuseFileType::RegularFile,
    };
    let blocks = v.size.div_ceil(512);
    rfuse3::raw::reply::FileAttr {
        ino: v.ino,
        size: v.size,
        blocks,
        atime: ts,
        mtime: ts,
        ctime: ts,
        #[cfg(target_os = "macos")]
        crtime: ts,
        kind,
        perm: v.perm,
        nlink: v.nlink,
        uid,
        gid,
        rdev: 0,
        #[cfg(target_os = "macos")]
        flags: 0,
        blksize: 4096,
    }
}
