//! `SplitFs`: the read-only virtual view over one backing file.
//!
//! All state is the immutable `MountConfig` captured at startup. Each
//! operation is a pure function of that configuration, a freshly sampled
//! backing-file size and the call arguments, which is what lets concurrent
//! FUSE dispatch proceed without any locking: there is no shared mutable
//! table to race on, only per-call snapshots.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;

use crate::error::{Error, Result};
use crate::source::SourceFile;
use crate::split::resolve;
use crate::split::table::{SplitDesc, SplitLayout};

/// Inode of the virtual root directory (FUSE root).
pub const ROOT_INO: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

/// Synthesized read-only metadata for the root or a split entry.
#[derive(Clone, Debug)]
pub struct FileAttr {
    pub ino: u64,
    pub size: u64,
    pub kind: FileType,
    pub perm: u16,
    pub nlink: u32,
    /// Mount time; fixed per mount so repeated queries stay stable.
    pub mtime: SystemTime,
}

#[derive(Clone, Debug)]
pub struct DirEntry {
    pub name: String,
    pub ino: u64,
    pub kind: FileType,
}

/// Immutable startup configuration: backing-file path, split sizing and the
/// base name every entry name is derived from. Built once in main, never
/// mutated.
#[derive(Clone, Debug)]
pub struct MountConfig {
    pub source: PathBuf,
    pub base_name: String,
    pub layout: SplitLayout,
}

impl MountConfig {
    /// Derives the base name from the backing-file path. Fails when the path
    /// has no file-name component (e.g. `/` or a path ending in `..`).
    pub fn new<P: AsRef<Path>>(source: P, layout: SplitLayout) -> Result<Self> {
        let source = source.as_ref().to_path_buf();
        let base_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("source path has no file name: {}", source.display()),
                ))
            })?;
        Ok(Self {
            source,
            base_name,
            layout,
        })
    }
}

pub struct SplitFs {
    source: SourceFile,
    base_name: String,
    layout: SplitLayout,
    mounted_at: SystemTime,
}

impl SplitFs {
    pub fn new(config: MountConfig) -> Self {
        Self {
            source: SourceFile::new(&config.source),
            base_name: config.base_name,
            layout: config.layout,
            mounted_at: SystemTime::now(),
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Inode for a split index. Root is 1, so splits start at 2.
    pub fn ino_of(index: u64) -> u64 {
        index + 2
    }

    /// Split index for an inode; `None` for the root inode (and 0, which is
    /// never handed out).
    pub fn index_of(ino: u64) -> Option<u64> {
        ino.checked_sub(2)
    }

    /// Looks up an entry name against the current table.
    pub async fn lookup_entry(&self, name: &str) -> Result<FileAttr> {
        let size = self.source.current_size().await?;
        debug!("lookup name={name} source_size={size}");
        let desc = resolve::resolve_name(self.layout, name, &self.base_name, size)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(self.split_attr(&desc))
    }

    /// Attributes for an inode, validated against the current table.
    pub async fn stat_ino(&self, ino: u64) -> Result<FileAttr> {
        if ino == ROOT_INO {
            return Ok(self.root_attr());
        }
        let index = Self::index_of(ino).ok_or(Error::NotFound(format!("inode {ino}")))?;
        let size = self.source.current_size().await?;
        let desc = resolve::resolve_index(self.layout, index, size)
            .ok_or_else(|| Error::NotFound(format!("split {index}")))?;
        Ok(self.split_attr(&desc))
    }

    /// Validates that `ino` names a currently existing split and that the
    /// requested access is read-only.
    pub async fn open_split(&self, ino: u64, flags: u32) -> Result<()> {
        if (flags as i32) & libc::O_ACCMODE != libc::O_RDONLY {
            debug!("open ino={ino} denied: write-capable access mode");
            return Err(Error::PermissionDenied);
        }
        self.stat_ino(ino).await.map(|_| ())
    }

    /// One entry per descriptor in the current table, in index order. The
    /// order is a convenience, not a contract.
    pub async fn read_entries(&self) -> Result<Vec<DirEntry>> {
        let size = self.source.current_size().await?;
        debug!("readdir source_size={size}");
        Ok(resolve::list_names(self.layout, &self.base_name, size)
            .into_iter()
            .enumerate()
            .map(|(i, name)| DirEntry {
                name,
                ino: Self::ino_of(i as u64),
                kind: FileType::File,
            })
            .collect())
    }

    /// Serves a read against split `ino`. The table snapshot is taken at the
    /// start of this call; a backing file that shrinks underneath the
    /// snapshot surfaces as an I/O error from the positioned read.
    pub async fn read_split(&self, ino: u64, offset: u64, len: usize) -> Result<Vec<u8>> {
        let index = Self::index_of(ino).ok_or(Error::NotFound(format!("inode {ino}")))?;
        let size = self.source.current_size().await?;
        let desc = resolve::resolve_index(self.layout, index, size)
            .ok_or_else(|| Error::NotFound(format!("split {index}")))?;
        debug!(
            "read split={} offset={offset} len={len} start={} length={}",
            desc.index, desc.start, desc.length
        );
        self.source.read_split(&desc, offset, len).await
    }

    pub fn root_attr(&self) -> FileAttr {
        FileAttr {
            ino: ROOT_INO,
            size: 0,
            kind: FileType::Dir,
            perm: 0o755,
            nlink: 2,
            mtime: self.mounted_at,
        }
    }

    fn split_attr(&self, desc: &SplitDesc) -> FileAttr {
        FileAttr {
            ino: Self::ino_of(desc.index),
            size: desc.length,
            kind: FileType::File,
            // read-only for every principal, no execute
            perm: 0o444,
            nlink: 1,
            mtime: self.mounted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fs_over(contents: &[u8], split_size: u64) -> (tempfile::NamedTempFile, SplitFs) {
        let mut f = tempfile::NamedTempFile::new().expect("tmp source");
        f.write_all(contents).expect("write");
        f.flush().expect("flush");
        let config = MountConfig::new(f.path(), SplitLayout::new(split_size)).expect("config");
        let fs = SplitFs::new(config);
        (f, fs)
    }

    #[test]
    fn base_name_derived_from_source_path() {
        let config = MountConfig::new("/data/archive_v2.tar.gz", SplitLayout::default()).unwrap();
        assert_eq!(config.base_name, "archive_v2.tar.gz");
        assert!(MountConfig::new("/", SplitLayout::default()).is_err());
    }

    #[tokio::test]
    async fn listing_and_attributes() {
        let (_f, fs) = fs_over(&[7u8; 25], 10);
        let entries = fs.read_entries().await.unwrap();
        let base = fs.base_name().to_string();
        assert_eq!(
            entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>(),
            vec![format!("0_{base}"), format!("1_{base}"), format!("2_{base}")]
        );

        for (i, expected_len) in [(0u64, 10u64), (1, 10), (2, 5)] {
            let attr = fs.stat_ino(SplitFs::ino_of(i)).await.unwrap();
            assert_eq!(attr.size, expected_len);
            assert_eq!(attr.perm, 0o444);
            assert_eq!(attr.nlink, 1);
            assert!(matches!(attr.kind, FileType::File));
        }
        let root = fs.stat_ino(ROOT_INO).await.unwrap();
        assert!(matches!(root.kind, FileType::Dir));
        assert_eq!(root.perm, 0o755);
    }

    #[tokio::test]
    async fn attributes_are_stable_across_queries() {
        let (_f, fs) = fs_over(&[1u8; 10], 10);
        let a = fs.stat_ino(SplitFs::ino_of(0)).await.unwrap();
        let b = fs.stat_ino(SplitFs::ino_of(0)).await.unwrap();
        assert_eq!(a.mtime, b.mtime);
    }

    #[tokio::test]
    async fn concatenated_splits_reproduce_source() {
        let contents: Vec<u8> = (0..=255u8).cycle().take(1003).collect();
        let (_f, fs) = fs_over(&contents, 64);
        let mut combined = Vec::new();
        for e in fs.read_entries().await.unwrap() {
            combined.extend(fs.read_split(e.ino, 0, usize::MAX).await.unwrap());
        }
        assert_eq!(combined, contents);
    }

    #[tokio::test]
    async fn lookup_misses_are_not_found() {
        let (_f, fs) = fs_over(&[0u8; 25], 10);
        let base = fs.base_name().to_string();
        for name in [
            format!("3_{base}"),          // index past the table
            format!("x_{base}"),          // non-numeric prefix
            "0_other.bin".to_string(),    // suffix mismatch
            base.clone(),                 // no separator
        ] {
            assert!(matches!(
                fs.lookup_entry(&name).await,
                Err(Error::NotFound(_))
            ));
        }
        assert!(fs.lookup_entry(&format!("2_{base}")).await.is_ok());
    }

    #[tokio::test]
    async fn read_at_split_boundary_is_empty() {
        let (_f, fs) = fs_over(&[0u8; 25], 10);
        let ino = SplitFs::ino_of(2);
        assert!(fs.read_split(ino, 5, 10).await.unwrap().is_empty());
        assert!(fs.read_split(ino, 500, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn growth_is_visible_on_next_listing() {
        let (f, fs) = fs_over(&[0u8; 10], 10);
        assert_eq!(fs.read_entries().await.unwrap().len(), 1);

        std::fs::OpenOptions::new()
            .append(true)
            .open(f.path())
            .unwrap()
            .write_all(&[1u8; 5])
            .unwrap();

        // no remount, no invalidation: the very next call sees the new size
        let entries = fs.read_entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        let last = fs.stat_ino(entries[1].ino).await.unwrap();
        assert_eq!(last.size, 5);
        assert_eq!(fs.read_split(entries[1].ino, 0, 16).await.unwrap(), [1u8; 5]);
    }

    #[tokio::test]
    async fn shrink_removes_entries_from_next_listing() {
        let (f, fs) = fs_over(&[0u8; 25], 10);
        assert_eq!(fs.read_entries().await.unwrap().len(), 3);
        f.as_file().set_len(10).unwrap();
        assert_eq!(fs.read_entries().await.unwrap().len(), 1);
        assert!(matches!(
            fs.stat_ino(SplitFs::ino_of(2)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn zero_size_source_lists_nothing() {
        let (_f, fs) = fs_over(b"", 10);
        assert!(fs.read_entries().await.unwrap().is_empty());
        assert!(matches!(
            fs.stat_ino(SplitFs::ino_of(0)).await,
            Err(Error::NotFound(_))
        ));
        let base = fs.base_name().to_string();
        assert!(fs.lookup_entry(&format!("0_{base}")).await.is_err());
    }

    #[tokio::test]
    async fn open_rejects_write_access() {
        let (_f, fs) = fs_over(&[0u8; 10], 10);
        let ino = SplitFs::ino_of(0);
        assert!(fs.open_split(ino, libc::O_RDONLY as u32).await.is_ok());
        for flags in [libc::O_WRONLY, libc::O_RDWR, libc::O_RDWR | libc::O_TRUNC] {
            assert!(matches!(
                fs.open_split(ino, flags as u32).await,
                Err(Error::PermissionDenied)
            ));
        }
    }
}
