//! Backing-file access: on-demand size sampling and positioned split reads.
//!
//! `SourceFile` is the only component that touches real storage, and it only
//! ever reads. The size is sampled fresh on every call so external growth or
//! truncation of the backing file is observed immediately; nothing here is
//! cached across calls.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::Result;
use crate::split::table::SplitDesc;

pub struct SourceFile {
    path: PathBuf,
}

impl SourceFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the backing file in bytes. One metadata query, never
    /// cached; failure propagates to whatever operation triggered the sample.
    pub async fn current_size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path).await?.len())
    }

    /// Reads up to `len` bytes of split `desc`, starting `offset` bytes into
    /// the split.
    ///
    /// An offset at or past `desc.length` yields an empty buffer, including
    /// exactly at the boundary; that is ordinary EOF for the split, not an
    /// error. Otherwise the length is clamped to the split end and a
    /// positioned read is issued at `desc.start + offset`. If the backing
    /// file can no longer supply the clamped range (it shrank after `desc`
    /// was computed), the call fails with an I/O error rather than returning
    /// a silently short read.
    pub async fn read_split(&self, desc: &SplitDesc, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset >= desc.length {
            return Ok(Vec::new());
        }
        let want = (len as u64).min(desc.length - offset) as usize;
        if want == 0 {
            return Ok(Vec::new());
        }
        let mut file = fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(desc.start + offset)).await?;
        let mut buf = vec![0u8; want];
        // read_exact reports UnexpectedEof when the snapshot went stale
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}
