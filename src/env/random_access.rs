//! Random-access files
//!
//! Two strategies share the `RandomAccessFile` trait:
//! - `PosixRandomAccessFile`: positioned reads (pread) on a descriptor. Keeps
//!   the descriptor open only if the descriptor gate admits it; otherwise
//!   opens a transient descriptor per read.
//! - `PosixMmapReadableFile`: the whole file mapped up front; reads are
//!   bounds-checked views into the mapping.
//!
//! Both are safe to share across threads without external locking.

use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use tracing::debug;

use crate::error::{errno_message, Result, Status};
use crate::slice::ByteView;

use super::{AdmissionGate, RandomAccessFile};

// =============================================================================
// Descriptor-backed
// =============================================================================

/// Random-access reader using pread on a (possibly transient) descriptor
pub struct PosixRandomAccessFile {
    path: PathBuf,
    filename: String,

    /// Permanent descriptor; `None` when the gate denied us a slot
    file: Option<File>,

    /// Gate the permanent descriptor was charged against
    fd_limiter: Arc<AdmissionGate>,
}

impl PosixRandomAccessFile {
    /// Wrap an already-open descriptor.
    ///
    /// If `fd_limiter` has no free slot the descriptor is closed here and
    /// each `read` opens its own.
    pub fn new(path: impl AsRef<Path>, file: File, fd_limiter: Arc<AdmissionGate>) -> Self {
        let path = path.as_ref().to_path_buf();
        let filename = path.display().to_string();

        let file = if fd_limiter.acquire() {
            Some(file)
        } else {
            debug!(file = %filename, "descriptor budget exhausted, using transient descriptors");
            drop(file);
            None
        };

        Self {
            path,
            filename,
            file,
            fd_limiter,
        }
    }

    /// Whether this handle holds a descriptor for its whole lifetime
    pub fn has_permanent_fd(&self) -> bool {
        self.file.is_some()
    }
}

impl RandomAccessFile for PosixRandomAccessFile {
    fn read<'a>(&'a self, offset: u64, n: usize, scratch: &'a mut [u8]) -> Result<ByteView<'a>> {
        let transient;
        let file = match &self.file {
            Some(file) => file,
            None => {
                transient =
                    File::open(&self.path).map_err(|e| Status::from_io(&self.filename, &e))?;
                &transient
            }
        };

        debug_assert!(scratch.len() >= n, "scratch shorter than requested read");
        let n = n.min(scratch.len());

        let read_size = loop {
            match file.read_at(&mut scratch[..n], offset) {
                Ok(read_size) => break read_size,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Status::from_io(&self.filename, &e)),
            }
        };

        Ok(ByteView::new(&scratch[..read_size]))
    }
}

impl Drop for PosixRandomAccessFile {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            self.fd_limiter.release();
        }
    }
}

// =============================================================================
// Memory-mapped
// =============================================================================

/// Random-access reader over a read-only mapping of the whole file
pub struct PosixMmapReadableFile {
    filename: String,
    mmap: Mmap,

    /// Gate the mapping was charged against; the slot is already held
    mmap_limiter: Arc<AdmissionGate>,
}

impl PosixMmapReadableFile {
    /// Take ownership of a mapping.
    ///
    /// REQUIRES: the caller already acquired a slot from `mmap_limiter`.
    /// It is released when this file is dropped.
    pub fn new(filename: impl Into<String>, mmap: Mmap, mmap_limiter: Arc<AdmissionGate>) -> Self {
        Self {
            filename: filename.into(),
            mmap,
            mmap_limiter,
        }
    }

    /// Length of the mapped region
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl RandomAccessFile for PosixMmapReadableFile {
    fn read<'a>(&'a self, offset: u64, n: usize, _scratch: &'a mut [u8]) -> Result<ByteView<'a>> {
        let end = offset.checked_add(n as u64);
        match end {
            Some(end) if end <= self.mmap.len() as u64 => {
                Ok(ByteView::new(&self.mmap[offset as usize..end as usize]))
            }
            _ => Err(Status::invalid_argument(
                &self.filename,
                errno_message(libc::EINVAL),
            )),
        }
    }
}

impl Drop for PosixMmapReadableFile {
    fn drop(&mut self) {
        self.mmap_limiter.release();
    }
}
