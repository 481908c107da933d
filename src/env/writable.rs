//! Writable file
//!
//! Append-only, single-writer file with a write-combining buffer.
//!
//! ## Lifecycle
//! ```text
//! Open ──append*──► (flush | sync)* ──close──► Closed
//! ```
//!
//! ## Durability
//! Bytes appended before a successful `sync()` survive a crash. For manifest
//! files (base name starts with "MANIFEST") `sync()` also fsyncs the
//! containing directory, so a freshly created manifest's directory entry is
//! durable too.

use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::os::unix::io::IntoRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::WRITABLE_FILE_BUFFER_SIZE;
use crate::error::{Result, Status};

use super::WritableFile;

/// Base-name prefix that marks a manifest file
pub const MANIFEST_PREFIX: &str = "MANIFEST";

/// Buffered append-only writer over an OS file
pub struct PosixWritableFile {
    /// Write-combining buffer; `buf[..pos]` is pending
    buf: Box<[u8]>,
    pos: usize,

    /// `None` once closed
    file: Option<File>,

    is_manifest: bool,
    filename: String,
    dirname: PathBuf,
}

impl PosixWritableFile {
    /// Wrap an open file with the default 64 KiB buffer
    pub fn new(path: impl AsRef<Path>, file: File) -> Self {
        Self::with_buffer_size(path, file, WRITABLE_FILE_BUFFER_SIZE)
    }

    pub fn with_buffer_size(path: impl AsRef<Path>, file: File, buffer_size: usize) -> Self {
        let path = path.as_ref();
        Self {
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            pos: 0,
            file: Some(file),
            is_manifest: is_manifest(path),
            filename: path.display().to_string(),
            dirname: dirname(path),
        }
    }

    /// Whether `sync()` escalates to a directory fsync
    pub fn is_manifest(&self) -> bool {
        self.is_manifest
    }

    /// Bytes buffered but not yet handed to the OS
    pub fn buffered_len(&self) -> usize {
        self.pos
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn file(&self) -> Result<&File> {
        match self.file.as_ref() {
            Some(file) => Ok(file),
            None => {
                debug_assert!(false, "operation on closed file {}", self.filename);
                Err(Status::io_error(&self.filename, "file already closed"))
            }
        }
    }

    fn flush_buffer(&mut self) -> Result<()> {
        let result = self.write_unbuffered(&self.buf[..self.pos]);
        self.pos = 0;
        result
    }

    /// Hand `data` to the OS, looping over partial writes.
    /// Only EINTR is retried.
    fn write_unbuffered(&self, mut data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut file = self.file()?;

        while !data.is_empty() {
            match file.write(data) {
                Ok(0) => {
                    let e = io::Error::from(ErrorKind::WriteZero);
                    return Err(Status::from_io(&self.filename, &e));
                }
                Ok(written) => data = &data[written..],
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Status::from_io(&self.filename, &e)),
            }
        }
        Ok(())
    }

    fn sync_dir_if_manifest(&self) -> Result<()> {
        if !self.is_manifest {
            return Ok(());
        }

        debug!(dir = %self.dirname.display(), "syncing directory for manifest");
        let dir_name = self.dirname.display().to_string();
        let dir = File::open(&self.dirname).map_err(|e| Status::from_io(&dir_name, &e))?;
        dir.sync_all().map_err(|e| Status::from_io(&dir_name, &e))
    }
}

impl WritableFile for PosixWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        // Fit as much as possible into the buffer.
        let copy = data.len().min(self.buf.len() - self.pos);
        self.buf[self.pos..self.pos + copy].copy_from_slice(&data[..copy]);
        self.pos += copy;
        let rest = &data[copy..];
        if rest.is_empty() {
            return Ok(());
        }

        // Buffer is full; drain it, then either buffer the remainder or
        // write it straight through.
        self.flush_buffer()?;

        if rest.len() < self.buf.len() {
            self.buf[..rest.len()].copy_from_slice(rest);
            self.pos = rest.len();
            return Ok(());
        }
        self.write_unbuffered(rest)
    }

    fn close(&mut self) -> Result<()> {
        let flush_result = self.flush_buffer();

        let close_result = match self.file.take() {
            Some(file) => {
                // close(2) directly so its error is not lost in File's Drop.
                let fd = file.into_raw_fd();
                if unsafe { libc::close(fd) } < 0 {
                    Err(Status::from_io(&self.filename, &io::Error::last_os_error()))
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        };

        flush_result.and(close_result)
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_buffer()
    }

    fn sync(&mut self) -> Result<()> {
        // The directory entry must be durable before the manifest contents
        // are relied upon.
        self.sync_dir_if_manifest()?;

        self.flush_buffer()?;
        self.file()?
            .sync_data()
            .map_err(|e| Status::from_io(&self.filename, &e))
    }
}

impl Drop for PosixWritableFile {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(e) = self.close() {
                warn!(file = %self.filename, error = %e, "close on drop failed");
            }
        }
    }
}

/// True if the final path component starts with "MANIFEST"
pub(crate) fn is_manifest(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(MANIFEST_PREFIX))
        .unwrap_or(false)
}

/// Containing directory, "." for bare file names
pub(crate) fn dirname(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
