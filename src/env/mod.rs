//! Env Module
//!
//! The file layer the storage engine reads and writes through.
//!
//! ## Responsibilities
//! - Sequential, random-access and writable file capabilities
//! - OS-resource admission control (descriptor and mmap budgets)
//! - Durability escalation for manifest files
//! - Best-effort info logging
//!
//! ## Random-access strategy
//! ```text
//!   new_random_access_file(path)
//!              │
//!     mmap gate acquire? ──yes──► PosixMmapReadableFile (zero-copy reads)
//!              │no
//!              ▼
//!   PosixRandomAccessFile
//!              │
//!     fd gate acquire?  ──yes──► keep descriptor, pread per call
//!              │no
//!              ▼
//!     open + pread + close per call
//! ```

mod limiter;
mod logger;
mod posix;
mod random_access;
mod sequential;
mod writable;

use std::fmt;
use std::path::Path;

use crate::error::{Result, Status};
use crate::slice::ByteView;

pub use limiter::AdmissionGate;
pub use logger::{PosixLogger, TracingLogger};
pub use posix::PosixEnv;
pub use random_access::{PosixMmapReadableFile, PosixRandomAccessFile};
pub use sequential::PosixSequentialFile;
pub use writable::{PosixWritableFile, MANIFEST_PREFIX};

/// Fragment size used by `read_file_to_vec`
const READ_FRAGMENT_SIZE: usize = 8192;

// =============================================================================
// File Capabilities
// =============================================================================

/// Forward-only reader
pub trait SequentialFile: Send {
    /// Read up to `n` bytes into `scratch`. An empty view means EOF.
    fn read<'a>(&mut self, n: usize, scratch: &'a mut [u8]) -> Result<ByteView<'a>>;

    /// Skip `n` bytes forward
    fn skip(&mut self, n: u64) -> Result<()>;
}

/// Offset-addressed reader, safe to share across threads
pub trait RandomAccessFile: Send + Sync {
    /// Read up to `n` bytes at `offset`.
    ///
    /// The returned view may point into `scratch` or into storage owned by
    /// the file itself.
    fn read<'a>(&'a self, offset: u64, n: usize, scratch: &'a mut [u8]) -> Result<ByteView<'a>>;
}

/// Append-only writer. Single writer; callers serialize access.
pub trait WritableFile: Send {
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Flush and close. Errors from the flush win over errors from close.
    fn close(&mut self) -> Result<()>;

    /// Hand buffered bytes to the OS without forcing them to disk
    fn flush(&mut self) -> Result<()>;

    /// Make everything appended so far durable
    fn sync(&mut self) -> Result<()>;
}

/// Diagnostic sink. Implementations must not fail or block for long.
pub trait Logger: Send + Sync {
    fn logv(&self, args: fmt::Arguments<'_>);
}

/// Log to `info_log` if one is configured
pub fn log(info_log: Option<&dyn Logger>, args: fmt::Arguments<'_>) {
    if let Some(logger) = info_log {
        logger.logv(args);
    }
}

/// `log_info!(info_log, "fmt", args..)` where `info_log: Option<&dyn Logger>`
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $crate::env::log($logger, format_args!($($arg)*))
    };
}

// =============================================================================
// Env
// =============================================================================

/// Filesystem access used by the storage engine
pub trait Env: Send + Sync {
    fn new_sequential_file(&self, path: &Path) -> Result<Box<dyn SequentialFile>>;

    fn new_random_access_file(&self, path: &Path) -> Result<Box<dyn RandomAccessFile>>;

    /// Create or truncate `path` for writing
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;

    /// Open `path` for appending, creating it if missing
    fn new_appendable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        Err(Status::not_supported(
            "NewAppendableFile",
            path.display().to_string(),
        ))
    }

    fn file_exists(&self, path: &Path) -> bool;

    /// Names (not paths) of the entries in `dir`
    fn get_children(&self, dir: &Path) -> Result<Vec<String>>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn create_dir(&self, path: &Path) -> Result<()>;

    fn remove_dir(&self, path: &Path) -> Result<()>;

    fn get_file_size(&self, path: &Path) -> Result<u64>;

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()>;

    fn new_logger(&self, path: &Path) -> Result<Box<dyn Logger>>;
}

// =============================================================================
// Whole-file Helpers
// =============================================================================

/// Write `data` to a fresh file at `path`
pub fn write_to_file(env: &dyn Env, data: &[u8], path: &Path) -> Result<()> {
    write_to_file_inner(env, data, path, false)
}

/// Write `data` to a fresh file at `path` and sync it before closing
pub fn write_to_file_sync(env: &dyn Env, data: &[u8], path: &Path) -> Result<()> {
    write_to_file_inner(env, data, path, true)
}

fn write_to_file_inner(env: &dyn Env, data: &[u8], path: &Path, should_sync: bool) -> Result<()> {
    let mut file = env.new_writable_file(path)?;

    let mut result = file.append(data);
    if result.is_ok() && should_sync {
        result = file.sync();
    }
    if result.is_ok() {
        result = file.close();
    }
    drop(file);

    if result.is_err() {
        // Don't leave a partial file behind.
        let _ = env.remove_file(path);
    }
    result
}

/// Read the whole file at `path`
pub fn read_file_to_vec(env: &dyn Env, path: &Path) -> Result<Vec<u8>> {
    let mut file = env.new_sequential_file(path)?;
    let mut data = Vec::new();
    let mut scratch = vec![0u8; READ_FRAGMENT_SIZE];

    loop {
        let fragment = file.read(READ_FRAGMENT_SIZE, &mut scratch)?;
        if fragment.is_empty() {
            break;
        }
        data.extend_from_slice(&fragment);
    }
    Ok(data)
}
