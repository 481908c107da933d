//! POSIX Env
//!
//! Opens files on the local filesystem and decides, per random-access file,
//! whether it is served from an mmap or from pread on a descriptor.
//!
//! ## Resource budgets
//! - mmap gate: `Config::mmap_limit` mappings at once (1000 on 64-bit)
//! - descriptor gate: `Config::read_only_file_limit`, or a fifth of
//!   RLIMIT_NOFILE when unset
//!
//! Both gates are owned by the Env and handed to every file it opens.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, Status};

use super::{
    AdmissionGate, Env, Logger, PosixLogger, PosixMmapReadableFile, PosixRandomAccessFile,
    PosixSequentialFile, PosixWritableFile, RandomAccessFile, SequentialFile, WritableFile,
};

/// Descriptor budget when RLIMIT_NOFILE cannot be read
const DEFAULT_READ_ONLY_FILE_LIMIT: usize = 50;

/// Env backed by the local filesystem
pub struct PosixEnv {
    fd_limiter: Arc<AdmissionGate>,
    mmap_limiter: Arc<AdmissionGate>,
    writable_buffer_size: usize,
}

impl PosixEnv {
    pub fn new(config: &Config) -> Self {
        let fd_budget = config
            .read_only_file_limit
            .unwrap_or_else(max_open_files);

        debug!(
            fd_budget,
            mmap_budget = config.mmap_limit,
            "posix env initialized"
        );

        Self {
            fd_limiter: Arc::new(AdmissionGate::new(fd_budget)),
            mmap_limiter: Arc::new(AdmissionGate::new(config.mmap_limit)),
            writable_buffer_size: config.writable_buffer_size,
        }
    }

    /// Gate for permanently open random-access descriptors
    pub fn fd_limiter(&self) -> &Arc<AdmissionGate> {
        &self.fd_limiter
    }

    /// Gate for mmap-backed random-access files
    pub fn mmap_limiter(&self) -> &Arc<AdmissionGate> {
        &self.mmap_limiter
    }
}

impl Default for PosixEnv {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Env for PosixEnv {
    fn new_sequential_file(&self, path: &Path) -> Result<Box<dyn SequentialFile>> {
        let filename = path.display().to_string();
        let file = File::open(path).map_err(|e| Status::from_io(&filename, &e))?;
        Ok(Box::new(PosixSequentialFile::new(filename, file)))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Box<dyn RandomAccessFile>> {
        let filename = path.display().to_string();
        let file = File::open(path).map_err(|e| Status::from_io(&filename, &e))?;

        if !self.mmap_limiter.acquire() {
            debug!(file = %filename, "mmap budget exhausted, using pread");
            return Ok(Box::new(PosixRandomAccessFile::new(
                path,
                file,
                Arc::clone(&self.fd_limiter),
            )));
        }

        // The mapping outlives the descriptor; `file` is closed on return.
        match unsafe { Mmap::map(&file) } {
            Ok(mmap) => Ok(Box::new(PosixMmapReadableFile::new(
                filename,
                mmap,
                Arc::clone(&self.mmap_limiter),
            ))),
            Err(e) => {
                self.mmap_limiter.release();
                Err(Status::from_io(&filename, &e))
            }
        }
    }

    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Status::from_io(path.display().to_string(), &e))?;
        Ok(Box::new(PosixWritableFile::with_buffer_size(
            path,
            file,
            self.writable_buffer_size,
        )))
    }

    fn new_appendable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Status::from_io(path.display().to_string(), &e))?;
        Ok(Box::new(PosixWritableFile::with_buffer_size(
            path,
            file,
            self.writable_buffer_size,
        )))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn get_children(&self, dir: &Path) -> Result<Vec<String>> {
        let dir_name = dir.display().to_string();
        let mut children = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Status::from_io(&dir_name, &e))? {
            let entry = entry.map_err(|e| Status::from_io(&dir_name, &e))?;
            children.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(children)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| Status::from_io(path.display().to_string(), &e))
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir(path).map_err(|e| Status::from_io(path.display().to_string(), &e))
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path).map_err(|e| Status::from_io(path.display().to_string(), &e))
    }

    fn get_file_size(&self, path: &Path) -> Result<u64> {
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|e| Status::from_io(path.display().to_string(), &e))
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| Status::from_io(from.display().to_string(), &e))
    }

    fn new_logger(&self, path: &Path) -> Result<Box<dyn Logger>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Status::from_io(path.display().to_string(), &e))?;
        Ok(Box::new(PosixLogger::new(file)))
    }
}

/// A fifth of the soft RLIMIT_NOFILE, so table readers leave room for
/// everything else the process opens.
fn max_open_files() -> usize {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) } != 0 {
        return DEFAULT_READ_ONLY_FILE_LIMIT;
    }
    fd_budget_for_soft_limit(rlim.rlim_cur)
}

/// Descriptor budget for a given soft RLIMIT_NOFILE, capped at `i32::MAX`
fn fd_budget_for_soft_limit(soft_limit: libc::rlim_t) -> usize {
    const MAX_BUDGET: usize = i32::MAX as usize;
    if soft_limit == libc::RLIM_INFINITY {
        return MAX_BUDGET;
    }
    usize::try_from(soft_limit / 5)
        .unwrap_or(MAX_BUDGET)
        .min(MAX_BUDGET)
}
