//! Sequential file
//!
//! Forward-only cursor reads, used for log and manifest replay.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::error::{Result, Status};
use crate::slice::ByteView;

use super::SequentialFile;

/// Sequential reader over an OS file
pub struct PosixSequentialFile {
    filename: String,
    file: File,
}

impl PosixSequentialFile {
    pub fn new(filename: impl Into<String>, file: File) -> Self {
        Self {
            filename: filename.into(),
            file,
        }
    }
}

impl SequentialFile for PosixSequentialFile {
    fn read<'a>(&mut self, n: usize, scratch: &'a mut [u8]) -> Result<ByteView<'a>> {
        debug_assert!(scratch.len() >= n, "scratch shorter than requested read");
        let n = n.min(scratch.len());

        let read_size = loop {
            match self.file.read(&mut scratch[..n]) {
                Ok(read_size) => break read_size,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Status::from_io(&self.filename, &e)),
            }
        };

        Ok(ByteView::new(&scratch[..read_size]))
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let delta = i64::try_from(n)
            .map_err(|_| Status::invalid_argument(&self.filename, "skip distance too large"))?;
        self.file
            .seek(SeekFrom::Current(delta))
            .map_err(|e| Status::from_io(&self.filename, &e))?;
        Ok(())
    }
}
