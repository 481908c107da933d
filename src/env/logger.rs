//! Info log
//!
//! Best-effort diagnostic sink for the engine. A log call never fails and
//! never surfaces an error to the caller.

use std::fmt;
use std::io::{self, Cursor, Write};
use std::thread;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use super::Logger;

const STACK_BUFFER_SIZE: usize = 512;
const MAX_THREAD_ID_SIZE: usize = 32;

/// Logger writing timestamped lines to a byte sink (normally a LOG file)
///
/// Line format:
/// ```text
/// 2026/10/15-09:41:07.123456 ThreadId(7) message
/// ```
pub struct PosixLogger {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl PosixLogger {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    fn emit(&self, line: &[u8]) {
        let mut sink = self.sink.lock();
        let _ = sink.write_all(line);
        let _ = sink.flush();
    }
}

impl Logger for PosixLogger {
    fn logv(&self, args: fmt::Arguments<'_>) {
        let now = Local::now();
        let mut thread_id = format!("{:?}", thread::current().id());
        thread_id.truncate(MAX_THREAD_ID_SIZE);

        // First attempt: fixed stack buffer, one byte held back for '\n'.
        let mut stack_buffer = [0u8; STACK_BUFFER_SIZE];
        let mut cursor = Cursor::new(&mut stack_buffer[..STACK_BUFFER_SIZE - 1]);
        if write_line(&mut cursor, &now, &thread_id, args).is_ok() {
            let mut len = cursor.position() as usize;
            if len == 0 || stack_buffer[len - 1] != b'\n' {
                stack_buffer[len] = b'\n';
                len += 1;
            }
            self.emit(&stack_buffer[..len]);
            return;
        }

        // Did not fit: size it exactly and format once more on the heap.
        let mut counter = ByteCounter(0);
        let _ = write_line(&mut counter, &now, &thread_id, args);
        let mut heap_buffer = Vec::with_capacity(counter.0 + 1);
        let _ = write_line(&mut heap_buffer, &now, &thread_id, args);
        if heap_buffer.last() != Some(&b'\n') {
            heap_buffer.push(b'\n');
        }
        self.emit(&heap_buffer);
    }
}

fn write_line(
    out: &mut impl Write,
    now: &DateTime<Local>,
    thread_id: &str,
    args: fmt::Arguments<'_>,
) -> io::Result<()> {
    write!(
        out,
        "{} {} {}",
        now.format("%Y/%m/%d-%H:%M:%S%.6f"),
        thread_id,
        args
    )
}

/// Sink that only counts bytes
struct ByteCounter(usize);

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Logger forwarding every line to `tracing` at INFO
///
/// Lets an embedder that already runs a tracing subscriber collect the
/// engine's info log without a separate LOG file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn logv(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "atlaskv_env::info_log", "{}", args);
    }
}
