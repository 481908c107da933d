//! Error types for AtlasKV's resource layer
//!
//! `Status` is the single error type passed across the file and cache
//! boundaries. Success is plain `Ok(..)`; every failure is one of the
//! variants below.

use std::io;

use thiserror::Error;

/// Result type alias using Status
pub type Result<T> = std::result::Result<T, Status>;

/// Failure taxonomy for every fallible operation in this crate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Status {
    #[error("NotFound: {0}")]
    NotFound(String),

    #[error("Corruption: {0}")]
    Corruption(String),

    #[error("Not implemented: {0}")]
    NotSupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl Status {
    // -------------------------------------------------------------------------
    // Constructors (context + detail, rendered as "context: detail")
    // -------------------------------------------------------------------------

    pub fn not_found(context: impl AsRef<str>, detail: impl AsRef<str>) -> Self {
        Status::NotFound(join(context.as_ref(), detail.as_ref()))
    }

    pub fn corruption(context: impl AsRef<str>, detail: impl AsRef<str>) -> Self {
        Status::Corruption(join(context.as_ref(), detail.as_ref()))
    }

    pub fn not_supported(context: impl AsRef<str>, detail: impl AsRef<str>) -> Self {
        Status::NotSupported(join(context.as_ref(), detail.as_ref()))
    }

    pub fn invalid_argument(context: impl AsRef<str>, detail: impl AsRef<str>) -> Self {
        Status::InvalidArgument(join(context.as_ref(), detail.as_ref()))
    }

    pub fn io_error(context: impl AsRef<str>, detail: impl AsRef<str>) -> Self {
        Status::IoError(join(context.as_ref(), detail.as_ref()))
    }

    /// Translate an OS error at the syscall boundary.
    ///
    /// ENOENT becomes `NotFound`; everything else is an `IoError` carrying
    /// the OS message text.
    pub fn from_io(context: impl AsRef<str>, err: &io::Error) -> Self {
        let detail = os_message(err);
        if err.raw_os_error() == Some(libc::ENOENT) || err.kind() == io::ErrorKind::NotFound {
            Status::not_found(context, detail)
        } else {
            Status::io_error(context, detail)
        }
    }

    // -------------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------------

    pub fn is_not_found(&self) -> bool {
        matches!(self, Status::NotFound(_))
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Status::Corruption(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Status::NotSupported(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Status::InvalidArgument(_))
    }

    pub fn is_io_error(&self) -> bool {
        matches!(self, Status::IoError(_))
    }

    /// The message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            Status::NotFound(m)
            | Status::Corruption(m)
            | Status::NotSupported(m)
            | Status::InvalidArgument(m)
            | Status::IoError(m) => m,
        }
    }
}

fn join(context: &str, detail: &str) -> String {
    if detail.is_empty() {
        context.to_string()
    } else {
        format!("{}: {}", context, detail)
    }
}

/// strerror(3) text for raw OS errors, the io::Error rendering otherwise.
pub(crate) fn os_message(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => errno_message(code),
        None => err.to_string(),
    }
}

/// strerror(3) text for an errno value
pub(crate) fn errno_message(code: i32) -> String {
    // io::Error's Display appends " (os error N)"; strip it to keep the
    // bare OS text.
    let text = io::Error::from_raw_os_error(code).to_string();
    match text.rfind(" (os error") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}
