//! Error types for QAR archive operations

use crate::archive::ArchiveMode;
use crate::io::Capabilities;
use std::io;
use thiserror::Error;

/// Malformed archive contents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The file does not start with 'SQAR'
    #[error("invalid archive signature: 0x{0:08X}")]
    InvalidSignature(u32),

    /// The unmasked header version is neither 1 nor 2
    #[error("unsupported archive version: {0}")]
    UnsupportedVersion(u32),

    /// The reserved header word must be zero
    #[error("reserved header field is 0x{0:08X}, expected 0")]
    NonZeroReserved(u32),

    /// A 16-byte content header carries two different sizes
    #[error("content header sizes differ: {first} != {second}")]
    ContentSizeMismatch {
        /// First size field
        first: u32,
        /// Second size field
        second: u32,
    },

    /// A structure ended before all of its fields were read
    #[error("truncated {0}")]
    Truncated(&'static str),
}

/// Errors returned by the QAR library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive bytes do not follow the QAR layout
    #[error("invalid archive format: {0}")]
    Format(#[from] FormatError),

    /// The source lacks a capability the requested mode needs
    #[error("{mode:?} mode requires {missing:?} access")]
    MissingCapability {
        /// Requested archive mode
        mode: ArchiveMode,
        /// Capabilities the source did not report
        missing: Capabilities,
    },

    /// The archive has been closed
    #[error("archive is closed")]
    Closed,

    /// The operation is not available on this object
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// Payload decompression failed
    #[error("decompression failed: {0}")]
    Compression(String),
}

impl Error {
    /// Create an unsupported-operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(message.into())
    }

    /// Create a decompression error
    pub fn compression(message: impl Into<String>) -> Self {
        Error::Compression(message.into())
    }

    /// Whether this error describes malformed archive data
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }

    /// Recover a library error carried inside an I/O error
    ///
    /// Errors that crossed a `Read` boundary come back out as themselves;
    /// anything else becomes [`Error::Io`].
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(error)) => *error,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(kind.into()),
        }
    }

    /// Map an early end of file while reading `what` to a format error
    pub(crate) fn from_read(err: io::Error, what: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Format(FormatError::Truncated(what))
        } else {
            Error::from_io(err)
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            Error::Format(_) | Error::Compression(_) => {
                io::Error::new(io::ErrorKind::InvalidData, err)
            }
            other => io::Error::other(other),
        }
    }
}

/// Result type for QAR operations
pub type Result<T> = std::result::Result<T, Error>;
