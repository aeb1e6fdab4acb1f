//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// The archive or its input does not follow the layout of the selected game
    #[error(transparent)]
    FormatError(#[from] FormatError),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<binrw::Error> for Error {
    /// Only the root cause is kept; context frames would render as a terminal backtrace
    fn from(value: binrw::Error) -> Self {
        match value {
            binrw::Error::Io(error) => Error::IOError(error),
            binrw::Error::Backtrace(backtrace) => Error::from(*backtrace.error),
            other => Error::FormatError(FormatError::Binary(other.to_string())),
        }
    }
}

/// Further information on why an archive, entry or input was rejected
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// {0}
    #[error("malformed structure: {0}")]
    Binary(String),

    /// missing {0} signature
    #[error("missing {0} signature")]
    Signature(&'static str),

    /// {0}
    #[error("invalid table: {0}")]
    Table(String),

    /// entry {name} lies outside of the archive
    #[error("entry {name} ({offset:#x} + {size:#x}) lies outside of the {limit:#x} bytes available")]
    OutOfBounds {
        name: String,
        offset: u64,
        size: u64,
        limit: u64,
    },

    /// entry {name} is stored with an unknown method {method:#x}
    #[error("entry {name} is stored with an unknown method {method:#x}")]
    UnknownMethod { name: String, method: u32 },

    /// entry {name} decoded to fewer bytes than recorded
    #[error("entry {name} decoded to {actual} bytes, at least {expected} expected")]
    UndersizedOutput {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// entry {name} decoded to a different size than recorded
    #[error("entry {name} decoded to {actual} bytes, {expected} expected")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// entry {name} failed its checksum
    #[error("entry {name} has checksum {actual:#010x}, {expected:#010x} expected")]
    Checksum {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// compressed stream is corrupt
    #[error("compressed stream of {name} is corrupt: {reason}")]
    Corrupt { name: String, reason: &'static str },

    /// {0} cannot be represented in the archive's codepage
    #[error("{0} cannot be represented in the archive's codepage")]
    NameEncoding(String),

    /// name {name} is longer than {max} bytes
    #[error("name {name} is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },

    /// name {0} contains characters this archive cannot store
    #[error("name {0} contains characters this archive cannot store")]
    InvalidName(String),

    /// name {0} appears more than once
    #[error("name {0} appears more than once")]
    DuplicateName(String),

    /// {0} is empty
    #[error("{0} is empty")]
    EmptyFile(String),

    /// entry {name} is larger than {max} bytes
    #[error("entry {name} of {size} bytes is larger than the {max} bytes allowed")]
    EntryTooLarge { name: String, size: u64, max: u64 },

    /// archive position {0:#x} cannot be addressed
    #[error("archive position {0:#x} cannot be addressed")]
    OffsetLimit(u64),

    /// name {0} would be written outside the target directory
    #[error("name {0} would be written outside the target directory")]
    UnsafePath(String),

    /// {declared} entries were declared but {actual} were given
    #[error("{declared} entries were declared but {actual} were given")]
    CountMismatch { declared: usize, actual: usize },

    /// entry {actual} was packed where {expected} was declared
    #[error("entry {actual} was packed where {expected} was declared")]
    OutOfOrder { expected: String, actual: String },

    /// entry {0} was not declared
    #[error("entry {0} was not declared")]
    Undeclared(String),

    /// only {packed} of {declared} entries were packed
    #[error("only {packed} of {declared} entries were packed")]
    Incomplete { declared: usize, packed: usize },

    /// archive has already been sealed
    #[error("archive has already been sealed")]
    Sealed,
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
