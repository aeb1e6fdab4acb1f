//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// The input does not follow the layout the codec expects
    #[error(transparent)]
    FormatError(#[from] FormatError),

    /// The codec can decode this kind of input but refuses to produce it
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Further information on why an input was rejected
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// input of {actual} bytes, expected {expected}
    #[error("input of {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },

    /// input is shorter than its {0} header
    #[error("input is shorter than its {0} header")]
    Truncated(&'static str),

    /// unexpected value in {field}: {value:#x}
    #[error("unexpected value in {field}: {value:#x}")]
    Field { field: &'static str, value: u32 },

    /// missing {0} signature
    #[error("missing {0} signature")]
    Signature(&'static str),

    /// palette channel cannot be stored in 5 bits
    #[error("palette entry {0} cannot be represented in ARGB1555")]
    PaletteEntry(usize),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
