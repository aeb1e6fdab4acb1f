//! Description of a single file stored in an archive

use derive_more::Display;

use crate::error::{Error, FormatError, Result};

/// Identifies how the payload of an entry was stored
#[derive(Debug, Display, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    #[display("stored")]
    Stored,

    /// Run-length encoding of the PC-98 titles
    #[display("rle")]
    Rle,

    /// LZSS with a 8 KiB dictionary
    #[display("lzss")]
    Lzss,

    /// Compress the data using Zlib
    #[display("zlib")]
    Zlib,
}

/// Details about the stored form of a compressed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedMeta {
    /// Number of bytes the payload occupies in the archive
    pub compressed_size: u64,

    /// How the payload was compressed
    pub method: CompressionMethod,

    /// Key every stored byte is XORed with, `0` when the payload is not masked
    pub key: u8,

    /// Wrapping sum of the stored bytes, for formats recording one
    pub checksum: Option<u32>,
}

/// A file contained in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Relative path of the file, using `/` between directories
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Use [`crate::Archive::extract_to`],
    /// which refuses such names.
    pub name: String,

    /// Absolute position of the stored payload in the archive
    pub offset: u64,

    /// Size of the file once decoded
    pub size: u64,

    /// `None` for payloads stored verbatim
    pub compression: Option<CompressedMeta>,
}

impl Entry {
    /// Number of bytes the payload occupies in the archive
    pub fn stored_size(&self) -> u64 {
        self.compression
            .map_or(self.size, |meta| meta.compressed_size)
    }

    /// Compression method of the payload
    pub fn method(&self) -> CompressionMethod {
        self.compression
            .map_or(CompressionMethod::Stored, |meta| meta.method)
    }

    /// Position right after the stored payload
    pub fn end(&self) -> u64 {
        self.offset + self.stored_size()
    }
}

/// How the recorded size of an entry relates to its decoded length
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq)]
pub enum SizeRule {
    /// The decoded length always equals the recorded size
    #[display("exact")]
    Exact,

    /// The decoded length is at least the recorded size
    #[display("lower bound")]
    LowerBound,
}

impl SizeRule {
    /// Check a decoded length against what `entry` records
    pub fn check(&self, entry: &Entry, actual: usize) -> Result<()> {
        let actual = actual as u64;
        match self {
            SizeRule::Exact if actual != entry.size => {
                Err(Error::FormatError(FormatError::SizeMismatch {
                    name: entry.name.clone(),
                    expected: entry.size,
                    actual,
                }))
            }
            SizeRule::LowerBound if actual < entry.size => {
                Err(Error::FormatError(FormatError::UndersizedOutput {
                    name: entry.name.clone(),
                    expected: entry.size,
                    actual,
                }))
            }
            _ => Ok(()),
        }
    }
}
