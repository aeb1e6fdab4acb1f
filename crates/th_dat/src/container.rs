//! The interface every archive layout implements, plus the helpers they share.

use std::io::Write;

use encoding_rs::SHIFT_JIS;

use crate::entry::{Entry, SizeRule};
use crate::error::{Error, FormatError, Result};
use crate::game::GameId;
use crate::io::ByteSource;
use crate::write::{CreateOptions, InputFile};

/// One on-disk archive layout
///
/// Implementations hold no state of their own: the archive facade owns the stream and
/// the parsed table, and picks the implementation through [`crate::Format::container`].
pub trait Container: Sync {
    /// Parse and validate the entry table, returning entries in on-disk order
    fn read_table(&self, source: &mut dyn ByteSource) -> Result<Vec<Entry>>;

    /// Encode `files` and write the complete archive to `writer`
    ///
    /// Every input is validated and encoded before anything is written.
    fn write(
        &self,
        game: GameId,
        writer: &mut dyn Write,
        files: &[InputFile],
        options: &CreateOptions,
    ) -> Result<Vec<Entry>>;

    /// How recorded sizes relate to decoded lengths
    fn size_rule(&self) -> SizeRule;
}

/// Decode a NUL terminated or NUL padded Shift-JIS name
pub(crate) fn decode_name(raw: &[u8]) -> Result<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let raw = &raw[..end];
    if raw.is_empty() {
        return Err(Error::FormatError(FormatError::Table(
            "entry without a name".into(),
        )));
    }

    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(|name| name.into_owned())
        .ok_or_else(|| {
            Error::FormatError(FormatError::NameEncoding(
                String::from_utf8_lossy(raw).into_owned(),
            ))
        })
}

/// Encode `name` as Shift-JIS, allowing at most `max` bytes
pub(crate) fn encode_name(name: &str, max: usize) -> Result<Vec<u8>> {
    let (encoded, _, unmappable) = SHIFT_JIS.encode(name);
    if unmappable || encoded.contains(&0) {
        return Err(Error::FormatError(FormatError::NameEncoding(name.into())));
    }
    if encoded.len() > max {
        return Err(Error::FormatError(FormatError::NameTooLong {
            name: name.into(),
            max,
        }));
    }
    Ok(encoded.into_owned())
}

/// Copy an encoded name into a NUL padded field
pub(crate) fn name_field<const N: usize>(encoded: &[u8]) -> [u8; N] {
    let mut field = [0u8; N];
    field[..encoded.len()].copy_from_slice(encoded);
    field
}

/// Fail unless `offset + size` lies within `limit`
pub(crate) fn check_bounds(name: &str, offset: u64, size: u64, limit: u64) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if end <= limit => Ok(()),
        _ => Err(Error::FormatError(FormatError::OutOfBounds {
            name: name.into(),
            offset,
            size,
            limit,
        })),
    }
}

/// Narrow an archive position to the 32 bits the tables store
pub(crate) fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::FormatError(FormatError::OffsetLimit(value)))
}

/// Fail unless `size` fits the field a table records it in
pub(crate) fn check_size(name: &str, size: usize, max: u64) -> Result<()> {
    if size as u64 > max {
        return Err(Error::FormatError(FormatError::EntryTooLarge {
            name: name.into(),
            size: size as u64,
            max,
        }));
    }
    Ok(())
}
