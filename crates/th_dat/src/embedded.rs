//! Archives appended to the executable of the first title.
//!
//! ```text
//! [ MZ host image ][ payloads | table | trailer ]
//!                  ^ base     appended region ^
//! ```
//!
//! The 16 byte trailer at the very end gives the table position and the length of the
//! appended region; every offset in the table is relative to the start of that region.

use std::io::{Cursor, Write};

use binrw::{BinRead, BinWrite};
use tracing::{debug, instrument, trace};

use crate::compression::compress_rle_or_store;
use crate::container::{check_bounds, decode_name, encode_name, name_field, to_u32, Container};
use crate::entry::{CompressedMeta, CompressionMethod, Entry, SizeRule};
use crate::error::{Error, FormatError, Result};
use crate::game::GameId;
use crate::io::ByteSource;
use crate::types::{
    EmbeddedRecord, EmbeddedTrailer, EMBEDDED_RECORD_SIZE, EMBEDDED_TRAILER_SIZE,
};
use crate::write::{CreateOptions, InputFile};

const HOST_SIGNATURE: &[u8; 2] = b"MZ";
const TRAILER_SIGNATURE: &[u8; 4] = b"ZCOM";
const NAME_LIMIT: usize = 15;
const METHOD_STORED: u32 = 0;
const METHOD_RLE: u32 = 1;

/// Highest position the game can address in its own executable
pub const OFFSET_LIMIT: u64 = i32::MAX as u64;

/// Smallest valid DOS program: a 32 byte `MZ` header and `mov ax, 4C00h; int 21h`
#[rustfmt::skip]
pub const DOS_STUB: [u8; 37] = [
    0x4D, 0x5A, 0x25, 0x00, 0x01, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00,
    0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x1C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xB8, 0x00, 0x4C, 0xCD, 0x21,
];

fn check_offset_limit(position: u64) -> Result<()> {
    if position > OFFSET_LIMIT {
        return Err(Error::FormatError(FormatError::OffsetLimit(position)));
    }
    Ok(())
}

/// [`Container`] for archives carried by an executable
#[derive(Debug, Clone, Copy)]
pub struct Embedded;

impl Container for Embedded {
    #[instrument(skip(source), err)]
    fn read_table(&self, source: &mut dyn ByteSource) -> Result<Vec<Entry>> {
        let len = source.stream_len()?;
        if len < (HOST_SIGNATURE.len() + EMBEDDED_TRAILER_SIZE) as u64 {
            return Err(Error::FormatError(FormatError::Signature("MZ")));
        }
        if source.read_at(0, HOST_SIGNATURE.len())? != HOST_SIGNATURE {
            return Err(Error::FormatError(FormatError::Signature("MZ")));
        }

        let trailer_offset = len - EMBEDDED_TRAILER_SIZE as u64;
        let trailer = EmbeddedTrailer::read(&mut Cursor::new(
            source.read_at(trailer_offset, EMBEDDED_TRAILER_SIZE)?,
        ))?;
        if &trailer.signature != TRAILER_SIGNATURE {
            return Err(Error::FormatError(FormatError::Signature("ZCOM")));
        }
        debug!(?trailer, "read embedded trailer");

        let region_length = trailer.region_length as u64;
        if region_length < EMBEDDED_TRAILER_SIZE as u64
            || region_length > len - HOST_SIGNATURE.len() as u64
        {
            return Err(Error::FormatError(FormatError::Table(format!(
                "appended region of {region_length:#x} bytes does not fit the executable"
            ))));
        }
        let base = len - region_length;

        let table_offset = base + trailer.table_offset as u64;
        let table_size = trailer.count as u64 * EMBEDDED_RECORD_SIZE as u64;
        check_bounds("table", table_offset, table_size, trailer_offset)?;

        let mut table = Cursor::new(source.read_at(table_offset, table_size as usize)?);
        (0..trailer.count)
            .map(|_| -> Result<Entry> {
                let record = EmbeddedRecord::read(&mut table)?;
                let name = decode_name(&record.name)?;
                let method = match record.method {
                    METHOD_STORED => CompressionMethod::Stored,
                    METHOD_RLE => CompressionMethod::Rle,
                    method => {
                        return Err(Error::FormatError(FormatError::UnknownMethod {
                            name,
                            method,
                        }))
                    }
                };

                let offset = base + record.offset as u64;
                let packed_size = record.packed_size as u64;
                check_bounds(&name, offset, packed_size, table_offset)?;
                check_offset_limit(offset + packed_size)?;

                trace!(%name, %method, offset, size = record.size, "read record");
                Ok(Entry {
                    name,
                    offset,
                    size: record.size as u64,
                    compression: Some(CompressedMeta {
                        compressed_size: packed_size,
                        method,
                        key: 0,
                        checksum: None,
                    }),
                })
            })
            .collect()
    }

    #[instrument(skip(self, writer, files, options), fields(count = files.len()), err)]
    fn write(
        &self,
        _game: GameId,
        writer: &mut dyn Write,
        files: &[InputFile],
        options: &CreateOptions,
    ) -> Result<Vec<Entry>> {
        let host = options.host_executable.as_deref().unwrap_or(&DOS_STUB);
        if !host.starts_with(HOST_SIGNATURE) {
            return Err(Error::FormatError(FormatError::Signature("MZ")));
        }
        let base = host.len() as u64;

        let mut payload = Vec::new();
        let mut table = Cursor::new(Vec::with_capacity(files.len() * EMBEDDED_RECORD_SIZE));
        let mut entries = Vec::with_capacity(files.len());

        for file in files {
            let encoded = encode_name(&file.name, NAME_LIMIT)?;
            let (method, packed) = compress_rle_or_store(&file.data);
            let relative = payload.len() as u64;
            check_offset_limit(base + relative + packed.len() as u64)?;

            EmbeddedRecord {
                name: name_field(&encoded),
                offset: to_u32(relative)?,
                size: to_u32(file.data.len() as u64)?,
                packed_size: to_u32(packed.len() as u64)?,
                method: match method {
                    CompressionMethod::Rle => METHOD_RLE,
                    _ => METHOD_STORED,
                },
            }
            .write(&mut table)?;

            entries.push(Entry {
                name: file.name.clone(),
                offset: base + relative,
                size: file.data.len() as u64,
                compression: Some(CompressedMeta {
                    compressed_size: packed.len() as u64,
                    method,
                    key: 0,
                    checksum: None,
                }),
            });
            payload.extend_from_slice(&packed);
        }

        let table = table.into_inner();
        let region_length = (payload.len() + table.len() + EMBEDDED_TRAILER_SIZE) as u64;
        check_offset_limit(base + region_length)?;

        let trailer = EmbeddedTrailer {
            table_offset: to_u32(payload.len() as u64)?,
            count: to_u32(files.len() as u64)?,
            region_length: to_u32(region_length)?,
            signature: *TRAILER_SIGNATURE,
        };
        let mut raw_trailer = Cursor::new(Vec::with_capacity(EMBEDDED_TRAILER_SIZE));
        trailer.write(&mut raw_trailer)?;

        writer.write_all(host)?;
        writer.write_all(&payload)?;
        writer.write_all(&table)?;
        writer.write_all(raw_trailer.get_ref())?;

        Ok(entries)
    }

    fn size_rule(&self) -> SizeRule {
        SizeRule::LowerBound
    }
}
