//! PBG3 archives, the layout of the first Windows title.
//!
//! Every integer of the header and the table is bit-packed: a 2 bit field holding the
//! number of bytes minus one, followed by that many bytes, most significant bit first.
//! The table is a single bit stream, so records are not byte aligned.
//!
//! The payloads follow the 13 byte header directly and the table comes last. The
//! packed size of a payload is not recorded; it runs up to the next payload, or up to
//! the table for the last one.

use std::io::Write;

use tracing::{debug, instrument, trace};

use crate::compression::{checksum, compress};
use crate::container::{check_bounds, decode_name, encode_name, to_u32, Container};
use crate::entry::{CompressedMeta, CompressionMethod, Entry, SizeRule};
use crate::error::{Error, FormatError, Result};
use crate::game::GameId;
use crate::io::ByteSource;
use crate::lzss::{BitReader, BitWriter};
use crate::write::{CreateOptions, InputFile};

const MAGIC: &[u8; 4] = b"PBG3";
/// The magic and room for two packed integers of at most 34 bits
const HEADER_SIZE: u64 = 13;
const NAME_LIMIT: usize = 255;

/// Read an integer stored as a 2 bit byte count followed by that many bytes
fn read_packed(bits: &mut BitReader) -> Option<u32> {
    let bytes = bits.bits(2)? + 1;
    let mut value = 0u32;
    for _ in 0..bytes {
        value = (value << 8) | bits.bits(8)? as u32;
    }
    Some(value)
}

/// Write `value` with as few bytes as it needs
fn write_packed(bits: &mut BitWriter, value: u32) {
    let bytes = (4 - value.leading_zeros() / 8).max(1);
    bits.bits(bytes as usize - 1, 2);
    for shift in (0..bytes).rev() {
        bits.bits((value >> (shift * 8)) as usize & 0xFF, 8);
    }
}

/// Entry of a PBG3 archive table
#[derive(Debug, Clone, PartialEq, Eq)]
struct PbgRecord {
    /// Two fields of unknown meaning, written as `0`
    unknown: [u32; 2],

    /// Wrapping sum of the compressed bytes
    checksum: u32,

    /// The offset to the data for this record from the start of the file
    offset: u32,

    /// The size of the data for this record before compression
    size: u32,

    /// Shift-JIS name of the entry, without its NUL
    name: Vec<u8>,
}

impl PbgRecord {
    fn read(bits: &mut BitReader) -> Result<PbgRecord> {
        let truncated =
            || Error::FormatError(FormatError::Table("table ends inside a record".into()));

        let mut field = || read_packed(bits).ok_or_else(truncated);
        let unknown = [field()?, field()?];
        let checksum = field()?;
        let offset = field()?;
        let size = field()?;

        let mut name = Vec::new();
        loop {
            match bits.bits(8).ok_or_else(truncated)? as u8 {
                0 => break,
                byte if name.len() < NAME_LIMIT => name.push(byte),
                _ => {
                    return Err(Error::FormatError(FormatError::Table(format!(
                        "name at {offset:#x} is not terminated within {NAME_LIMIT} bytes"
                    ))))
                }
            }
        }

        Ok(PbgRecord {
            unknown,
            checksum,
            offset,
            size,
            name,
        })
    }

    fn write(&self, bits: &mut BitWriter) {
        for value in self.unknown {
            write_packed(bits, value);
        }
        write_packed(bits, self.checksum);
        write_packed(bits, self.offset);
        write_packed(bits, self.size);
        for &byte in self.name.iter().chain([&0]) {
            bits.bits(byte as usize, 8);
        }
    }
}

/// [`Container`] for PBG3 archives
#[derive(Debug, Clone, Copy)]
pub struct Pbg;

impl Container for Pbg {
    #[instrument(skip(source), err)]
    fn read_table(&self, source: &mut dyn ByteSource) -> Result<Vec<Entry>> {
        let len = source.stream_len()?;
        if len < MAGIC.len() as u64 || source.read_at(0, MAGIC.len())? != MAGIC {
            return Err(Error::FormatError(FormatError::Signature("PBG3")));
        }

        let header = source.read_at(0, HEADER_SIZE.min(len) as usize)?;
        let mut bits = BitReader::new(&header[MAGIC.len()..]);
        let truncated = || Error::FormatError(FormatError::Table("header ends early".into()));
        let count = read_packed(&mut bits).ok_or_else(truncated)?;
        let table_offset = read_packed(&mut bits).ok_or_else(truncated)? as u64;
        debug!(count, table_offset, "read pbg header");

        if table_offset < HEADER_SIZE || table_offset > len {
            return Err(Error::FormatError(FormatError::Table(format!(
                "table offset {table_offset:#x} lies outside of the {len:#x} bytes available"
            ))));
        }

        let table = source.read_at(table_offset, (len - table_offset) as usize)?;
        let mut bits = BitReader::new(&table);
        let records = (0..count)
            .map(|_| PbgRecord::read(&mut bits))
            .collect::<Result<Vec<_>>>()?;

        let mut starts: Vec<u64> = records.iter().map(|record| record.offset as u64).collect();
        starts.sort_unstable();

        records
            .into_iter()
            .map(|record| -> Result<Entry> {
                let name = decode_name(&record.name)?;
                let offset = record.offset as u64;
                if offset < HEADER_SIZE {
                    return Err(Error::FormatError(FormatError::Table(format!(
                        "payload of {name} overlaps the header"
                    ))));
                }

                let next = starts.partition_point(|&start| start <= offset);
                let end = starts.get(next).copied().unwrap_or(table_offset);
                let packed_size = end.saturating_sub(offset);
                check_bounds(&name, offset, packed_size, table_offset)?;

                trace!(%name, offset, packed_size, size = record.size, "read record");
                Ok(Entry {
                    name,
                    offset,
                    size: record.size as u64,
                    compression: Some(CompressedMeta {
                        compressed_size: packed_size,
                        method: CompressionMethod::Lzss,
                        key: 0,
                        checksum: Some(record.checksum),
                    }),
                })
            })
            .collect()
    }

    #[instrument(skip(self, writer, files, _options), fields(count = files.len()), err)]
    fn write(
        &self,
        _game: GameId,
        writer: &mut dyn Write,
        files: &[InputFile],
        _options: &CreateOptions,
    ) -> Result<Vec<Entry>> {
        let mut payload = Vec::new();
        let mut table = BitWriter::default();
        let mut entries = Vec::with_capacity(files.len());

        for file in files {
            let encoded = encode_name(&file.name, NAME_LIMIT)?;
            let packed = compress(&file.data, CompressionMethod::Lzss)?;
            let offset = HEADER_SIZE + payload.len() as u64;
            let sum = checksum(&packed);

            PbgRecord {
                unknown: [0; 2],
                checksum: sum,
                offset: to_u32(offset)?,
                size: to_u32(file.data.len() as u64)?,
                name: encoded,
            }
            .write(&mut table);

            entries.push(Entry {
                name: file.name.clone(),
                offset,
                size: file.data.len() as u64,
                compression: Some(CompressedMeta {
                    compressed_size: packed.len() as u64,
                    method: CompressionMethod::Lzss,
                    key: 0,
                    checksum: Some(sum),
                }),
            });
            payload.extend_from_slice(&packed);
        }

        let mut header = BitWriter::default();
        write_packed(&mut header, to_u32(files.len() as u64)?);
        write_packed(&mut header, to_u32(HEADER_SIZE + payload.len() as u64)?);

        let mut raw_header = MAGIC.to_vec();
        raw_header.extend_from_slice(&header.finish());
        raw_header.resize(HEADER_SIZE as usize, 0);

        writer.write_all(&raw_header)?;
        writer.write_all(&payload)?;
        writer.write_all(&table.finish())?;

        Ok(entries)
    }

    fn size_rule(&self) -> SizeRule {
        SizeRule::Exact
    }
}
