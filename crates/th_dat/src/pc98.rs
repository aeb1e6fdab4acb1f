//! Archives of the PC-98 titles.
//!
//! The first revision starts directly with the record table, which ends with an all
//! zero record. The second revision puts a 16 byte header in front of the table and
//! ciphers the table with a key that is updated by every byte it decodes.

use std::io::{Cursor, Write};

use binrw::{BinRead, BinWrite};
use derive_more::Display;
use tracing::{debug, instrument, trace};

use crate::compression::{compress_rle_or_store, mask};
use crate::container::{
    check_bounds, check_size, decode_name, encode_name, name_field, to_u32, Container,
};
use crate::entry::{CompressedMeta, CompressionMethod, Entry, SizeRule};
use crate::error::{Error, FormatError, Result};
use crate::game::GameId;
use crate::io::ByteSource;
use crate::types::{Pc98Header, Pc98Record, PC98_HEADER_SIZE, PC98_RECORD_SIZE};
use crate::write::{CreateOptions, InputFile};

const MAGIC_RLE: u16 = 0xF388;
const MAGIC_STORED: u16 = 0x9595;
const VERSION: u16 = 2;
const NAME_MASK: u8 = 0xFF;
const NAME_LIMIT: usize = 12;
const SIZE_LIMIT: u64 = u16::MAX as u64;

/// Table layout of a PC-98 archive
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Revision {
    /// Bare table closed by a terminator record
    #[display("rev. 1")]
    Rev1,
    /// Header followed by a ciphered table
    #[display("rev. 2")]
    Rev2,
}

/// [`Container`] for the PC-98 archives
#[derive(Debug, Clone, Copy)]
pub struct Pc98 {
    revision: Revision,
}

fn decipher_table(table: &mut [u8], mut key: u8) {
    for byte in table {
        let cipher = *byte;
        *byte ^= key;
        key = key.wrapping_sub(cipher);
    }
}

fn encipher_table(table: &mut [u8], mut key: u8) {
    for byte in table {
        *byte ^= key;
        key = key.wrapping_sub(*byte);
    }
}

fn unmask_name(mut field: [u8; 13]) -> [u8; 13] {
    field.iter_mut().for_each(|b| *b ^= NAME_MASK);
    field
}

impl Pc98 {
    pub const fn new(revision: Revision) -> Self {
        Self { revision }
    }

    /// Size of everything in front of the first payload
    fn table_end(&self, count: usize) -> u64 {
        match self.revision {
            Revision::Rev1 => ((count + 1) * PC98_RECORD_SIZE) as u64,
            Revision::Rev2 => (PC98_HEADER_SIZE + count * PC98_RECORD_SIZE) as u64,
        }
    }

    fn read_records(&self, source: &mut dyn ByteSource, len: u64) -> Result<Vec<Pc98Record>> {
        match self.revision {
            Revision::Rev1 => {
                let mut records = Vec::new();
                let mut position = 0;
                loop {
                    if position + PC98_RECORD_SIZE as u64 > len {
                        return Err(Error::FormatError(FormatError::Table(
                            "table is missing its terminator record".into(),
                        )));
                    }
                    let raw = source.read_at(position, PC98_RECORD_SIZE)?;
                    let record = Pc98Record::read(&mut Cursor::new(raw))?;
                    if record.magic == 0 {
                        return Ok(records);
                    }
                    records.push(record);
                    position += PC98_RECORD_SIZE as u64;
                }
            }
            Revision::Rev2 => {
                if len < PC98_HEADER_SIZE as u64 {
                    return Err(Error::FormatError(FormatError::Table(
                        "archive is shorter than its header".into(),
                    )));
                }
                let header =
                    Pc98Header::read(&mut Cursor::new(source.read_at(0, PC98_HEADER_SIZE)?))?;
                debug!(?header, "read pc-98 header");

                if header.version != VERSION {
                    return Err(Error::FormatError(FormatError::Table(format!(
                        "unknown version {}",
                        header.version
                    ))));
                }
                let table_size = header.count as usize * PC98_RECORD_SIZE;
                if header.table_size as usize != table_size {
                    return Err(Error::FormatError(FormatError::Table(format!(
                        "table of {} bytes cannot hold {} records",
                        header.table_size, header.count
                    ))));
                }
                check_bounds("table", PC98_HEADER_SIZE as u64, table_size as u64, len)?;

                let mut table = source.read_at(PC98_HEADER_SIZE as u64, table_size)?;
                decipher_table(&mut table, header.table_key);

                let mut table = Cursor::new(table);
                (0..header.count)
                    .map(|_| Pc98Record::read(&mut table).map_err(Error::from))
                    .collect()
            }
        }
    }
}

impl Container for Pc98 {
    #[instrument(skip(source), err)]
    fn read_table(&self, source: &mut dyn ByteSource) -> Result<Vec<Entry>> {
        let len = source.stream_len()?;
        let records = self.read_records(source, len)?;
        let table_end = self.table_end(records.len());

        records
            .iter()
            .map(|record| -> Result<Entry> {
                let name = decode_name(&unmask_name(record.name))?;
                let method = match record.magic {
                    MAGIC_RLE => CompressionMethod::Rle,
                    MAGIC_STORED => CompressionMethod::Stored,
                    magic => {
                        return Err(Error::FormatError(FormatError::UnknownMethod {
                            name,
                            method: magic as u32,
                        }))
                    }
                };

                let offset = record.offset as u64;
                if offset < table_end {
                    return Err(Error::FormatError(FormatError::Table(format!(
                        "payload of {name} overlaps the table"
                    ))));
                }
                check_bounds(&name, offset, record.packed_size as u64, len)?;

                trace!(%name, %method, offset, size = record.size, "read record");
                Ok(Entry {
                    name,
                    offset,
                    size: record.size as u64,
                    compression: Some(CompressedMeta {
                        compressed_size: record.packed_size as u64,
                        method,
                        key: record.key,
                        checksum: None,
                    }),
                })
            })
            .collect()
    }

    #[instrument(skip(self, writer, files, _options), fields(revision = %self.revision, count = files.len()), err)]
    fn write(
        &self,
        game: GameId,
        writer: &mut dyn Write,
        files: &[InputFile],
        _options: &CreateOptions,
    ) -> Result<Vec<Entry>> {
        let (data_key, table_key) = game.pc98_keys();

        let mut offset = self.table_end(files.len());
        let mut records = Vec::with_capacity(files.len());
        let mut entries = Vec::with_capacity(files.len());
        let mut payload = Vec::new();

        for file in files {
            if file.name.contains('/') {
                return Err(Error::FormatError(FormatError::InvalidName(
                    file.name.clone(),
                )));
            }
            let encoded = encode_name(&file.name, NAME_LIMIT)?;
            check_size(&file.name, file.data.len(), SIZE_LIMIT)?;

            let (method, mut packed) = compress_rle_or_store(&file.data);
            mask(&mut packed, data_key);

            records.push(Pc98Record {
                magic: match method {
                    CompressionMethod::Rle => MAGIC_RLE,
                    _ => MAGIC_STORED,
                },
                key: data_key,
                name: unmask_name(name_field(&encoded)),
                packed_size: packed.len() as u16,
                size: file.data.len() as u16,
                offset: to_u32(offset)?,
                reserved: [0; 2],
            });
            entries.push(Entry {
                name: file.name.clone(),
                offset,
                size: file.data.len() as u64,
                compression: Some(CompressedMeta {
                    compressed_size: packed.len() as u64,
                    method,
                    key: data_key,
                    checksum: None,
                }),
            });

            offset += packed.len() as u64;
            payload.extend_from_slice(&packed);
        }
        to_u32(offset)?;

        let mut table = Cursor::new(Vec::with_capacity(self.table_end(files.len()) as usize));
        for record in &records {
            record.write(&mut table)?;
        }

        match self.revision {
            Revision::Rev1 => {
                Pc98Record::default().write(&mut table)?;
                writer.write_all(table.get_ref())?;
            }
            Revision::Rev2 => {
                let mut table = table.into_inner();
                if table.len() as u64 > SIZE_LIMIT {
                    return Err(Error::FormatError(FormatError::Table(format!(
                        "{} entries do not fit a 16 bit table",
                        files.len()
                    ))));
                }
                encipher_table(&mut table, table_key);

                let header = Pc98Header {
                    table_size: table.len() as u16,
                    version: VERSION,
                    count: files.len() as u16,
                    table_key,
                    ..Default::default()
                };
                let mut raw_header = Cursor::new(Vec::with_capacity(PC98_HEADER_SIZE));
                header.write(&mut raw_header)?;

                writer.write_all(raw_header.get_ref())?;
                writer.write_all(&table)?;
            }
        }
        writer.write_all(&payload)?;

        Ok(entries)
    }

    fn size_rule(&self) -> SizeRule {
        SizeRule::LowerBound
    }
}
