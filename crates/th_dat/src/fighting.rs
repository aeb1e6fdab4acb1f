//! Archives of the fighting titles.
//!
//! A 16 bit entry count is followed by fixed size records and the zlib compressed
//! payloads. There is no signature, so an archive is recognised by a table whose
//! records all point at payloads behind it.

use std::io::{Cursor, Write};

use binrw::{BinRead, BinWrite};
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, instrument, trace};

use crate::compression::compress;
use crate::container::{check_bounds, decode_name, encode_name, name_field, to_u32, Container};
use crate::entry::{CompressedMeta, CompressionMethod, Entry, SizeRule};
use crate::error::{Error, FormatError, Result};
use crate::game::GameId;
use crate::io::ByteSource;
use crate::types::{FightingRecord, FIGHTING_RECORD_SIZE};
use crate::write::{CreateOptions, InputFile};

const COUNT_SIZE: usize = 2;
const NAME_LIMIT: usize = 99;

const INITIAL_KEY: u8 = 0x64;
const INITIAL_STEP: u8 = 0x64;
const STEP_DELTA: u8 = 0x4D;

/// Apply the table keystream, its own inverse
fn obfuscate_table(table: &mut [u8]) {
    let (mut key, mut step) = (INITIAL_KEY, INITIAL_STEP);
    for byte in table {
        *byte ^= key;
        key = key.wrapping_add(step);
        step = step.wrapping_add(STEP_DELTA);
    }
}

/// [`Container`] for the fighting game archives
#[derive(Debug, Clone, Copy)]
pub struct Fighting;

impl Container for Fighting {
    #[instrument(skip(source), err)]
    fn read_table(&self, source: &mut dyn ByteSource) -> Result<Vec<Entry>> {
        let len = source.stream_len()?;
        if len < COUNT_SIZE as u64 {
            return Err(Error::FormatError(FormatError::Table(
                "archive is shorter than its entry count".into(),
            )));
        }

        let count = LittleEndian::read_u16(&source.read_at(0, COUNT_SIZE)?) as usize;
        let table_size = count * FIGHTING_RECORD_SIZE;
        let table_end = (COUNT_SIZE + table_size) as u64;
        debug!(count, "read fighting table");
        check_bounds("table", COUNT_SIZE as u64, table_size as u64, len)?;

        let mut table = source.read_at(COUNT_SIZE as u64, table_size)?;
        obfuscate_table(&mut table);

        let mut table = Cursor::new(table);
        (0..count)
            .map(|_| -> Result<Entry> {
                let record = FightingRecord::read(&mut table)?;
                let name = decode_name(&record.name)?.replace('\\', "/");

                let offset = record.offset as u64;
                if offset < table_end {
                    return Err(Error::FormatError(FormatError::Table(format!(
                        "payload of {name} overlaps the table"
                    ))));
                }
                check_bounds(&name, offset, record.packed_size as u64, len)?;

                trace!(%name, offset, size = record.size, "read record");
                Ok(Entry {
                    name,
                    offset,
                    size: record.size as u64,
                    compression: Some(CompressedMeta {
                        compressed_size: record.packed_size as u64,
                        method: CompressionMethod::Zlib,
                        key: 0,
                        checksum: None,
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
        let count = u16::try_from(files.len()).map_err(|_| {
            Error::FormatError(FormatError::Table(format!(
                "{} entries do not fit a 16 bit count",
                files.len()
            )))
        })?;

        let mut offset = (COUNT_SIZE + files.len() * FIGHTING_RECORD_SIZE) as u64;
        let mut table = Cursor::new(Vec::with_capacity(files.len() * FIGHTING_RECORD_SIZE));
        let mut entries = Vec::with_capacity(files.len());
        let mut payload = Vec::new();

        for file in files {
            let encoded = encode_name(&file.name.replace('/', "\\"), NAME_LIMIT)?;
            let packed = compress(&file.data, CompressionMethod::Zlib)?;

            FightingRecord {
                name: name_field(&encoded),
                size: to_u32(file.data.len() as u64)?,
                offset: to_u32(offset)?,
                packed_size: to_u32(packed.len() as u64)?,
            }
            .write(&mut table)?;

            entries.push(Entry {
                name: file.name.clone(),
                offset,
                size: file.data.len() as u64,
                compression: Some(CompressedMeta {
                    compressed_size: packed.len() as u64,
                    method: CompressionMethod::Zlib,
                    key: 0,
                    checksum: None,
                }),
            });
            offset += packed.len() as u64;
            payload.extend_from_slice(&packed);
        }

        let mut table = table.into_inner();
        obfuscate_table(&mut table);

        writer.write_all(&count.to_le_bytes())?;
        writer.write_all(&table)?;
        writer.write_all(&payload)?;

        Ok(entries)
    }

    fn size_rule(&self) -> SizeRule {
        SizeRule::Exact
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::compression::decompress;
    use crate::container::Container;
    use crate::error::{Error, FormatError, Result};
    use crate::fighting::{obfuscate_table, Fighting};
    use crate::game::GameId;
    use crate::write::{CreateOptions, InputFile};

    #[test]
    fn keystream_prefix() {
        let mut table = [0u8; 6];
        obfuscate_table(&mut table);
        assert_eq!(table, [0x64, 0xC8, 0x79, 0x77, 0xC2, 0x5A]);
        obfuscate_table(&mut table);
        assert_eq!(table, [0u8; 6]);
    }

    #[traced_test]
    #[test]
    fn round_trip_with_directories() -> Result<()> {
        let files = vec![
            InputFile::new("data/character/reimu/stand.cv2", vec![0x20; 4000]),
            InputFile::new("data/csv/system/cardlist.cv1", b"100,1,2\n".repeat(40)),
        ];

        let mut archive = Vec::new();
        let written =
            Fighting.write(GameId::Th075, &mut archive, &files, &CreateOptions::default())?;
        assert_eq!(&archive[..2], &[0x02, 0x00]);

        // names are stored with backslashes
        let mut record = archive[2..2 + 112].to_vec();
        obfuscate_table(&mut record);
        assert_eq!(&record[..15], b"data\\character\\");

        let read = Fighting.read_table(&mut Cursor::new(&archive))?;
        assert_eq!(read, written);
        assert_eq!(read[0].name, "data/character/reimu/stand.cv2");

        for (entry, file) in read.iter().zip(&files) {
            let stored = archive[entry.offset as usize..entry.end() as usize].to_vec();
            assert_eq!(decompress(entry, stored)?, file.data);
        }
        Ok(())
    }

    #[test]
    fn reject_inconsistent_tables() {
        // claims 3 records but holds none
        assert!(matches!(
            Fighting.read_table(&mut Cursor::new(vec![0x03, 0x00, 0x00])),
            Err(Error::FormatError(FormatError::OutOfBounds { .. }))
        ));

        let long_name = [InputFile::new("a/".repeat(50), vec![1])];
        assert!(matches!(
            Fighting.write(GameId::Th075, &mut Vec::new(), &long_name, &CreateOptions::default()),
            Err(Error::FormatError(FormatError::NameTooLong { max: 99, .. }))
        ));
    }

    #[test]
    fn reject_payload_inside_table() -> Result<()> {
        let files = [InputFile::new("a.txt", b"hello".to_vec())];
        let mut archive = Vec::new();
        Fighting.write(GameId::Th075, &mut archive, &files, &CreateOptions::default())?;

        // point the payload at the table itself
        let mut table = archive[2..2 + 112].to_vec();
        obfuscate_table(&mut table);
        table[104..108].copy_from_slice(&2u32.to_le_bytes());
        obfuscate_table(&mut table);
        archive[2..2 + 112].copy_from_slice(&table);

        assert!(matches!(
            Fighting.read_table(&mut Cursor::new(&archive)),
            Err(Error::FormatError(FormatError::Table(_)))
        ));
        Ok(())
    }
}
