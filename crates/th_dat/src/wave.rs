//! Flat voice banks.
//!
//! A `u32` entry count, one 40 byte record per entry and the payloads. Payloads are
//! never compressed. Banks are written in one pass: the names are declared up front,
//! payloads are appended in that order, and the table is filled in when the bank is
//! sealed.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::{BinRead, BinWrite};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use indexmap::IndexMap;
use tracing::{debug, info, instrument, trace};

use crate::container::{check_bounds, decode_name, encode_name, name_field, to_u32};
use crate::entry::Entry;
use crate::error::{Error, FileNotFoundError, FormatError, Result};
use crate::io::ByteSource;
use crate::read::safe_path;
use crate::types::{WaveRecord, WAVE_RECORD_SIZE};
use crate::write::InputFile;

const COUNT_SIZE: usize = 4;
const NAME_LIMIT: usize = 31;

/// Voice bank reader
#[derive(Debug)]
pub struct WaveArchive<R> {
    reader: R,
    entries: IndexMap<String, Entry>,
}

impl<R> WaveArchive<R> {
    /// Number of entries contained in this bank
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this bank contains no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order of the on-disk table
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Search for an entry by name
    pub fn by_name(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::FileNotFound(FileNotFoundError::Name(name.to_owned())))
    }

    /// Unwrap and return the inner reader object
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> WaveArchive<R> {
    /// Read the table of a voice bank
    #[instrument(skip(reader), err)]
    pub fn open(mut reader: R) -> Result<WaveArchive<R>> {
        let len = ByteSource::stream_len(&mut reader)?;
        if len < COUNT_SIZE as u64 {
            return Err(Error::FormatError(FormatError::Table(
                "bank is shorter than its entry count".into(),
            )));
        }

        let count = LittleEndian::read_u32(&reader.read_at(0, COUNT_SIZE)?) as u64;
        let table_size = count * WAVE_RECORD_SIZE as u64;
        let table_end = COUNT_SIZE as u64 + table_size;
        check_bounds("table", COUNT_SIZE as u64, table_size, len)?;
        debug!(count, "read wave table");

        let mut table = Cursor::new(reader.read_at(COUNT_SIZE as u64, table_size as usize)?);
        let mut entries = IndexMap::with_capacity(count as usize);
        for _ in 0..count {
            let record = WaveRecord::read(&mut table)?;
            let name = decode_name(&record.name)?;

            let offset = record.offset as u64;
            if offset < table_end {
                return Err(Error::FormatError(FormatError::Table(format!(
                    "payload of {name} overlaps the table"
                ))));
            }
            check_bounds(&name, offset, record.size as u64, len)?;
            if entries.contains_key(&name) {
                return Err(Error::FormatError(FormatError::DuplicateName(name)));
            }

            trace!(%name, offset, size = record.size, "read record");
            entries.insert(
                name.clone(),
                Entry {
                    name,
                    offset,
                    size: record.size as u64,
                    compression: None,
                },
            );
        }

        Ok(WaveArchive { reader, entries })
    }

    /// Copy the payload of `entry` out of the bank
    pub fn extract(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        Ok(self.reader.read_at(entry.offset, entry.size as usize)?)
    }

    /// Extract every entry below `dir`
    #[instrument(skip(self, dir), fields(dir = %dir.as_ref().display()), err)]
    pub fn extract_to(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let entries: Vec<Entry> = self.entries.values().cloned().collect();

        for entry in &entries {
            let path = safe_path(dir, &entry.name)?;
            let data = self.extract(entry)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &data)?;
            info!(name = %entry.name, size = data.len(), "extracted entry");
        }
        Ok(())
    }
}

impl WaveArchive<File> {
    /// Write a bank at `path` holding `files` in order
    ///
    /// `declared_count` must match the number of files.
    #[instrument(skip(path, files), fields(path = %path.as_ref().display(), count = files.len()), err)]
    pub fn create(path: impl AsRef<Path>, files: &[InputFile], declared_count: usize) -> Result<()> {
        if declared_count != files.len() {
            return Err(Error::FormatError(FormatError::CountMismatch {
                declared: declared_count,
                actual: files.len(),
            }));
        }

        let output = BufWriter::new(File::create(path.as_ref())?);
        let mut writer = WaveArchiveWriter::new(output, files.iter().map(|file| &file.name))?;
        for file in files {
            writer.pack(&file.name, &file.data)?;
        }
        writer.seal()
    }
}

/// Progress of a [`WaveArchiveWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Names are fixed, nothing has been written
    Declared,
    /// Payloads are being appended
    Packing,
    /// The table has been written
    Sealed,
}

/// Voice bank generator
///
/// ```
/// # fn doit() -> th_dat::error::Result<()>
/// # {
/// use std::io::Cursor;
/// use th_dat::wave::{WaveArchive, WaveArchiveWriter};
///
/// let mut writer = WaveArchiveWriter::new(Cursor::new(Vec::new()), ["001.wav", "002.wav"])?;
/// writer.pack("001.wav", b"RIFF")?;
/// writer.pack("002.wav", b"RIFX")?;
/// writer.seal()?;
///
/// let mut bank = WaveArchive::open(writer.into_inner())?;
/// let entry = bank.by_name("002.wav")?.clone();
/// assert_eq!(bank.extract(&entry)?, b"RIFX");
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug)]
pub struct WaveArchiveWriter<W: Write + Seek> {
    inner: W,
    names: Vec<String>,
    records: Vec<WaveRecord>,
    state: WriterState,
    offset: u64,
}

impl<W: Write + Seek> WaveArchiveWriter<W> {
    /// Declare the names of every entry, in the order they will be packed
    ///
    /// The bank starts at the current beginning of `inner`.
    pub fn new<I, S>(inner: W, names: I) -> Result<WaveArchiveWriter<W>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            encode_name(name, NAME_LIMIT)?;
            if !seen.insert(name.as_str()) {
                return Err(Error::FormatError(FormatError::DuplicateName(name.clone())));
            }
        }

        Ok(WaveArchiveWriter {
            inner,
            records: Vec::with_capacity(names.len()),
            offset: (COUNT_SIZE + names.len() * WAVE_RECORD_SIZE) as u64,
            names,
            state: WriterState::Declared,
        })
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Append the payload of the next declared entry
    #[instrument(skip(self, payload), fields(size = payload.len()), err)]
    pub fn pack(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        if self.state == WriterState::Sealed {
            return Err(Error::FormatError(FormatError::Sealed));
        }

        let Some(expected) = self.names.get(self.records.len()) else {
            return Err(Error::FormatError(FormatError::Undeclared(name.to_owned())));
        };
        if expected != name {
            return Err(Error::FormatError(if self.names.iter().any(|n| n == name) {
                FormatError::OutOfOrder {
                    expected: expected.clone(),
                    actual: name.to_owned(),
                }
            } else {
                FormatError::Undeclared(name.to_owned())
            }));
        }
        if payload.is_empty() {
            return Err(Error::FormatError(FormatError::EmptyFile(name.to_owned())));
        }

        let record = WaveRecord {
            name: name_field(&encode_name(name, NAME_LIMIT)?),
            offset: to_u32(self.offset)?,
            size: to_u32(payload.len() as u64)?,
        };
        to_u32(self.offset + payload.len() as u64)?;

        if self.state == WriterState::Declared {
            // zeroed table, filled in by seal
            self.inner.write_all(&vec![0u8; self.offset as usize])?;
            self.state = WriterState::Packing;
        }
        self.inner.write_all(payload)?;

        trace!(offset = self.offset, "packed entry");
        self.offset += payload.len() as u64;
        self.records.push(record);
        Ok(())
    }

    /// Write the table once every declared entry is packed
    #[instrument(skip(self), err)]
    pub fn seal(&mut self) -> Result<()> {
        if self.state == WriterState::Sealed {
            return Err(Error::FormatError(FormatError::Sealed));
        }
        if self.records.len() != self.names.len() {
            return Err(Error::FormatError(FormatError::Incomplete {
                declared: self.names.len(),
                packed: self.records.len(),
            }));
        }

        let mut table = Cursor::new(Vec::with_capacity(self.offset as usize));
        table.write_u32::<LittleEndian>(to_u32(self.records.len() as u64)?)?;
        for record in &self.records {
            record.write(&mut table)?;
        }

        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.write_all(table.get_ref())?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;

        debug!(count = self.records.len(), "sealed wave bank");
        self.state = WriterState::Sealed;
        Ok(())
    }

    /// Unwrap and return the inner writer object
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::{Error, FormatError, Result};
    use crate::wave::{WaveArchive, WaveArchiveWriter, WriterState};

    #[rustfmt::skip]
    const BANK: [u8; 48] = [
        // Count
        0x01, 0x00, 0x00, 0x00,
        // "a.wav"
        0x61, 0x2E, 0x77, 0x61, 0x76, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x2C, 0x00, 0x00, 0x00,
        0x04, 0x00, 0x00, 0x00,
        // Payload
        0x52, 0x49, 0x46, 0x46,
    ];

    #[test]
    fn read_bank() -> Result<()> {
        let mut bank = WaveArchive::open(Cursor::new(BANK))?;
        assert_eq!(bank.len(), 1);

        let entry = bank.by_name("a.wav")?.clone();
        assert_eq!(entry.offset, 0x2C);
        assert_eq!(entry.compression, None);
        assert_eq!(bank.extract(&entry)?, b"RIFF");
        Ok(())
    }

    #[traced_test]
    #[test]
    fn write_bank() -> Result<()> {
        let mut writer = WaveArchiveWriter::new(Cursor::new(Vec::new()), ["a.wav"])?;
        assert_eq!(writer.state(), WriterState::Declared);
        assert!(writer.inner.get_ref().is_empty());

        writer.pack("a.wav", b"RIFF")?;
        assert_eq!(writer.state(), WriterState::Packing);
        writer.seal()?;
        assert_eq!(writer.state(), WriterState::Sealed);

        assert_eq!(writer.into_inner().into_inner(), BANK);
        Ok(())
    }

    #[test]
    fn reject_misuse() -> Result<()> {
        let mut writer =
            WaveArchiveWriter::new(Cursor::new(Vec::new()), ["01.wav", "02.wav"])?;

        assert!(matches!(
            writer.pack("02.wav", b"data"),
            Err(Error::FormatError(FormatError::OutOfOrder { .. }))
        ));
        assert!(matches!(
            writer.pack("03.wav", b"data"),
            Err(Error::FormatError(FormatError::Undeclared(_)))
        ));
        assert!(matches!(
            writer.pack("01.wav", b""),
            Err(Error::FormatError(FormatError::EmptyFile(_)))
        ));

        writer.pack("01.wav", b"data")?;
        assert!(matches!(
            writer.seal(),
            Err(Error::FormatError(FormatError::Incomplete { declared: 2, packed: 1 }))
        ));

        writer.pack("02.wav", b"data")?;
        assert!(matches!(
            writer.pack("01.wav", b"data"),
            Err(Error::FormatError(FormatError::Undeclared(_)))
        ));
        writer.seal()?;
        assert!(matches!(
            writer.pack("02.wav", b"data"),
            Err(Error::FormatError(FormatError::Sealed))
        ));
        assert!(matches!(writer.seal(), Err(Error::FormatError(FormatError::Sealed))));
        Ok(())
    }

    #[test]
    fn incomplete_bank_has_no_table() -> Result<()> {
        let mut writer = WaveArchiveWriter::new(Cursor::new(Vec::new()), ["01.wav", "02.wav"])?;
        writer.pack("01.wav", &[0x7F; 8])?;
        assert!(writer.seal().is_err());

        let image = writer.into_inner().into_inner();
        assert_eq!(&image[..84], &[0u8; 84]);
        Ok(())
    }

    #[test]
    fn reject_duplicate_declarations() {
        assert!(matches!(
            WaveArchiveWriter::new(Cursor::new(Vec::new()), ["01.wav", "01.wav"]),
            Err(Error::FormatError(FormatError::DuplicateName(_)))
        ));
    }
}
