//! Types for reading archives
//!

use std::fmt::{self, Debug};
use std::fs;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::compression::decompress;
use crate::entry::{Entry, SizeRule};
use crate::error::{Error, FileNotFoundError, FormatError, Result};
use crate::game::GameId;
use crate::io::ByteSource;

/// Parsed table of an archive, shared by every handle onto it
#[derive(Debug)]
pub(crate) struct Shared {
    game: GameId,
    entries: IndexMap<String, Entry>,
    size_rule: SizeRule,
}

impl Shared {
    /// Read and validate the table of an archive for `game`
    pub(crate) fn read(game: GameId, source: &mut dyn ByteSource) -> Result<Shared> {
        let container = game.format().container();
        let table = container.read_table(source)?;

        let mut entries = IndexMap::with_capacity(table.len());
        for entry in table {
            if entries.contains_key(&entry.name) {
                return Err(Error::FormatError(FormatError::DuplicateName(entry.name)));
            }
            entries.insert(entry.name.clone(), entry);
        }
        debug!(%game, format = %game.format(), count = entries.len(), "read archive table");

        Ok(Shared {
            game,
            entries,
            size_rule: container.size_rule(),
        })
    }

    /// Decode the stored bytes of `entry` and check them against its recorded size
    pub(crate) fn decode(&self, entry: &Entry, stored: Vec<u8>) -> Result<Vec<u8>> {
        let data = decompress(entry, stored)?;
        self.size_rule.check(entry, data.len())?;
        if data.len() as u64 > entry.size {
            warn!(
                name = %entry.name,
                recorded = entry.size,
                decoded = data.len(),
                "entry decoded to more bytes than recorded"
            );
        }
        Ok(data)
    }

    pub(crate) fn game(&self) -> GameId {
        self.game
    }

    pub(crate) fn entries(&self) -> &IndexMap<String, Entry> {
        &self.entries
    }

    pub(crate) fn by_name(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::FileNotFound(FileNotFoundError::Name(name.to_owned())))
    }

    pub(crate) fn by_index(&self, index: usize) -> Result<&Entry> {
        self.entries
            .get_index(index)
            .map(|(_, entry)| entry)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))
    }
}

/// Path below `dir` an entry called `name` is extracted to
///
/// Absolute names and names leaving `dir` are refused.
pub(crate) fn safe_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut path = dir.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return Err(Error::FormatError(FormatError::UnsafePath(name.to_owned()))),
        }
    }
    if path == dir {
        return Err(Error::FormatError(FormatError::UnsafePath(name.to_owned())));
    }
    Ok(path)
}

/// Archive reader
///
/// The table is parsed once by [`Archive::open`]; payloads are read and decoded on
/// demand.
///
/// ```no_run
/// use std::fs::File;
///
/// fn list_archive_contents(path: &str) -> th_dat::error::Result<()> {
///     let mut archive = th_dat::Archive::open(th_dat::GameId::Th06, File::open(path)?)?;
///
///     for i in 0..archive.len() {
///         let data = archive.extract_index(i)?;
///         println!("{}: {} bytes", archive.by_index(i)?.name, data.len());
///     }
///
///     Ok(())
/// }
/// ```
pub struct Archive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R> Debug for Archive<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Archive")
            .field("game", &self.shared.game)
            .field("entries", &self.shared.entries.len())
            .finish()
    }
}

impl<R> Archive<R> {
    /// Title the archive was opened for
    pub fn game(&self) -> GameId {
        self.shared.game()
    }

    /// Number of entries contained in this archive
    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in the order of the on-disk table
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.shared.entries().values()
    }

    /// Returns an iterator over all the file names in this archive
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.entries().keys().map(|name| name.as_str())
    }

    /// Get the index of an entry by name, if it's present
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.entries().get_index_of(name)
    }

    /// Search for an entry by name
    pub fn by_name(&self, name: &str) -> Result<&Entry> {
        self.shared.by_name(name)
    }

    /// Get an entry by index
    pub fn by_index(&self, index: usize) -> Result<&Entry> {
        self.shared.by_index(index)
    }

    /// Total size of the entries once decoded, as recorded in the table
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for entry in self.entries() {
            total = total.checked_add(entry.size as u128)?;
        }
        Some(total)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Read the table of an archive of `game`
    ///
    /// Fails with a [`FormatError`] when the stream does not hold an archive in the
    /// layout `game` uses.
    #[instrument(skip(reader), err)]
    pub fn open(game: GameId, mut reader: R) -> Result<Archive<R>> {
        let shared = Shared::read(game, &mut reader)?;
        Ok(Archive {
            reader,
            shared: shared.into(),
        })
    }

    /// Read and decode the content of `entry`
    #[instrument(skip_all, fields(name = %entry.name), err)]
    pub fn extract(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let stored = self
            .reader
            .read_at(entry.offset, entry.stored_size() as usize)?;
        self.shared.decode(entry, stored)
    }

    /// Read and decode the content of the entry at `index`
    pub fn extract_index(&mut self, index: usize) -> Result<Vec<u8>> {
        let shared = Arc::clone(&self.shared);
        self.extract(shared.by_index(index)?)
    }

    /// Read and decode the content of the entry called `name`
    pub fn extract_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let shared = Arc::clone(&self.shared);
        self.extract(shared.by_name(name)?)
    }

    /// Extract every entry below `dir`, creating directories as needed
    #[instrument(skip(self, dir), fields(dir = %dir.as_ref().display()), err)]
    pub fn extract_to(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let shared = Arc::clone(&self.shared);

        for entry in shared.entries().values() {
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
