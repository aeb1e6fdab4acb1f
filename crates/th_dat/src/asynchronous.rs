//! Archive access on top of tokio.
//!
//! Tables are parsed and payloads decoded by the same code as [`crate::Archive`]; only
//! the file and stream I/O is awaited.
//!
//! The table parsers read through [`ByteSource`], which cannot await. An asynchronous
//! open therefore runs the parser over the byte ranges fetched so far. When it asks for
//! a range that is missing, the range is fetched and the parse starts over, until it
//! completes without a miss. Every fetch reads ahead, so a table is usually complete
//! after two or three rounds.

use std::fmt::{self, Debug};
use std::io::{self, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt as _, AsyncWriteExt as _};
use tracing::{debug, info, instrument, trace};

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::game::GameId;
use crate::io::ByteSource;
use crate::read::{safe_path, Shared};
use crate::write::{build_image, CreateOptions, CreateSource, InputFile};

/// Smallest number of bytes fetched for a missing range
const READ_AHEAD: u64 = 0x10000;

/// Read `len` bytes at `offset` from an asynchronous stream
async fn read_exact_at<R: AsyncRead + AsyncSeek + Unpin>(
    reader: &mut R,
    offset: u64,
    len: u64,
) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset)).await?;

    let mut buffer = Vec::new();
    reader.take(len).read_to_end(&mut buffer).await?;
    if buffer.len() as u64 != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "expected {len} bytes at {offset:#x}, stream ended after {}",
                buffer.len()
            ),
        ));
    }
    Ok(buffer)
}

/// Byte ranges of a stream fetched so far
///
/// A read outside of them records the range in `missing` and fails.
struct Fetched {
    len: u64,
    ranges: Vec<(u64, Vec<u8>)>,
    missing: Option<(u64, usize)>,
}

impl Fetched {
    fn new(len: u64) -> Self {
        Self {
            len,
            ranges: Vec::new(),
            missing: None,
        }
    }

    /// Fetch the missing range, and more up to [`READ_AHEAD`] bytes
    async fn fetch<R: AsyncRead + AsyncSeek + Unpin>(
        &mut self,
        reader: &mut R,
        offset: u64,
        len: usize,
    ) -> io::Result<()> {
        let len = (len as u64).max(READ_AHEAD).min(self.len - offset);
        let data = read_exact_at(reader, offset, len).await?;
        trace!(offset, len, "fetched table bytes");
        self.ranges.push((offset, data));
        Ok(())
    }
}

impl ByteSource for Fetched {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let end = offset.checked_add(len as u64).filter(|&end| end <= self.len);
        let Some(end) = end else {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {len} bytes at {offset:#x}, stream ends at {:#x}", self.len),
            ));
        };

        let cached = self.ranges.iter().find_map(|(start, data)| {
            let first = offset.checked_sub(*start)? as usize;
            (end - start <= data.len() as u64).then(|| data[first..first + len].to_vec())
        });
        cached.ok_or_else(|| {
            self.missing = Some((offset, len));
            io::Error::new(io::ErrorKind::WouldBlock, "range has not been fetched yet")
        })
    }

    fn stream_len(&mut self) -> io::Result<u64> {
        Ok(self.len)
    }
}

/// Archive reader over an asynchronous stream
pub struct AsyncArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl<R> Debug for AsyncArchive<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AsyncArchive")
            .field("game", &self.shared.game())
            .field("entries", &self.shared.entries().len())
            .finish()
    }
}

impl<R> AsyncArchive<R> {
    pub fn game(&self) -> GameId {
        self.shared.game()
    }

    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in the order of the on-disk table
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.shared.entries().values()
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.entries().keys().map(|name| name.as_str())
    }

    pub fn by_name(&self, name: &str) -> Result<&Entry> {
        self.shared.by_name(name)
    }

    pub fn by_index(&self, index: usize) -> Result<&Entry> {
        self.shared.by_index(index)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead + AsyncSeek + Unpin> AsyncArchive<R> {
    /// Read the table of an archive of `game`
    ///
    /// Only the byte ranges the table parser asks for are read, and payloads are read
    /// on demand afterwards.
    #[instrument(skip(reader), err)]
    pub async fn open(game: GameId, mut reader: R) -> Result<AsyncArchive<R>> {
        let len = reader.seek(SeekFrom::End(0)).await?;
        let mut source = Fetched::new(len);

        let shared = loop {
            match Shared::read(game, &mut source) {
                Ok(shared) => break shared,
                Err(error) => match source.missing.take() {
                    Some((offset, len)) => source.fetch(&mut reader, offset, len).await?,
                    None => return Err(error),
                },
            }
        };
        debug!(rounds = source.ranges.len() + 1, "parsed table");

        Ok(AsyncArchive {
            reader,
            shared: shared.into(),
        })
    }

    /// Read and decode the content of `entry`
    #[instrument(skip_all, fields(name = %entry.name), err)]
    pub async fn extract(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let stored = read_exact_at(&mut self.reader, entry.offset, entry.stored_size()).await?;
        self.shared.decode(entry, stored)
    }

    /// Extract every entry below `dir`, creating directories as needed
    #[instrument(skip(self, dir), fields(dir = %dir.as_ref().display()), err)]
    pub async fn extract_to(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let shared = Arc::clone(&self.shared);

        for entry in shared.entries().values() {
            let path = safe_path(dir, &entry.name)?;
            let data = self.extract(entry).await?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, &data).await?;
            info!(name = %entry.name, size = data.len(), "extracted entry");
        }
        Ok(())
    }
}

/// Open the archive of `game` at `path`
pub async fn open_async(game: GameId, path: impl AsRef<Path>) -> Result<AsyncArchive<File>> {
    let file = File::open(path.as_ref()).await?;
    AsyncArchive::open(game, file).await
}

/// Create an archive for `game` at `output` from the files of `source`
#[instrument(skip(output, options), fields(output = %output.as_ref().display()), err)]
pub async fn create_async(
    game: GameId,
    output: impl AsRef<Path>,
    source: &CreateSource,
    options: &CreateOptions,
) -> Result<()> {
    let listing = source.clone();
    let paths = tokio::task::spawn_blocking(move || listing.paths())
        .await
        .map_err(|error| Error::IOError(io::Error::other(error)))??;

    let mut files = Vec::with_capacity(paths.len());
    for (name, path) in paths {
        files.push(InputFile::new(name, fs::read(path).await?));
    }
    let image = build_image(game, &files, options)?;

    let mut output = File::create(output.as_ref()).await?;
    output.write_all(&image).await?;
    output.flush().await?;
    Ok(())
}
