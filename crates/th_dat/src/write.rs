//! Types for creating archives
//!

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use bon::Builder;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{Error, FormatError, Result};
use crate::game::GameId;

/// A file to be packed, named by its path inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Relative path using `/` between directories
    pub name: String,

    /// Content of the file
    pub data: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> InputFile {
        InputFile {
            name: name.into(),
            data,
        }
    }
}

/// Options for how an archive should be written
#[derive(Debug, Clone, Default, Builder)]
pub struct CreateOptions {
    /// Number of entries the caller expects to pack
    ///
    /// A mismatch with the actual inputs is logged and otherwise ignored.
    pub entry_count: Option<usize>,

    /// Executable the archive is appended to, for the layouts embedding one
    ///
    /// Must start with `MZ`. A minimal DOS program is used when this is not set.
    pub host_executable: Option<Vec<u8>>,
}

/// Where [`create`] takes its inputs from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateSource {
    /// Every file below a directory, named by its path relative to it
    Directory(PathBuf),

    /// Individual files, named by their file name
    Files(Vec<PathBuf>),
}

impl CreateSource {
    /// List `(name, path)` of every input, sorted the way they will be packed
    pub(crate) fn paths(&self) -> Result<Vec<(String, PathBuf)>> {
        match self {
            CreateSource::Directory(root) => WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) if entry.file_type().is_dir() => None,
                    Ok(entry) => Some(
                        entry_name(root, entry.path()).map(|name| (name, entry.into_path())),
                    ),
                    Err(error) => Some(Err(Error::IOError(io::Error::from(error)))),
                })
                .collect(),
            CreateSource::Files(paths) => paths
                .iter()
                .map(|path| -> Result<(String, PathBuf)> {
                    let name = path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .ok_or_else(|| {
                            Error::FormatError(FormatError::InvalidName(
                                path.display().to_string(),
                            ))
                        })?;
                    Ok((name.to_owned(), path.clone()))
                })
                .collect(),
        }
    }

    /// Read every input into memory
    pub fn collect(&self) -> Result<Vec<InputFile>> {
        self.paths()?
            .into_iter()
            .map(|(name, path)| -> Result<InputFile> {
                Ok(InputFile::new(name, std::fs::read(path)?))
            })
            .collect()
    }
}

/// Name of `path` relative to `root`, with `/` between directories
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let invalid = || Error::FormatError(FormatError::InvalidName(path.display().to_string()));
    let relative = path.strip_prefix(root).map_err(|_| invalid())?;

    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str().ok_or_else(invalid),
            _ => Err(invalid()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

/// Reject inputs no archive layout can hold
fn validate_inputs(files: &[InputFile]) -> Result<()> {
    let mut seen = HashSet::with_capacity(files.len());
    for file in files {
        if !seen.insert(file.name.as_str()) {
            return Err(Error::FormatError(FormatError::DuplicateName(
                file.name.clone(),
            )));
        }
        if file.data.is_empty() {
            return Err(Error::FormatError(FormatError::EmptyFile(file.name.clone())));
        }
    }
    Ok(())
}

/// Encode `files` into the complete image of an archive for `game`
pub(crate) fn build_image(
    game: GameId,
    files: &[InputFile],
    options: &CreateOptions,
) -> Result<Vec<u8>> {
    validate_inputs(files)?;
    if let Some(declared) = options.entry_count {
        if declared != files.len() {
            warn!(
                declared,
                actual = files.len(),
                "declared entry count does not match the inputs"
            );
        }
    }

    let mut image = Vec::new();
    let entries = game
        .format()
        .container()
        .write(game, &mut image, files, options)?;

    for entry in &entries {
        info!(
            name = %entry.name,
            size = entry.size,
            stored = entry.stored_size(),
            method = %entry.method(),
            "packed entry"
        );
    }
    Ok(image)
}

/// Write an archive for `game` holding `files`, returning the flushed writer
///
/// Nothing is written unless every input could be encoded.
///
/// ```
/// # fn doit() -> th_dat::error::Result<()>
/// # {
/// use th_dat::{write_archive, Archive, CreateOptions, GameId, InputFile};
///
/// let files = [InputFile::new("stage1.ecl", b"Embodiment".to_vec())];
/// let image = write_archive(GameId::Th06, Vec::new(), &files, &CreateOptions::default())?;
///
/// let mut archive = Archive::open(GameId::Th06, std::io::Cursor::new(image))?;
/// assert_eq!(archive.extract_index(0)?, b"Embodiment");
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[instrument(skip(writer, files, options), fields(count = files.len()), err)]
pub fn write_archive<W: Write>(
    game: GameId,
    mut writer: W,
    files: &[InputFile],
    options: &CreateOptions,
) -> Result<W> {
    let image = build_image(game, files, options)?;
    writer.write_all(&image)?;
    writer.flush()?;
    Ok(writer)
}

/// Create an archive for `game` at `output` from the files of `source`
#[instrument(skip(output, options), fields(output = %output.as_ref().display()), err)]
pub fn create(
    game: GameId,
    output: impl AsRef<Path>,
    source: &CreateSource,
    options: &CreateOptions,
) -> Result<()> {
    let files = source.collect()?;
    let image = build_image(game, &files, options)?;

    let mut output = BufWriter::new(File::create(output.as_ref())?);
    output.write_all(&image)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::{Error, FormatError, Result};
    use crate::game::GameId;
    use crate::write::{build_image, entry_name, write_archive, CreateOptions, InputFile};

    #[test]
    fn relative_names() -> Result<()> {
        let root = Path::new("/tmp/th075");
        assert_eq!(
            entry_name(root, &root.join("data").join("se").join("001.cv3"))?,
            "data/se/001.cv3"
        );
        assert!(entry_name(root, Path::new("/elsewhere/a.txt")).is_err());
        Ok(())
    }

    #[test]
    fn reject_duplicates_and_empty_files() {
        let options = CreateOptions::default();

        let duplicates = [
            InputFile::new("a.txt", vec![1]),
            InputFile::new("a.txt", vec![2]),
        ];
        assert!(matches!(
            build_image(GameId::Th06, &duplicates, &options),
            Err(Error::FormatError(FormatError::DuplicateName(name))) if name == "a.txt"
        ));

        let empty = [InputFile::new("empty.txt", Vec::new())];
        assert!(matches!(
            write_archive(GameId::Th075, Vec::new(), &empty, &options),
            Err(Error::FormatError(FormatError::EmptyFile(_)))
        ));
    }

    #[traced_test]
    #[test]
    fn declared_count_mismatch_is_tolerated() -> Result<()> {
        let files = [InputFile::new("demo.rpy", vec![0x55; 16])];
        let options = CreateOptions::builder().entry_count(3).build();

        let image = build_image(GameId::Th04, &files, &options)?;
        assert!(!image.is_empty());
        assert!(logs_contain("declared entry count does not match the inputs"));
        Ok(())
    }

    #[test]
    fn nothing_written_on_failure() {
        let files = [
            InputFile::new("ok.txt", vec![1, 2, 3]),
            InputFile::new("much_too_long_for_pc98.txt", vec![1, 2, 3]),
        ];
        let mut output = Vec::new();
        assert!(write_archive(GameId::Th05, &mut output, &files, &CreateOptions::default()).is_err());
        assert!(output.is_empty());
    }
}
