//! This library handles reading from and creating the **DAT** archives used by the
//! *Touhou Project* games.
//!
//! # Archive Formats
//!
//! Nearly every release changed how its archives are laid out, so the layout is picked
//! through the [`GameId`] an archive is opened or created for.
//!
//! | Game      | Layout              | Compression     | Recorded size |
//! |-----------|---------------------|-----------------|---------------|
//! | `th01`    | executable-embedded | RLE or stored   | lower bound   |
//! | `th02`    | PC-98 rev. 1        | RLE or stored   | lower bound   |
//! | `th03-05` | PC-98 rev. 2        | RLE or stored   | lower bound   |
//! | `th06`    | PBG3                | LZSS            | exact         |
//! | `th075`   | fighting            | zlib            | exact         |
//!
//! Fixed-width integers are little-endian and every name is stored as Shift-JIS.
//!
//! ## PC-98
//!
//! Each entry has a 32 byte record:
//!
//! | Offset (bytes) | Field       | Description                                          |
//! |----------------|-------------|------------------------------------------------------|
//! | 0x0000         | Magic       | 2 bytes: `0xF388` RLE packed, `0x9595` stored        |
//! | 0x0002         | Key         | 1 byte: XOR key of the payload                       |
//! | 0x0003         | Name        | 13 bytes: NUL padded, every byte XORed with `0xFF`   |
//! | 0x0010         | Packed Size | 2 bytes: size of the payload in the archive          |
//! | 0x0012         | Size        | 2 bytes: minimum size of the decoded payload         |
//! | 0x0014         | Offset      | 4 bytes: position of the payload                     |
//! | 0x0018         | Reserved    | 8 bytes                                              |
//!
//! The first revision starts with the records and closes the table with an all zero
//! record. The second revision puts a 16 byte header (`table size`, `version = 2`,
//! `count`, `table key`) in front of the table and ciphers it with
//! `plain = cipher ^ key; key -= cipher`.
//!
//! ## PBG3
//!
//! | Offset (bytes) | Field        | Description                                |
//! |----------------|--------------|--------------------------------------------|
//! | 0x0000         | Magic number | 4 bytes: "PBG3"                            |
//! | 0x0004         | Record Count | packed integer: number of entries          |
//! |                | Table Offset | packed integer: position of the table      |
//!
//! Unlike every other layout, the integers of the header and the table are bit-packed,
//! most significant bit first: 2 bits holding the byte count minus one, then the bytes.
//! The header is padded to 13 bytes and the LZSS payloads follow it. Each record holds
//! two unknown integers, the wrapping byte sum of the packed payload, the payload
//! offset and the decoded size, followed by a NUL terminated name. Records are not
//! byte aligned, and a payload runs up to the next one.
//!
//! ## Fighting
//!
//! A 2 byte entry count followed by 112 byte records (`name[100]`, size, offset, packed
//! size) and the zlib payloads. The records are XORed with a keystream starting at
//! `0x64` and names use `\` between directories.
//!
//! ## Executable-embedded
//!
//! The archive is appended to an `MZ` executable. A 16 byte trailer at the end of the
//! file gives the table offset, the entry count, the length of the appended region and
//! the signature "ZCOM". Offsets are relative to the start of the appended region.
//!
//! ## Voice banks
//!
//! [`WaveArchive`] reads the uncompressed voice banks: a 4 byte count, 40 byte records
//! (`name[32]`, offset, size) and the payloads.
//!
//! # Example
//!
//! ```
//! # fn doit() -> th_dat::error::Result<()>
//! # {
//! use std::io::Cursor;
//! use th_dat::{write_archive, Archive, CreateOptions, GameId, InputFile};
//!
//! let files = [InputFile::new("music.txt", b"Eastern Wonderland".to_vec())];
//! let image = write_archive(GameId::Th02, Vec::new(), &files, &CreateOptions::default())?;
//!
//! let mut archive = Archive::open(GameId::Th02, Cursor::new(image))?;
//! assert_eq!(archive.extract_name("music.txt")?, b"Eastern Wonderland");
//! # Ok(())
//! # }
//! # doit().unwrap();
//! ```

#[cfg(feature = "tokio")]
pub mod asynchronous;
mod compression;
pub mod container;
pub mod embedded;
pub mod entry;
pub mod error;
pub mod fighting;
pub mod game;
pub mod io;
mod lzss;
pub mod pbg;
pub mod pc98;
pub mod read;
mod rle;
pub mod types;
pub mod wave;
pub mod write;

#[cfg(feature = "tokio")]
pub use asynchronous::{create_async, open_async, AsyncArchive};
pub use container::Container;
pub use entry::{CompressedMeta, CompressionMethod, Entry, SizeRule};
pub use game::{Format, GameId};
pub use read::Archive;
pub use wave::{WaveArchive, WaveArchiveWriter};
pub use write::{create, write_archive, CreateOptions, CreateSource, InputFile};
