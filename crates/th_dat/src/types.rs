//! Base types for the on-disk structures of every archive layout.
//!
//! All data is stored in little endian format.

use binrw::{BinRead, BinWrite};

/// Size of a [`Pc98Record`]
pub const PC98_RECORD_SIZE: usize = 32;

/// Size of a [`Pc98Header`]
pub const PC98_HEADER_SIZE: usize = 16;

/// Entry of a PC-98 archive table
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct Pc98Record {
    /// `0xF388` for RLE packed entries, `0x9595` for stored ones, `0` ends the table
    pub magic: u16,

    /// Key the payload bytes are XORed with
    pub key: u8,

    /// NUL padded name with every byte XORed with `0xFF`
    pub name: [u8; 13],

    /// Size of the payload in the archive
    pub packed_size: u16,

    /// Minimum size of the decoded payload
    pub size: u16,

    /// Offset to the payload from the start of the file
    pub offset: u32,

    #[allow(dead_code)]
    pub reserved: [u32; 2],
}

/// Header in front of the ciphered table of later PC-98 archives
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct Pc98Header {
    /// Size of the record table in bytes
    pub table_size: u16,

    /// Always `2`
    pub version: u16,

    /// Number of records in the table
    pub count: u16,

    /// Initial key of the table cipher
    pub table_key: u8,

    #[allow(dead_code)]
    pub reserved: [u8; 9],
}

/// Size of a [`FightingRecord`]
pub const FIGHTING_RECORD_SIZE: usize = 112;

/// Entry of a fighting game archive table
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct FightingRecord {
    /// NUL padded Shift-JIS name using `\` between directories
    pub name: [u8; 100],

    /// The size of the data for this record before compression
    pub size: u32,

    /// The offset to the data for this record from the start of the file
    pub offset: u32,

    /// The size of this record's data after compression
    pub packed_size: u32,
}

/// Size of an [`EmbeddedRecord`]
pub const EMBEDDED_RECORD_SIZE: usize = 32;

/// Size of an [`EmbeddedTrailer`]
pub const EMBEDDED_TRAILER_SIZE: usize = 16;

/// Entry of a table appended to an executable
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct EmbeddedRecord {
    /// NUL padded Shift-JIS name
    pub name: [u8; 16],

    /// Offset to the payload from the start of the appended region
    pub offset: u32,

    /// Minimum size of the decoded payload
    pub size: u32,

    /// Size of the payload in the archive
    pub packed_size: u32,

    /// `0` stored, `1` RLE packed
    pub method: u32,
}

/// Last 16 bytes of an executable carrying an archive
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct EmbeddedTrailer {
    /// Offset to the table from the start of the appended region
    pub table_offset: u32,

    /// The number of records stored in the table
    pub count: u32,

    /// Length of the appended region, trailer included
    pub region_length: u32,

    /// Always "ZCOM"
    pub signature: [u8; 4],
}

/// Size of a [`WaveRecord`]
pub const WAVE_RECORD_SIZE: usize = 40;

/// Entry of a voice bank table
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct WaveRecord {
    /// NUL padded Shift-JIS name
    pub name: [u8; 32],

    /// The offset to the data for this record from the start of the file
    pub offset: u32,

    /// The size of the data for this record
    pub size: u32,
}
