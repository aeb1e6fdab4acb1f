//! `.pal` palettes used by the 8 bits-per-pixel `.cv2` images.
//!
//! On disk a palette is a depth byte (`16`) followed by 256 little-endian ARGB1555
//! colors. Expanded, it is 256 entries of 4 bytes in B, G, R, A order, the layout
//! consumed by [`crate::Cv2`].

use byteorder::{ByteOrder, LittleEndian};
use derive_more::Deref;
use tracing::instrument;

use crate::codec::Codec;
use crate::error::{Error, FormatError, Result};

/// Number of colors in a palette
pub const COLORS: usize = 256;

/// Size of a palette once expanded to 32 bits per color
pub const EXPANDED_SIZE: usize = COLORS * 4;

/// Size of a palette as stored on disk
pub const PACKED_SIZE: usize = 1 + COLORS * 2;

const DEPTH: u8 = 16;

/// A full 32 bits-per-color palette table, 1024 bytes long
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct ColorTable(Vec<u8>);

impl ColorTable {
    /// Wrap an expanded palette, checking its length
    pub fn new(colors: Vec<u8>) -> Result<Self> {
        if colors.len() != EXPANDED_SIZE {
            return Err(Error::FormatError(FormatError::Length {
                expected: EXPANDED_SIZE,
                actual: colors.len(),
            }));
        }
        Ok(Self(colors))
    }

    /// The B, G, R, A bytes of one color
    pub fn color(&self, index: u8) -> [u8; 4] {
        let start = index as usize * 4;
        [
            self.0[start],
            self.0[start + 1],
            self.0[start + 2],
            self.0[start + 3],
        ]
    }

    /// A palette mapping every index to the gray level of the same value
    pub fn grayscale() -> Self {
        Self(
            (0..COLORS)
                .flat_map(|i| [i as u8, i as u8, i as u8, 0xFF])
                .collect(),
        )
    }
}

#[inline]
fn expand5(value: u16) -> u8 {
    let value = (value & 0x1F) as u8;
    (value << 3) | (value >> 2)
}

#[inline]
fn compact5(value: u8) -> Option<u16> {
    let packed = (value >> 3) as u16;
    (expand5(packed) == value).then_some(packed)
}

/// Codec for `.pal` files
#[derive(Debug, Default, Clone, Copy)]
pub struct Palette;

impl Palette {
    /// Expand a `.pal` file into a [`ColorTable`]
    #[instrument(skip_all, err)]
    pub fn expand(input: &[u8]) -> Result<ColorTable> {
        if input.len() != PACKED_SIZE {
            return Err(Error::FormatError(FormatError::Length {
                expected: PACKED_SIZE,
                actual: input.len(),
            }));
        }
        if input[0] != DEPTH {
            return Err(Error::FormatError(FormatError::Field {
                field: "palette depth",
                value: input[0] as u32,
            }));
        }

        let colors = input[1..]
            .chunks_exact(2)
            .flat_map(|raw| {
                let color = LittleEndian::read_u16(raw);
                let alpha = if color & 0x8000 != 0 { 0xFF } else { 0x00 };
                [expand5(color), expand5(color >> 5), expand5(color >> 10), alpha]
            })
            .collect();

        Ok(ColorTable(colors))
    }

    /// Pack a [`ColorTable`] back into the `.pal` layout
    #[instrument(skip_all, err)]
    pub fn compact(table: &ColorTable) -> Result<Vec<u8>> {
        let mut output = vec![0u8; PACKED_SIZE];
        output[0] = DEPTH;

        for (index, (bgra, raw)) in table
            .chunks_exact(4)
            .zip(output[1..].chunks_exact_mut(2))
            .enumerate()
        {
            let alpha = match bgra[3] {
                0x00 => 0,
                0xFF => 0x8000,
                _ => return Err(Error::FormatError(FormatError::PaletteEntry(index))),
            };
            let (Some(b), Some(g), Some(r)) =
                (compact5(bgra[0]), compact5(bgra[1]), compact5(bgra[2]))
            else {
                return Err(Error::FormatError(FormatError::PaletteEntry(index)));
            };
            LittleEndian::write_u16(raw, alpha | (r << 10) | (g << 5) | b);
        }

        Ok(output)
    }
}

impl Codec for Palette {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(Palette::expand(input)?.0)
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        Palette::compact(&ColorTable::new(input.to_vec())?)
    }
}
