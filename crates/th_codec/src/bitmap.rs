//! Minimal Windows bitmap support, enough to hand decoded `.cv2` images to other tools
//! and to take edited ones back.

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, FormatError, Result};

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;

/// Uncompressed direct-color pixels, rows stored top to bottom without padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// 24 (B, G, R) or 32 (B, G, R, A)
    pub bits: u16,
    pub pixels: Vec<u8>,
}

type Headers = (u32, u32, i32, i32, u16, u32);

fn read_headers(reader: &mut Cursor<&[u8]>) -> io::Result<Headers> {
    let _file_size = reader.read_u32::<LittleEndian>()?;
    let _reserved = reader.read_u32::<LittleEndian>()?;
    let offset = reader.read_u32::<LittleEndian>()?;
    let info_size = reader.read_u32::<LittleEndian>()?;
    let width = reader.read_i32::<LittleEndian>()?;
    let height = reader.read_i32::<LittleEndian>()?;
    let _planes = reader.read_u16::<LittleEndian>()?;
    let bits = reader.read_u16::<LittleEndian>()?;
    let compression = reader.read_u32::<LittleEndian>()?;
    Ok((offset, info_size, width, height, bits, compression))
}

fn row_size(width: u32, bits: u16) -> usize {
    ((width as usize * bits as usize + 31) / 32) * 4
}

impl Bitmap {
    pub fn bytes_per_pixel(&self) -> usize {
        self.bits as usize / 8
    }

    /// Serialize as a top-down `BI_RGB` bitmap
    ///
    /// Images whose dimensions or size do not fit the signed 32 bit header fields are
    /// rejected.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let too_large = |field, value| Error::FormatError(FormatError::Field { field, value });

        let width = i32::try_from(self.width).map_err(|_| too_large("bitmap width", self.width))?;
        let height =
            i32::try_from(self.height).map_err(|_| too_large("bitmap height", self.height))?;
        let row = row_size(self.width, self.bits);
        let offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE;
        let image_size = row
            .checked_mul(self.height as usize)
            .and_then(|size| u32::try_from(size).ok())
            .ok_or_else(|| too_large("bitmap height", self.height))?;
        let file_size = offset
            .checked_add(image_size)
            .ok_or_else(|| too_large("bitmap height", self.height))?;

        let mut out = Cursor::new(Vec::with_capacity(file_size as usize));
        out.write_all(b"BM")?;
        out.write_u32::<LittleEndian>(file_size)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(offset)?;

        out.write_u32::<LittleEndian>(INFO_HEADER_SIZE)?;
        out.write_i32::<LittleEndian>(width)?;
        out.write_i32::<LittleEndian>(-height)?;
        out.write_u16::<LittleEndian>(1)?;
        out.write_u16::<LittleEndian>(self.bits)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(image_size)?;
        out.write_i32::<LittleEndian>(0)?;
        out.write_i32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;

        let packed = self.width as usize * self.bytes_per_pixel();
        let padding = vec![0u8; row - packed];
        for line in self.pixels.chunks_exact(packed.max(1)).take(self.height as usize) {
            out.write_all(line)?;
            out.write_all(&padding)?;
        }

        Ok(out.into_inner())
    }

    /// Parse an uncompressed 24 or 32 bits-per-pixel bitmap
    ///
    /// Indexed bitmaps are reported as [`Error::Unsupported`].
    pub fn from_bytes(input: &[u8]) -> Result<Bitmap> {
        let mut reader = Cursor::new(input);

        let mut magic = [0u8; 2];
        reader
            .read_exact(&mut magic)
            .map_err(|_| Error::FormatError(FormatError::Truncated("bitmap")))?;
        if &magic != b"BM" {
            return Err(Error::FormatError(FormatError::Signature("BM")));
        }

        let (offset, info_size, width, height, bits, compression) = read_headers(&mut reader)
            .map_err(|_| Error::FormatError(FormatError::Truncated("bitmap")))?;

        if info_size < INFO_HEADER_SIZE {
            return Err(Error::FormatError(FormatError::Field {
                field: "bitmap info size",
                value: info_size,
            }));
        }
        if bits <= 8 {
            return Err(Error::Unsupported("indexed images cannot be packed"));
        }
        if bits != 24 && bits != 32 {
            return Err(Error::FormatError(FormatError::Field {
                field: "bitmap depth",
                value: bits as u32,
            }));
        }
        if compression != 0 {
            return Err(Error::FormatError(FormatError::Field {
                field: "bitmap compression",
                value: compression,
            }));
        }
        if width <= 0 || height == 0 {
            return Err(Error::FormatError(FormatError::Field {
                field: "bitmap dimensions",
                value: width as u32,
            }));
        }

        let width = width as u32;
        let top_down = height < 0;
        let height = height.unsigned_abs();
        let row = row_size(width, bits);
        let packed = width as usize * bits as usize / 8;

        let start = offset as usize;
        let end = row
            .checked_mul(height as usize)
            .and_then(|size| size.checked_add(start))
            .unwrap_or(usize::MAX);
        if end > input.len() {
            return Err(Error::FormatError(FormatError::Length {
                expected: end,
                actual: input.len(),
            }));
        }

        let mut rows: Vec<&[u8]> = input[start..end].chunks_exact(row).collect();
        if !top_down {
            rows.reverse();
        }
        let mut pixels = Vec::with_capacity(packed * height as usize);
        for line in rows {
            pixels.extend_from_slice(&line[..packed]);
        }

        Ok(Bitmap {
            width,
            height,
            bits,
            pixels,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::bitmap::Bitmap;
    use crate::error::{Error, FormatError, Result};

    #[test]
    fn padded_rows_round_trip() -> Result<()> {
        let bitmap = Bitmap {
            width: 3,
            height: 2,
            bits: 24,
            pixels: (0..18).collect(),
        };

        let bytes = bitmap.to_bytes()?;
        // 3 pixels of 3 bytes pad to 12 bytes per row
        assert_eq!(bytes.len(), 54 + 24);
        assert_eq!(Bitmap::from_bytes(&bytes)?, bitmap);
        Ok(())
    }

    #[test]
    fn bottom_up_rows_are_flipped() -> Result<()> {
        let bitmap = Bitmap {
            width: 1,
            height: 2,
            bits: 32,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let mut bytes = bitmap.to_bytes()?;
        // flip the sign of the height to make it bottom-up
        bytes[22..26].copy_from_slice(&2i32.to_le_bytes());

        let parsed = Bitmap::from_bytes(&bytes)?;
        assert_eq!(parsed.pixels, vec![5, 6, 7, 8, 1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn indexed_is_unsupported() -> Result<()> {
        let mut bytes = Bitmap {
            width: 1,
            height: 1,
            bits: 32,
            pixels: vec![0; 4],
        }
        .to_bytes()?;
        bytes[28..30].copy_from_slice(&8u16.to_le_bytes());

        assert!(matches!(
            Bitmap::from_bytes(&bytes),
            Err(Error::Unsupported(_))
        ));
        Ok(())
    }

    #[test]
    fn reject_oversized_dimensions() {
        let tall = Bitmap {
            width: 0,
            height: 0x8000_0000,
            bits: 32,
            pixels: Vec::new(),
        };
        assert!(matches!(
            tall.to_bytes(),
            Err(Error::FormatError(FormatError::Field { field: "bitmap height", .. }))
        ));

        // fits the header fields, but not the 32 bit image size
        let huge = Bitmap {
            width: 0x4000_0000,
            height: 4,
            bits: 32,
            pixels: Vec::new(),
        };
        assert!(matches!(
            huge.to_bytes(),
            Err(Error::FormatError(FormatError::Field { field: "bitmap height", .. }))
        ));
    }
}
