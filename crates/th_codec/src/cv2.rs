//! `.cv2` sprite and background images.
//!
//! | Offset (bytes) | Field       | Description                                         |
//! |----------------|-------------|-----------------------------------------------------|
//! | 0x0000         | Depth       | 1 byte: 8, 24 or 32 bits per pixel                  |
//! | 0x0001         | Width       | 4 bytes: visible pixels per row                     |
//! | 0x0005         | Height      | 4 bytes: number of rows                             |
//! | 0x0009         | Stride      | 4 bytes: stored pixels per row, at least the width  |
//! | 0x000D         | Reserved    | 4 bytes: always `0`                                 |
//! | 0x0011         | Pixels      | `stride * height * depth / 8` bytes, top row first  |
//!
//! Direct-color pixels are stored B, G, R(, A). 8 bits-per-pixel images store palette
//! indices; the palette lives in a separate `.pal` file (see [`crate::palette`]).
//!
//! Decoding produces a top-down Windows bitmap. Palettized and 32 bit images become 32
//! bit BGRA bitmaps; 24 bit images stay 24 bit, so direct-color images pack back byte
//! for byte. Packing is only possible from direct color bitmaps: palettized images are
//! read-only.

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, instrument};

use crate::bitmap::Bitmap;
use crate::codec::Codec;
use crate::error::{Error, FormatError, Result};
use crate::palette::ColorTable;

/// Size of the `.cv2` header
pub const CV2_HEADER_SIZE: usize = 17;

/// Header of a `.cv2` image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cv2Header {
    pub depth: u8,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl Cv2Header {
    /// Parse and validate the header at the start of `input`
    pub fn parse(input: &[u8]) -> Result<Cv2Header> {
        if input.len() < CV2_HEADER_SIZE {
            return Err(Error::FormatError(FormatError::Truncated("cv2")));
        }

        let mut reader = Cursor::new(input);
        let depth = reader.read_u8()?;
        let header = Cv2Header {
            depth,
            width: reader.read_u32::<LittleEndian>()?,
            height: reader.read_u32::<LittleEndian>()?,
            stride: reader.read_u32::<LittleEndian>()?,
        };

        if !matches!(depth, 8 | 24 | 32) {
            return Err(Error::FormatError(FormatError::Field {
                field: "cv2 depth",
                value: depth as u32,
            }));
        }
        for (field, value) in [("cv2 width", header.width), ("cv2 height", header.height)] {
            if i32::try_from(value).is_err() {
                return Err(Error::FormatError(FormatError::Field { field, value }));
            }
        }
        if header.stride < header.width {
            return Err(Error::FormatError(FormatError::Field {
                field: "cv2 stride",
                value: header.stride,
            }));
        }

        Ok(header)
    }

    fn bytes_per_pixel(&self) -> usize {
        self.depth as usize / 8
    }

    fn pixel_bytes(&self) -> Option<usize> {
        (self.stride as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }
}

/// Codec for `.cv2` files
///
/// ```
/// use th_codec::{Codec, Cv2};
///
/// // a 1x1 image with a single palette index
/// let cv2 = [8, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0x80];
/// let bitmap = Cv2::default().decode(&cv2).unwrap();
/// assert_eq!(&bitmap[..2], b"BM");
/// ```
#[derive(Debug, Default, Clone)]
pub struct Cv2 {
    palette: Option<ColorTable>,
}

impl Cv2 {
    /// Decode palettized images through `palette`
    pub fn with_palette(palette: ColorTable) -> Self {
        Self {
            palette: Some(palette),
        }
    }

    fn to_bitmap(&self, header: &Cv2Header, pixels: &[u8]) -> Bitmap {
        let width = header.width as usize;
        let stride = header.stride as usize * header.bytes_per_pixel();
        let rows = pixels.chunks_exact(stride.max(1)).take(header.height as usize);

        match header.depth {
            8 => {
                let fallback;
                let palette = match &self.palette {
                    Some(palette) => palette,
                    None => {
                        debug!("no palette supplied, decoding as grayscale");
                        fallback = ColorTable::grayscale();
                        &fallback
                    }
                };

                let pixels = rows
                    .flat_map(|row| row[..width].iter().flat_map(move |&i| palette.color(i)))
                    .collect();
                Bitmap {
                    width: header.width,
                    height: header.height,
                    bits: 32,
                    pixels,
                }
            }
            depth => {
                let packed = width * header.bytes_per_pixel();
                let pixels = rows.flat_map(|row| &row[..packed]).copied().collect();
                Bitmap {
                    width: header.width,
                    height: header.height,
                    bits: depth as u16,
                    pixels,
                }
            }
        }
    }
}

impl Codec for Cv2 {
    #[instrument(skip_all, err, fields(size = input.len()))]
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let header = Cv2Header::parse(input)?;
        debug!(?header, "decoding cv2");

        let expected = header
            .pixel_bytes()
            .and_then(|size| size.checked_add(CV2_HEADER_SIZE))
            .unwrap_or(usize::MAX);
        if input.len() != expected {
            return Err(Error::FormatError(FormatError::Length {
                expected,
                actual: input.len(),
            }));
        }

        self.to_bitmap(&header, &input[CV2_HEADER_SIZE..]).to_bytes()
    }

    /// Pack a 24 or 32 bits-per-pixel bitmap
    ///
    /// Palettized bitmaps are rejected with [`Error::Unsupported`] before anything is
    /// produced.
    #[instrument(skip_all, err, fields(size = input.len()))]
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let bitmap = Bitmap::from_bytes(input)?;

        let mut output = Cursor::new(Vec::with_capacity(CV2_HEADER_SIZE + bitmap.pixels.len()));
        output.write_u8(bitmap.bits as u8)?;
        output.write_u32::<LittleEndian>(bitmap.width)?;
        output.write_u32::<LittleEndian>(bitmap.height)?;
        output.write_u32::<LittleEndian>(bitmap.width)?;
        output.write_u32::<LittleEndian>(0)?;
        output.write_all(&bitmap.pixels)?;

        Ok(output.into_inner())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::bitmap::Bitmap;
    use crate::codec::Codec;
    use crate::cv2::Cv2;
    use crate::error::{Error, FormatError, Result};
    use crate::palette::Palette;

    fn header(depth: u8, width: u32, height: u32, stride: u32) -> Vec<u8> {
        let mut out = vec![depth];
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&stride.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    fn palette() -> Vec<u8> {
        let mut packed = vec![0u8; 513];
        packed[0] = 16;
        // index 1 opaque red, index 2 opaque green
        packed[3..5].copy_from_slice(&0xFC00u16.to_le_bytes());
        packed[5..7].copy_from_slice(&0x83E0u16.to_le_bytes());
        packed
    }

    #[test]
    fn decode_indexed_with_palette() -> Result<()> {
        // 2x2 image stored with a stride of 3
        let mut cv2 = header(8, 2, 2, 3);
        cv2.extend_from_slice(&[1, 2, 9, 2, 1, 9]);

        let palette = Palette::expand(&palette())?;
        let decoded = Cv2::with_palette(palette).decode(&cv2)?;
        let bitmap = Bitmap::from_bytes(&decoded)?;

        #[rustfmt::skip]
        assert_eq!(bitmap.pixels, vec![
            0x00, 0x00, 0xFF, 0xFF,  0x00, 0xFF, 0x00, 0xFF,
            0x00, 0xFF, 0x00, 0xFF,  0x00, 0x00, 0xFF, 0xFF,
        ]);
        Ok(())
    }

    #[test]
    fn decode_indexed_without_palette() -> Result<()> {
        let mut cv2 = header(8, 2, 1, 2);
        cv2.extend_from_slice(&[0x10, 0x80]);

        let bitmap = Bitmap::from_bytes(&Cv2::default().decode(&cv2)?)?;
        assert_eq!(
            bitmap.pixels,
            vec![0x10, 0x10, 0x10, 0xFF, 0x80, 0x80, 0x80, 0xFF]
        );
        Ok(())
    }

    #[test]
    fn direct_color_round_trip() -> Result<()> {
        for depth in [24u8, 32] {
            let mut cv2 = header(depth, 3, 2, 3);
            cv2.extend((0..3 * 2 * depth as usize / 8).map(|i| i as u8));

            let decoded = Cv2::default().decode(&cv2)?;
            assert_eq!(Cv2::default().encode(&decoded)?, cv2);
        }
        Ok(())
    }

    #[test]
    fn packing_indexed_is_unsupported() -> Result<()> {
        let mut cv2 = header(32, 1, 1, 1);
        cv2.extend_from_slice(&[1, 2, 3, 4]);
        let mut bitmap = Cv2::default().decode(&cv2)?;
        bitmap[28..30].copy_from_slice(&8u16.to_le_bytes());

        assert!(matches!(
            Cv2::default().encode(&bitmap),
            Err(Error::Unsupported(_))
        ));
        Ok(())
    }

    #[test]
    fn reject_truncated_pixels() {
        let mut cv2 = header(32, 2, 2, 2);
        cv2.extend_from_slice(&[0; 12]);
        assert!(matches!(
            Cv2::default().decode(&cv2),
            Err(Error::FormatError(FormatError::Length { expected: 33, actual: 29 }))
        ));
    }

    #[test]
    fn reject_bad_header() {
        assert!(matches!(
            Cv2::default().decode(&header(16, 1, 1, 1)),
            Err(Error::FormatError(FormatError::Field { field: "cv2 depth", .. }))
        ));
        assert!(matches!(
            Cv2::default().decode(&header(32, 4, 1, 2)),
            Err(Error::FormatError(FormatError::Field { field: "cv2 stride", .. }))
        ));
    }

    #[test]
    fn reject_oversized_header() {
        // no pixel bytes at all, but a height the bitmap header cannot hold
        assert!(matches!(
            Cv2::default().decode(&header(32, 0, 0x8000_0000, 0)),
            Err(Error::FormatError(FormatError::Field {
                field: "cv2 height",
                value: 0x8000_0000
            }))
        ));
        assert!(matches!(
            Cv2::default().decode(&header(8, u32::MAX, 1, u32::MAX)),
            Err(Error::FormatError(FormatError::Field { field: "cv2 width", .. }))
        ));

        // the largest height a bitmap can describe
        assert!(Cv2::default()
            .decode(&header(32, 0, i32::MAX as u32, 0))
            .is_ok());
    }

    #[test]
    fn decoded_depth_follows_source() -> Result<()> {
        for (depth, bits) in [(8u8, 32u16), (24, 24), (32, 32)] {
            let mut cv2 = header(depth, 1, 1, 1);
            cv2.extend(std::iter::repeat(0x40).take(depth as usize / 8));

            let decoded = Cv2::default().decode(&cv2)?;
            assert_eq!(u16::from_le_bytes([decoded[28], decoded[29]]), bits, "{depth}");
            // top-down
            assert_eq!(i32::from_le_bytes(decoded[22..26].try_into().unwrap()), -1);
        }
        Ok(())
    }
}
