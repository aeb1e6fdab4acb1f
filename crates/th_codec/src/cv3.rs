//! `.cv3` sound effects and voice clips.
//!
//! A `.cv3` file is a bare `WAVEFORMATEX` structure followed by the length of the
//! sample data and the samples themselves:
//!
//! | Offset (bytes) | Field              | Description                              |
//! |----------------|--------------------|------------------------------------------|
//! | 0x0000         | Format tag         | 2 bytes: `1` for PCM                     |
//! | 0x0002         | Channels           | 2 bytes                                  |
//! | 0x0004         | Sample rate        | 4 bytes                                  |
//! | 0x0008         | Byte rate          | 4 bytes                                  |
//! | 0x000C         | Block align        | 2 bytes                                  |
//! | 0x000E         | Bits per sample    | 2 bytes                                  |
//! | 0x0010         | Extra size         | 2 bytes: always `0`                      |
//! | 0x0012         | Data size          | 4 bytes: length of the sample data       |
//! | 0x0016         | Data               | sample data                              |
//!
//! Decoding rewrites this into a canonical RIFF/WAVE file, which is exactly 22 bytes
//! longer than the `.cv3` it came from.

use std::io::{Cursor, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::instrument;

use crate::codec::Codec;
use crate::error::{Error, FormatError, Result};

/// Size of the header in front of the sample data of a `.cv3` file
pub const CV3_HEADER_SIZE: usize = 22;

/// Size of the header in front of the sample data of a canonical WAVE file
pub const WAVE_HEADER_SIZE: usize = 44;

const FORMAT_SIZE: usize = 16;

/// Codec for `.cv3` files
#[derive(Debug, Default, Clone, Copy)]
pub struct Cv3;

impl Codec for Cv3 {
    #[instrument(skip_all, err, fields(size = input.len()))]
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() < CV3_HEADER_SIZE {
            return Err(Error::FormatError(FormatError::Truncated("cv3")));
        }

        let extra = LittleEndian::read_u16(&input[16..18]);
        if extra != 0 {
            return Err(Error::FormatError(FormatError::Field {
                field: "cv3 extra size",
                value: extra as u32,
            }));
        }

        let data_size = LittleEndian::read_u32(&input[18..22]);
        let data = &input[CV3_HEADER_SIZE..];
        if data_size as usize != data.len() {
            return Err(Error::FormatError(FormatError::Length {
                expected: data_size as usize,
                actual: data.len(),
            }));
        }

        let mut output = Cursor::new(Vec::with_capacity(input.len() + 22));
        output.write_all(b"RIFF")?;
        output.write_u32::<LittleEndian>((WAVE_HEADER_SIZE - 8 + data.len()) as u32)?;
        output.write_all(b"WAVE")?;
        output.write_all(b"fmt ")?;
        output.write_u32::<LittleEndian>(FORMAT_SIZE as u32)?;
        output.write_all(&input[..FORMAT_SIZE])?;
        output.write_all(b"data")?;
        output.write_u32::<LittleEndian>(data_size)?;
        output.write_all(data)?;

        Ok(output.into_inner())
    }

    #[instrument(skip_all, err, fields(size = input.len()))]
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() < WAVE_HEADER_SIZE {
            return Err(Error::FormatError(FormatError::Truncated("wave")));
        }
        if &input[0..4] != b"RIFF" || &input[8..12] != b"WAVE" {
            return Err(Error::FormatError(FormatError::Signature("RIFF/WAVE")));
        }
        if &input[12..16] != b"fmt " || &input[36..40] != b"data" {
            return Err(Error::FormatError(FormatError::Signature("fmt/data chunk")));
        }

        let format_size = LittleEndian::read_u32(&input[16..20]);
        if format_size as usize != FORMAT_SIZE {
            return Err(Error::FormatError(FormatError::Field {
                field: "wave format size",
                value: format_size,
            }));
        }

        let riff_size = LittleEndian::read_u32(&input[4..8]) as usize;
        let data_size = LittleEndian::read_u32(&input[40..44]);
        let data = &input[WAVE_HEADER_SIZE..];
        if riff_size != input.len() - 8 || data_size as usize != data.len() {
            return Err(Error::FormatError(FormatError::Length {
                expected: data_size as usize,
                actual: data.len(),
            }));
        }

        let mut output = Cursor::new(Vec::with_capacity(input.len() - 22));
        output.write_all(&input[20..20 + FORMAT_SIZE])?;
        output.write_u16::<LittleEndian>(0)?;
        output.write_u32::<LittleEndian>(data_size)?;
        output.write_all(data)?;

        Ok(output.into_inner())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::codec::Codec;
    use crate::cv3::Cv3;
    use crate::error::{Error, FormatError, Result};

    #[rustfmt::skip]
    const CLIP: [u8; 26] = [
        0x01, 0x00,             // PCM
        0x01, 0x00,             // mono
        0x22, 0x56, 0x00, 0x00, // 22050 Hz
        0x44, 0xAC, 0x00, 0x00, // 44100 bytes/s
        0x02, 0x00,             // block align
        0x10, 0x00,             // 16 bits
        0x00, 0x00,             // no extra
        0x04, 0x00, 0x00, 0x00, // 4 bytes of data
        0x01, 0x02, 0x03, 0x04,
    ];

    #[test]
    fn decode_clip() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            b'R', b'I', b'F', b'F', 0x28, 0x00, 0x00, 0x00,
            b'W', b'A', b'V', b'E',
            b'f', b'm', b't', b' ', 0x10, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x01, 0x00, 0x22, 0x56, 0x00, 0x00,
            0x44, 0xAC, 0x00, 0x00, 0x02, 0x00, 0x10, 0x00,
            b'd', b'a', b't', b'a', 0x04, 0x00, 0x00, 0x00,
            0x01, 0x02, 0x03, 0x04,
        ];

        let decoded = Cv3.decode(&CLIP)?;
        assert_eq!(decoded.len(), CLIP.len() + 22);
        assert_eq!(decoded, expected);
        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let decoded = Cv3.decode(&CLIP)?;
        assert_eq!(Cv3.encode(&decoded)?, CLIP.to_vec());
        assert_eq!(Cv3.decode(&Cv3.encode(&decoded)?)?, decoded);
        Ok(())
    }

    #[test]
    fn reject_inconsistent_length() {
        let mut clip = CLIP.to_vec();
        clip.push(0x05);
        assert!(matches!(
            Cv3.decode(&clip),
            Err(Error::FormatError(FormatError::Length { expected: 4, actual: 5 }))
        ));
        assert!(matches!(
            Cv3.decode(&CLIP[..10]),
            Err(Error::FormatError(FormatError::Truncated("cv3")))
        ));
    }

    #[test]
    fn reject_non_wave() {
        let mut wave = Cv3.decode(&CLIP).unwrap();
        wave[0] = b'X';
        assert!(matches!(
            Cv3.encode(&wave),
            Err(Error::FormatError(FormatError::Signature(_)))
        ));
    }
}
