//! Payload compression and decompression handling.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::{instrument, trace};

use crate::entry::{CompressionMethod, Entry};
use crate::error::{Error, FormatError, Result};
use crate::{lzss, rle};

/// XOR every byte of `data` with `key`
#[inline]
pub(crate) fn mask(data: &mut [u8], key: u8) {
    if key != 0 {
        data.iter_mut().for_each(|b| *b ^= key);
    }
}

/// Wrapping sum of all bytes, the checksum of the PBG tables
pub(crate) fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |sum, &b| sum.wrapping_add(b as u32))
}

/// Turn the stored bytes of `entry` into its content
#[instrument(skip_all, fields(name = %entry.name, stored = stored.len()), err)]
pub(crate) fn decompress(entry: &Entry, mut stored: Vec<u8>) -> Result<Vec<u8>> {
    let Some(meta) = entry.compression else {
        return Ok(stored);
    };

    if let Some(expected) = meta.checksum {
        let actual = checksum(&stored);
        if actual != expected {
            return Err(Error::FormatError(FormatError::Checksum {
                name: entry.name.clone(),
                expected,
                actual,
            }));
        }
    }

    mask(&mut stored, meta.key);
    let size = entry.size as usize;
    let corrupt = |reason| {
        Error::FormatError(FormatError::Corrupt {
            name: entry.name.clone(),
            reason,
        })
    };

    let output = match meta.method {
        CompressionMethod::Stored => stored,
        CompressionMethod::Rle => {
            rle::decode(&stored, size).ok_or_else(|| corrupt("run is missing its count"))?
        }
        CompressionMethod::Lzss => {
            lzss::decode(&stored, size).map_err(|error| corrupt(error.reason()))?
        }
        CompressionMethod::Zlib => {
            let mut output = Vec::with_capacity(size);
            ZlibDecoder::new(stored.as_slice())
                .take(size as u64 + 1)
                .read_to_end(&mut output)
                .map_err(|_| corrupt("invalid zlib stream"))?;
            output
        }
    };

    trace!(method = %meta.method, decoded = output.len());
    Ok(output)
}

/// Compress `data` with `method`
pub(crate) fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    Ok(match method {
        CompressionMethod::Stored => data.to_vec(),
        CompressionMethod::Rle => rle::encode(data),
        CompressionMethod::Lzss => lzss::encode(data),
        CompressionMethod::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?
        }
    })
}

/// Compress with RLE, falling back to storing when it does not shrink `data`
pub(crate) fn compress_rle_or_store(data: &[u8]) -> (CompressionMethod, Vec<u8>) {
    let packed = rle::encode(data);
    if packed.len() < data.len() {
        (CompressionMethod::Rle, packed)
    } else {
        (CompressionMethod::Stored, data.to_vec())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::compression::{checksum, compress, compress_rle_or_store, decompress, mask};
    use crate::entry::{CompressedMeta, CompressionMethod, Entry};
    use crate::error::{Error, FormatError, Result};

    fn entry(method: CompressionMethod, stored: &[u8], size: u64, key: u8) -> Entry {
        Entry {
            name: "bgm.txt".into(),
            offset: 0,
            size,
            compression: Some(CompressedMeta {
                compressed_size: stored.len() as u64,
                method,
                key,
                checksum: Some(checksum(stored)),
            }),
        }
    }

    #[test]
    fn every_method_round_trips() -> Result<()> {
        let data = b"Eastern Wonderland, Eastern Wonderland, Eastern Wonderland".to_vec();
        for method in [
            CompressionMethod::Stored,
            CompressionMethod::Rle,
            CompressionMethod::Lzss,
            CompressionMethod::Zlib,
        ] {
            let mut stored = compress(&data, method)?;
            mask(&mut stored, 0x12);
            let entry = entry(method, &stored, data.len() as u64, 0x12);
            assert_eq!(decompress(&entry, stored)?, data, "{method}");
        }
        Ok(())
    }

    #[test]
    fn checksum_mismatch() {
        let stored = vec![1, 2, 3];
        let entry = entry(CompressionMethod::Stored, &stored, 3, 0);
        assert!(matches!(
            decompress(&entry, vec![1, 2, 4]),
            Err(Error::FormatError(FormatError::Checksum { expected: 6, actual: 7, .. }))
        ));
    }

    #[test]
    fn corrupt_zlib() {
        let stored = vec![0x78, 0x9C, 0xFF, 0xFF];
        let entry = entry(CompressionMethod::Zlib, &stored, 10, 0);
        assert!(matches!(
            decompress(&entry, stored),
            Err(Error::FormatError(FormatError::Corrupt { .. }))
        ));
    }

    #[test]
    fn rle_falls_back_to_store() {
        let (method, packed) = compress_rle_or_store(b"abcdef");
        assert_eq!(method, CompressionMethod::Stored);
        assert_eq!(packed, b"abcdef");

        let (method, packed) = compress_rle_or_store(&[0; 64]);
        assert_eq!(method, CompressionMethod::Rle);
        assert_eq!(packed, vec![0, 0, 62]);
    }
}
