//! Positioned access to the bytes of an archive

use std::io::{self, Read, Seek, SeekFrom};

/// A random-access view of an archive
///
/// Every container reads its table through this trait. It is implemented for all
/// [`Read`] + [`Seek`] types.
pub trait ByteSource {
    /// Read exactly `len` bytes starting at `offset`
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] when the stream ends before `len`
    /// bytes were read.
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>>;

    /// Total length of the stream
    fn stream_len(&mut self) -> io::Result<u64>;
}

impl<T: Read + Seek> ByteSource for T {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.seek(SeekFrom::Start(offset))?;

        // a bogus length must fail on the short read, not on the allocation
        let mut buffer = Vec::new();
        self.by_ref().take(len as u64).read_to_end(&mut buffer)?;
        if buffer.len() != len {
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

    fn stream_len(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, Cursor};

    use pretty_assertions::assert_eq;

    use crate::io::ByteSource;

    #[test]
    fn read_inside_stream() -> io::Result<()> {
        let mut source = Cursor::new(b"0123456789".to_vec());
        assert_eq!(ByteSource::stream_len(&mut source)?, 10);
        assert_eq!(source.read_at(3, 4)?, b"3456");
        assert_eq!(source.read_at(0, 0)?, b"");
        Ok(())
    }

    #[test]
    fn short_read_is_eof() {
        let mut source = Cursor::new(b"0123456789".to_vec());
        let error = source.read_at(8, 4).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);

        let error = source.read_at(20, 1).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }
}
