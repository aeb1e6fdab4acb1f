//! Stream cipher protecting `.cv0` text and `.cv1` list files.
//!
//! Every byte is XORed with a key that advances by a step, and the step itself
//! advances by a constant. Applying the cipher twice yields the original bytes.

use std::io::{self, Read};

use tracing::instrument;

use crate::codec::Codec;
use crate::error::Result;

const INITIAL_KEY: u8 = 0x8B;
const INITIAL_STEP: u8 = 0x71;
const STEP_DELTA: u8 = 0x95;

#[derive(Debug, Clone, Copy)]
struct KeyStream {
    key: u8,
    step: u8,
}

impl Default for KeyStream {
    fn default() -> Self {
        Self {
            key: INITIAL_KEY,
            step: INITIAL_STEP,
        }
    }
}

impl KeyStream {
    #[inline]
    fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.key;
            self.key = self.key.wrapping_add(self.step);
            self.step = self.step.wrapping_add(STEP_DELTA);
        }
    }
}

/// Codec for `.cv0` / `.cv1` files
#[derive(Debug, Default, Clone, Copy)]
pub struct Cv01;

impl Cv01 {
    /// Decrypt `data` in place
    pub fn decrypt(data: &mut [u8]) {
        KeyStream::default().apply(data);
    }

    /// Encrypt `data` in place
    pub fn encrypt(data: &mut [u8]) {
        KeyStream::default().apply(data);
    }
}

impl Codec for Cv01 {
    #[instrument(skip_all, fields(size = input.len()))]
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = input.to_vec();
        Cv01::decrypt(&mut output);
        Ok(output)
    }

    #[instrument(skip_all, fields(size = input.len()))]
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = input.to_vec();
        Cv01::encrypt(&mut output);
        Ok(output)
    }
}

/// Decrypts a `.cv0` / `.cv1` stream while it is being read
///
/// ```
/// use std::io::Read;
/// use th_codec::cv01::Cv01Reader;
///
/// let mut plain = String::new();
/// Cv01Reader::new(&[0xC3, 0x95][..]).read_to_string(&mut plain).unwrap();
/// assert_eq!(plain, "Hi");
/// ```
pub struct Cv01Reader<R: Read> {
    inner: R,
    stream: KeyStream,
}

impl<R: Read> Cv01Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            stream: KeyStream::default(),
        }
    }

    /// Unwrap and return the inner reader object
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Cv01Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.stream.apply(&mut buf[..read]);
        Ok(read)
    }
}
