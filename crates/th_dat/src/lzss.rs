//! LZSS as used by the PBG archives.
//!
//! The stream is a sequence of bits read most significant first. A `1` flag is followed
//! by an 8 bit literal. A `0` flag is followed by a 13 bit dictionary offset and a 4 bit
//! length; the match copies `length + 3` bytes. An offset of `0` ends the stream.
//!
//! The dictionary is 0x2000 bytes of zeros, and its write position starts at `1`.
//!
//! The bit reader and writer are shared with the PBG3 tables, which use the same bit
//! order.

const DICTIONARY_SIZE: usize = 0x2000;
const DICTIONARY_MASK: usize = DICTIONARY_SIZE - 1;
const OFFSET_BITS: u32 = 13;
const LENGTH_BITS: u32 = 4;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = MIN_MATCH + (1 << LENGTH_BITS) - 1;
const MAX_DISTANCE: usize = DICTIONARY_SIZE - 1;

const HASH_BITS: u32 = 14;
const MAX_CHAIN: usize = 256;
const NONE: usize = usize::MAX;

pub(crate) struct BitReader<'a> {
    input: &'a [u8],
    position: usize,
    mask: u8,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            position: 0,
            mask: 0x80,
        }
    }

    pub(crate) fn bit(&mut self) -> Option<bool> {
        let byte = *self.input.get(self.position)?;
        let bit = byte & self.mask != 0;
        self.mask >>= 1;
        if self.mask == 0 {
            self.mask = 0x80;
            self.position += 1;
        }
        Some(bit)
    }

    /// Read `count` bits, most significant first
    pub(crate) fn bits(&mut self, count: u32) -> Option<usize> {
        let mut value = 0;
        for _ in 0..count {
            value = (value << 1) | self.bit()? as usize;
        }
        Some(value)
    }
}

#[derive(Default)]
pub(crate) struct BitWriter {
    output: Vec<u8>,
    current: u8,
    used: u32,
}

impl BitWriter {
    pub(crate) fn bit(&mut self, bit: bool) {
        self.current = (self.current << 1) | bit as u8;
        self.used += 1;
        if self.used == 8 {
            self.output.push(self.current);
            self.current = 0;
            self.used = 0;
        }
    }

    pub(crate) fn bits(&mut self, value: usize, count: u32) {
        for shift in (0..count).rev() {
            self.bit((value >> shift) & 1 != 0);
        }
    }

    /// Flush the last partial byte, padded with zero bits
    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.output.push(self.current << (8 - self.used));
        }
        self.output
    }
}

/// Why a stream could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The bits ran out before the end marker
    Truncated,
    /// The stream expands past the given limit
    Overrun,
}

impl DecodeError {
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Truncated => "stream ends before its end marker",
            DecodeError::Overrun => "stream expands past the recorded size",
        }
    }
}

/// Decode `input`, refusing to produce more than `limit` bytes
pub fn decode(input: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut output = Vec::with_capacity(limit);
    let mut dictionary = [0u8; DICTIONARY_SIZE];
    let mut head = 1;
    let mut bits = BitReader::new(input);

    loop {
        let literal = bits.bit().ok_or(DecodeError::Truncated)?;
        if literal {
            let byte = bits.bits(8).ok_or(DecodeError::Truncated)? as u8;
            output.push(byte);
            dictionary[head] = byte;
            head = (head + 1) & DICTIONARY_MASK;
        } else {
            let offset = bits.bits(OFFSET_BITS).ok_or(DecodeError::Truncated)?;
            if offset == 0 {
                break;
            }
            let length = bits.bits(LENGTH_BITS).ok_or(DecodeError::Truncated)? + MIN_MATCH;
            for i in 0..length {
                let byte = dictionary[(offset + i) & DICTIONARY_MASK];
                output.push(byte);
                dictionary[head] = byte;
                head = (head + 1) & DICTIONARY_MASK;
            }
        }

        if output.len() > limit {
            return Err(DecodeError::Overrun);
        }
    }

    Ok(output)
}

#[inline]
fn hash(window: &[u8]) -> usize {
    let value = u32::from_le_bytes([window[0], window[1], window[2], 0]);
    (value.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
}

/// Positions of earlier 3 byte sequences, most recent first
struct HashChains<'a> {
    input: &'a [u8],
    heads: Vec<usize>,
    chain: Vec<usize>,
}

impl<'a> HashChains<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            heads: vec![NONE; 1 << HASH_BITS],
            chain: vec![NONE; input.len()],
        }
    }

    fn insert(&mut self, position: usize) {
        if position + MIN_MATCH <= self.input.len() {
            let h = hash(&self.input[position..]);
            self.chain[position] = self.heads[h];
            self.heads[h] = position;
        }
    }

    /// Longest earlier match for the bytes at `position` as `(length, source)`
    fn longest_match(&self, position: usize) -> (usize, usize) {
        let input = self.input;
        let (mut best_length, mut best_source) = (0, 0);
        if position + MIN_MATCH > input.len() {
            return (best_length, best_source);
        }

        let longest = MAX_MATCH.min(input.len() - position);
        let mut candidate = self.heads[hash(&input[position..])];
        let mut depth = 0;

        while candidate != NONE && depth < MAX_CHAIN {
            if position - candidate > MAX_DISTANCE {
                break;
            }
            // offset 0 marks the end of the stream and cannot be referenced
            if (1 + candidate) & DICTIONARY_MASK != 0 {
                let length = input[candidate..]
                    .iter()
                    .zip(&input[position..position + longest])
                    .take_while(|(a, b)| a == b)
                    .count();
                if length > best_length {
                    best_length = length;
                    best_source = candidate;
                    if length == longest {
                        break;
                    }
                }
            }
            candidate = self.chain[candidate];
            depth += 1;
        }

        (best_length, best_source)
    }
}

/// Encode `input` with a greedy longest-match search over hash chains
pub fn encode(input: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::default();
    let mut chains = HashChains::new(input);

    let mut position = 0;
    while position < input.len() {
        let (length, source) = chains.longest_match(position);

        if length >= MIN_MATCH {
            writer.bit(false);
            writer.bits((1 + source) & DICTIONARY_MASK, OFFSET_BITS);
            writer.bits(length - MIN_MATCH, LENGTH_BITS);
            for p in position..position + length {
                chains.insert(p);
            }
            position += length;
        } else {
            writer.bit(true);
            writer.bits(input[position] as usize, 8);
            chains.insert(position);
            position += 1;
        }
    }

    writer.bit(false);
    writer.bits(0, OFFSET_BITS);
    writer.finish()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::lzss::{decode, encode, DecodeError};

    #[test]
    fn decode_literals_and_match() {
        // "abc" as literals, then a 6 byte match at dictionary offset 1, then the end
        #[rustfmt::skip]
        let input = [
            0xB0, 0xD8, 0xAC, 0x60, 0x00, 0x98, 0x00, 0x00,
        ];
        assert_eq!(decode(&input, 64), Ok(b"abcabcabc".to_vec()));
    }

    #[test]
    fn encode_known() {
        assert_eq!(
            encode(b"abcabcabc"),
            vec![0xB0, 0xD8, 0xAC, 0x60, 0x00, 0x98, 0x00, 0x00]
        );
    }

    #[test]
    fn empty_stream() {
        let encoded = encode(b"");
        assert_eq!(encoded, vec![0x00, 0x00]);
        assert_eq!(decode(&encoded, 0), Ok(Vec::new()));
    }

    #[test]
    fn round_trip_text() {
        let input = "Border of Wave and Particle, Border of Life and Death. "
            .repeat(300)
            .into_bytes();
        let encoded = encode(&input);
        assert!(encoded.len() < input.len() / 4);
        assert_eq!(decode(&encoded, input.len()), Ok(input));
    }

    #[test]
    fn round_trip_past_dictionary_wrap() {
        // long enough for the dictionary head to wrap several times
        let input: Vec<u8> = (0..40_000u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 27) as u8 ^ (i / 9000) as u8)
            .collect();
        let encoded = encode(&input);
        assert_eq!(decode(&encoded, input.len()), Ok(input));
    }

    #[test]
    fn reject_bad_streams() {
        let encoded = encode(b"abcabcabc");
        assert_eq!(decode(&encoded[..4], 64), Err(DecodeError::Truncated));
        assert_eq!(decode(&encoded, 5), Err(DecodeError::Overrun));
    }
}
