//! Chained XOR cipher protecting the music room comments.
//!
//! Each plain byte is the cipher byte XORed with the previous cipher byte, starting
//! from [`SEED`]. Decryption only depends on the cipher text, so it can start anywhere.

use tracing::instrument;

use crate::codec::Codec;
use crate::error::Result;

/// Value standing in for the cipher byte in front of the first one
pub const SEED: u8 = 0x5C;

/// Codec for music room comment files
#[derive(Debug, Default, Clone, Copy)]
pub struct MusicRoom;

impl MusicRoom {
    pub fn decrypt(data: &mut [u8]) {
        let mut previous = SEED;
        for byte in data {
            let cipher = *byte;
            *byte ^= previous;
            previous = cipher;
        }
    }

    pub fn encrypt(data: &mut [u8]) {
        let mut previous = SEED;
        for byte in data {
            *byte ^= previous;
            previous = *byte;
        }
    }
}

impl Codec for MusicRoom {
    #[instrument(skip_all, fields(size = input.len()))]
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = input.to_vec();
        MusicRoom::decrypt(&mut output);
        Ok(output)
    }

    #[instrument(skip_all, fields(size = input.len()))]
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = input.to_vec();
        MusicRoom::encrypt(&mut output);
        Ok(output)
    }
}
