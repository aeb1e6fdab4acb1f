//! Additive cipher protecting the card list text of the fighting games.
//!
//! The keystream is the high half of the Microsoft C runtime `rand()` generator seeded
//! with [`SEED`]. Encryption adds the key byte, decryption subtracts it.

use tracing::instrument;

use crate::codec::Codec;
use crate::error::Result;

/// Seed of the generator
pub const SEED: u32 = 0x0C5E;

const MULTIPLIER: u32 = 0x343FD;
const INCREMENT: u32 = 0x269EC3;

struct Lcg(u32);

impl Iterator for Lcg {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<u8> {
        self.0 = self.0.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        Some((self.0 >> 16) as u8)
    }
}

/// Codec for card list files
#[derive(Debug, Default, Clone, Copy)]
pub struct CardList;

impl CardList {
    pub fn decrypt(data: &mut [u8]) {
        for (byte, key) in data.iter_mut().zip(Lcg(SEED)) {
            *byte = byte.wrapping_sub(key);
        }
    }

    pub fn encrypt(data: &mut [u8]) {
        for (byte, key) in data.iter_mut().zip(Lcg(SEED)) {
            *byte = byte.wrapping_add(key);
        }
    }
}

impl Codec for CardList {
    #[instrument(skip_all, fields(size = input.len()))]
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = input.to_vec();
        CardList::decrypt(&mut output);
        Ok(output)
    }

    #[instrument(skip_all, fields(size = input.len()))]
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = input.to_vec();
        CardList::encrypt(&mut output);
        Ok(output)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::card_list::{CardList, Lcg, SEED};
    use crate::codec::Codec;
    use crate::error::Result;

    #[test]
    fn keystream_prefix() {
        let keys: Vec<u8> = Lcg(SEED).take(4).collect();
        assert_eq!(keys, vec![0x89, 0xB6, 0x85, 0x08]);
    }

    #[test]
    fn encrypt_known_text() -> Result<()> {
        assert_eq!(CardList.encode(b"Card")?, vec![0xCC, 0x17, 0xF7, 0x6C]);
        assert_eq!(CardList.decode(&[0xCC, 0x17, 0xF7, 0x6C])?, b"Card");
        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let plain = "100,博麗霊夢,2\n".repeat(50).into_bytes();
        let encoded = CardList.encode(&plain)?;
        assert_eq!(encoded.len(), plain.len());
        assert_eq!(CardList.decode(&encoded)?, plain);
        assert_eq!(CardList.encode(&CardList.decode(&plain)?)?, plain);
        Ok(())
    }

    #[test]
    fn empty_input() -> Result<()> {
        assert!(CardList.decode(&[])?.is_empty());
        Ok(())
    }
}
