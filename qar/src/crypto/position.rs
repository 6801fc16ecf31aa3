//! Position-keyed XOR cipher
//!
//! The first decryption layer of every QAR payload and the cipher guarding
//! the optional content header. The keystream for each 8-byte word is a
//! pair of table entries picked by the word's absolute offset inside the
//! entry and the low half of the entry hash. Version 2 archives additionally
//! mix the entry seed into every word.

use super::constants::POSITION_TABLE;
use super::{read_word, write_word, CipherTransform};
use crate::FormatVersion;

/// Size of one keystream word pair in bytes
pub const WORD_PAIR_SIZE: usize = 8;

/// Position cipher state for one entry stream
#[derive(Debug)]
pub struct PositionCipher {
    version: FormatVersion,
    hash_low: u32,
    seed: u64,
    seed_low: u32,
    seed_high: u32,
    position: u64,
}

impl PositionCipher {
    /// Create a cipher for the entry with the given `hash` and `seed`
    pub fn new(version: FormatVersion, hash: u64, seed: u64) -> Self {
        Self {
            version,
            hash_low: hash as u32,
            seed,
            seed_low: seed as u32,
            seed_high: (seed >> 32) as u32,
            position: 0,
        }
    }

    /// Number of bytes transformed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Protocol version this cipher follows
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Table index for the word pair starting at `block_offset`
    #[inline]
    fn table_index(&self, block_offset: u64) -> usize {
        (2 * ((u64::from(self.hash_low) + block_offset / 11) % 4)) as usize
    }

    /// Table index used by the final-block path
    #[inline]
    fn final_table_index(&self, block_offset: u64) -> usize {
        match self.version {
            FormatVersion::V1 => self.table_index(block_offset),
            FormatVersion::V2 => {
                let mixed = u64::from(self.hash_low)
                    .wrapping_add(self.seed)
                    .wrapping_add(block_offset / 11);
                (2 * (mixed % 4)) as usize
            }
        }
    }

    /// Transform whole word pairs in place, returning the bytes consumed
    fn apply_words(&mut self, data: &mut [u8]) -> usize {
        let blocks = data.len() / WORD_PAIR_SIZE;

        for block in 0..blocks {
            let offset = block * WORD_PAIR_SIZE;
            let index = self.table_index(self.position + offset as u64);

            let (mut low, mut high) = (POSITION_TABLE[index], POSITION_TABLE[index + 1]);
            if self.version == FormatVersion::V2 {
                low ^= self.seed_low;
                high ^= self.seed_high;
            }

            let first = read_word(data, offset) ^ low;
            let second = read_word(data, offset + 4) ^ high;
            write_word(data, offset, first);
            write_word(data, offset + 4, second);
        }

        let consumed = blocks * WORD_PAIR_SIZE;
        self.position += consumed as u64;
        consumed
    }

    /// Transform a run of any length in place, byte by byte
    fn apply_tail(&mut self, data: &mut [u8]) {
        for (i, byte) in data.iter_mut().enumerate() {
            let absolute = self.position + i as u64;
            let within = (absolute % WORD_PAIR_SIZE as u64) as usize;
            let block_offset = absolute - within as u64;
            let index = self.final_table_index(block_offset);
            let shift = 8 * (within % 4);

            let (mask, seed_word) = if within < 4 {
                (POSITION_TABLE[index], self.seed_low)
            } else {
                (POSITION_TABLE[index + 1], self.seed_high)
            };

            let mut key = (mask >> shift) as u8;
            if self.version == FormatVersion::V2 {
                key ^= (seed_word >> shift) as u8;
            }
            *byte ^= key;
        }

        self.position += data.len() as u64;
    }

    /// Transform `data` in place as the remainder of the stream
    ///
    /// Whole word pairs go through the bulk path; a trailing partial word
    /// goes through the final-block path and ends the stream.
    pub fn apply(&mut self, data: &mut [u8]) {
        let consumed = self.apply_words(data);
        self.apply_tail(&mut data[consumed..]);
    }
}

impl CipherTransform for PositionCipher {
    fn block_size(&self) -> usize {
        WORD_PAIR_SIZE
    }

    fn transform_block(&mut self, input: &[u8], output: &mut [u8]) -> usize {
        let len = input.len().min(output.len()) / WORD_PAIR_SIZE * WORD_PAIR_SIZE;
        output[..len].copy_from_slice(&input[..len]);
        self.apply_words(&mut output[..len])
    }

    fn transform_final_block(&mut self, input: &[u8]) -> Vec<u8> {
        let mut output = input.to_vec();
        self.apply_tail(&mut output);
        output
    }
}
