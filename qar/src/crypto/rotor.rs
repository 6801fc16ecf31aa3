//! Rotor stream cipher
//!
//! Second decryption layer of entries that carry a content header with a
//! non-zero key. The keystream is a multiplicative congruential sequence
//! over 32-bit words.

use super::constants::{ROTOR_KEY_SCALE, ROTOR_MULTIPLIER, ROTOR_SALT};
use super::{read_word, write_word, CipherTransform};

/// Granularity of the bulk transform in bytes
pub const ROTOR_BLOCK_SIZE: usize = 64;

/// Granularity of the final-block transform in bytes
const FINAL_GROUP_SIZE: usize = 16;

/// Rotor cipher state
#[derive(Debug, Clone)]
pub struct RotorCipher {
    key: u32,
    rotor: u32,
}

impl RotorCipher {
    /// Create a cipher from the content-header key
    pub fn new(key: u32) -> Self {
        Self {
            key: key.wrapping_mul(ROTOR_KEY_SCALE),
            rotor: key | ((key ^ ROTOR_SALT) << 16),
        }
    }

    /// Current rotor value
    pub fn rotor(&self) -> u32 {
        self.rotor
    }

    #[inline]
    fn next_word(&mut self, word: u32) -> u32 {
        let output = word ^ self.rotor;
        self.rotor = self
            .key
            .wrapping_add(ROTOR_MULTIPLIER.wrapping_mul(self.rotor));
        output
    }

    fn apply_words(&mut self, input: &[u8], output: &mut [u8], len: usize) {
        for offset in (0..len).step_by(4) {
            let word = self.next_word(read_word(input, offset));
            write_word(output, offset, word);
        }
    }
}

impl CipherTransform for RotorCipher {
    fn block_size(&self) -> usize {
        ROTOR_BLOCK_SIZE
    }

    fn transform_block(&mut self, input: &[u8], output: &mut [u8]) -> usize {
        let len = input.len().min(output.len()) / ROTOR_BLOCK_SIZE * ROTOR_BLOCK_SIZE;
        self.apply_words(input, output, len);
        len
    }

    /// Transform the tail of the stream
    ///
    /// Whole 16-byte groups come first, then any remaining whole words.
    /// Up to three trailing bytes that do not fill a word come out as zero.
    fn transform_final_block(&mut self, input: &[u8]) -> Vec<u8> {
        let mut output = vec![0u8; input.len()];

        let groups = input.len() / FINAL_GROUP_SIZE * FINAL_GROUP_SIZE;
        self.apply_words(input, &mut output, groups);

        let words = input.len() / 4 * 4;
        self.apply_words(&input[groups..], &mut output[groups..], words - groups);

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn hex(data: &[u8]) -> String {
        data.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_initial_state() {
        let cipher = RotorCipher::new(0x1234_5678);
        assert_eq!(cipher.key, 0xc4d5_e650);
        assert_eq!(cipher.rotor(), 0x333e_5678);
    }

    #[test]
    fn test_bulk_processes_whole_blocks_only() {
        let mut cipher = RotorCipher::new(0x1234_5678);
        let input = [0u8; 70];
        let mut output = [0u8; 70];

        assert_eq!(cipher.transform_block(&input, &mut output), 64);
        assert_eq!(hex(&output[..12]), "78563e33e81b990d98adb117");
        assert_eq!(&output[64..], &[0u8; 6]);

        let tail = cipher.transform_final_block(&input[64..]);
        assert_eq!(hex(&tail), "782baf2a0000");
    }

    #[test]
    fn test_final_block_zeroes_partial_word() {
        let mut cipher = RotorCipher::new(0x1234_5678);
        let output = cipher.transform_final_block(&[0u8; 22]);
        assert_eq!(
            hex(&output),
            "78563e33e81b990d98adb11788120f20b855a4320000"
        );
    }

    #[test]
    fn test_short_input_is_not_transformed_in_bulk() {
        let mut cipher = RotorCipher::new(1);
        let rotor = cipher.rotor();
        let mut output = [0u8; 63];
        assert_eq!(cipher.transform_block(&[0xFF; 63], &mut output), 0);
        assert_eq!(cipher.rotor(), rotor);
    }

    #[test]
    fn test_bulk_and_final_share_keystream() {
        let input: Vec<u8> = (0..128u8).collect();

        let mut bulk = RotorCipher::new(0xDEAD_BEEF);
        let mut expected = vec![0u8; 128];
        bulk.transform_block(&input, &mut expected);

        let mut fin = RotorCipher::new(0xDEAD_BEEF);
        assert_eq!(fin.transform_final_block(&input), expected);
    }

    proptest! {
        #[test]
        fn prop_involution_on_whole_words(key in any::<u32>(),
                                          words in proptest::collection::vec(any::<u32>(), 0..64)) {
            let data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();

            let once = RotorCipher::new(key).transform_final_block(&data);
            let twice = RotorCipher::new(key).transform_final_block(&once);
            prop_assert_eq!(twice, data);
        }

        #[test]
        fn prop_bulk_boundary(key in any::<u32>(), len in 0usize..400) {
            let input = vec![0x5Au8; len];
            let mut output = vec![0u8; len];
            let processed = RotorCipher::new(key).transform_block(&input, &mut output);
            prop_assert_eq!(processed, len - len % ROTOR_BLOCK_SIZE);
        }
    }
}
