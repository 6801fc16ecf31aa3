//! Cryptographic operations for QAR archives
//!
//! Two XOR stream ciphers obfuscate QAR contents. [`PositionCipher`] keys
//! its keystream on the absolute byte position inside one entry and is the
//! first layer of every payload. [`RotorCipher`] is a multiplicative
//! congruential keystream used as an optional second layer. Neither offers
//! any confidentiality; they exist to reproduce the on-disk transform.

mod constants;
pub mod position;
pub mod rotor;

pub use constants::{
    HEADER_MASKS, POSITION_TABLE, ROTOR_KEY_SCALE, ROTOR_MULTIPLIER, ROTOR_SALT,
    SECTION_ROTOR_SEED,
};
pub use position::PositionCipher;
pub use rotor::RotorCipher;

/// A stateful block transform in the shape the QAR ciphers are defined in
///
/// Both ciphers are symmetric, so the same transform encrypts and
/// decrypts. State advances with every call; an instance belongs to exactly
/// one logical byte stream.
pub trait CipherTransform {
    /// Granularity of [`transform_block`](Self::transform_block) in bytes
    fn block_size(&self) -> usize;

    /// Transform every whole block of `input` into `output`
    ///
    /// Bytes past the last whole block are left alone. Returns the number
    /// of bytes written. `output` must be at least as long as the
    /// processed prefix.
    fn transform_block(&mut self, input: &[u8], output: &mut [u8]) -> usize;

    /// Transform a trailing run of any length
    fn transform_final_block(&mut self, input: &[u8]) -> Vec<u8>;
}

#[inline]
pub(crate) fn read_word(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
pub(crate) fn write_word(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
