//! Section table decoding
//!
//! The section table follows the archive header and holds one masked
//! 8-byte record per entry. The upper 24 bits of a decoded record give the
//! block number of the entry's header. Version 1 masks every record with a
//! fixed pattern; version 2 chains a rotor through the decoded records so
//! each one depends on all records before it.

use crate::crypto::{HEADER_MASKS, SECTION_ROTOR_SEED};
use crate::error::{Error, Result};
use crate::FormatVersion;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Size of one section record on disk
pub const SECTION_SIZE: u64 = 8;

/// Bit position of the block number inside a section
const BLOCK_NUMBER_SHIFT: u32 = 40;

/// Byte offset of an entry header given its section and the archive flags
#[inline]
pub fn section_offset(section: u64, flags: u32) -> u64 {
    (section >> BLOCK_NUMBER_SHIFT) << crate::block_shift(flags)
}

/// Sequential decoder for the section table
///
/// The decoder is stateful: records must be fed in table order, and a
/// single decoder handles exactly one table.
#[derive(Debug, Clone)]
pub struct SectionDecoder {
    version: FormatVersion,
    index: u32,
    rotor: u32,
}

impl SectionDecoder {
    /// Create a decoder positioned at the first record
    pub fn new(version: FormatVersion) -> Self {
        Self {
            version,
            index: 0,
            rotor: SECTION_ROTOR_SEED,
        }
    }

    /// Number of records processed so far
    pub fn index(&self) -> u32 {
        self.index
    }

    fn masks(&self) -> (u32, u32) {
        let first_offset = self.index.wrapping_mul(8);
        let second_offset = first_offset.wrapping_add(4);

        let base = match self.version {
            FormatVersion::V1 => self.index,
            FormatVersion::V2 => self.rotor,
        };

        let first = base.wrapping_add(first_offset / 5) % 4;
        let second = base.wrapping_add(second_offset / 5) % 4;
        (HEADER_MASKS[first as usize], HEADER_MASKS[second as usize])
    }

    /// Advance past a record whose decoded words are `low` and `high`
    fn advance(&mut self, low: u32, high: u32) {
        if self.version == FormatVersion::V2 {
            self.rotor ^= low.rotate_right((high / 256) % 19);
        }
        self.index = self.index.wrapping_add(1);
    }

    /// Decode the next record from its two stored words
    pub fn decode(&mut self, first: u32, second: u32) -> u64 {
        let (mask1, mask2) = self.masks();
        let low = first ^ mask1;
        let high = second ^ mask2;
        self.advance(low, high);
        (u64::from(high) << 32) | u64::from(low)
    }

    /// Encode the next record, producing its two stored words
    ///
    /// This is the exact inverse of [`decode`](Self::decode) for a decoder
    /// in the same state.
    pub fn encode(&mut self, section: u64) -> (u32, u32) {
        let low = section as u32;
        let high = (section >> 32) as u32;
        let (mask1, mask2) = self.masks();
        self.advance(low, high);
        (low ^ mask1, high ^ mask2)
    }

    /// Read and decode the next record
    pub fn read_next<R: Read>(&mut self, reader: &mut R) -> Result<u64> {
        let first = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::from_read(e, "section table"))?;
        let second = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::from_read(e, "section table"))?;
        Ok(self.decode(first, second))
    }

    /// Encode and write the next record
    pub fn write_next<W: Write>(&mut self, writer: &mut W, section: u64) -> Result<()> {
        let (first, second) = self.encode(section);
        writer.write_u32::<LittleEndian>(first)?;
        writer.write_u32::<LittleEndian>(second)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_section_offset() {
        let section = 0x0000_0300_dead_beef_u64;
        assert_eq!(section_offset(section, 0), 3 << 10);
        assert_eq!(section_offset(section, 0x800), 3 << 12);
        assert_eq!(section_offset(u64::MAX, 0), 0xFF_FFFF << 10);
    }

    #[test]
    fn test_v1_masks_depend_on_index_only() {
        let mut decoder = SectionDecoder::new(FormatVersion::V1);
        // Record 0: offsets 0 and 4 both select mask 0
        assert_eq!(decoder.decode(0, 0), 0x4144_1043_4144_1043);
        // Record 1: (1 + 8/5) % 4 = 2, (1 + 12/5) % 4 = 3
        assert_eq!(decoder.decode(0, 0), 0x532C_7319_D056_08C3);
        assert_eq!(decoder.index(), 2);
    }

    #[test]
    fn test_v2_first_record_uses_seed() {
        let mut decoder = SectionDecoder::new(FormatVersion::V2);
        // 0xA2C18EC3 % 4 = 3, for both words
        assert_eq!(decoder.decode(0, 0), 0x532C_7319_532C_7319);
    }

    #[test]
    fn test_v2_rotor_chains_records() {
        let sections = [0x0000_0100_0000_0001u64, 0x0000_0200_0000_0002, 0x0000_0300_0000_0003];

        let mut encoder = SectionDecoder::new(FormatVersion::V2);
        let mut buffer = Vec::new();
        for section in sections {
            encoder.write_next(&mut buffer, section).unwrap();
        }

        let mut decoder = SectionDecoder::new(FormatVersion::V2);
        let mut reader = Cursor::new(&buffer);
        for section in sections {
            assert_eq!(decoder.read_next(&mut reader).unwrap(), section);
        }
        assert_eq!(decoder.rotor, encoder.rotor);
        assert_ne!(decoder.rotor, SECTION_ROTOR_SEED);
    }

    #[test]
    fn test_truncated_table() {
        let mut decoder = SectionDecoder::new(FormatVersion::V1);
        let err = decoder.read_next(&mut Cursor::new([0u8; 6])).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::Truncated("section table"))
        ));
    }

    proptest! {
        #[test]
        fn prop_encode_decode_inverse(sections in proptest::collection::vec(any::<u64>(), 0..64),
                                      v2 in any::<bool>()) {
            let version = if v2 { FormatVersion::V2 } else { FormatVersion::V1 };
            let mut encoder = SectionDecoder::new(version);
            let mut decoder = SectionDecoder::new(version);
            for section in sections {
                let (first, second) = encoder.encode(section);
                prop_assert_eq!(decoder.decode(first, second), section);
            }
        }
    }
}
