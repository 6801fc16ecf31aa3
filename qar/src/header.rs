//! QAR archive header parsing

use crate::crypto::HEADER_MASKS;
use crate::error::{Error, FormatError, Result};
use crate::{signatures, FormatVersion};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Size of the archive header on disk
pub const ARCHIVE_HEADER_SIZE: usize = 32;

/// Size of one record in the table that follows the section table
pub const UNKNOWN_RECORD_SIZE: u64 = 16;

/// Header flag bits
pub mod flags {
    /// Section block numbers count 4 KiB blocks instead of 1 KiB blocks
    pub const LARGE_BLOCKS: u32 = 0x800;
}

const M1: u32 = HEADER_MASKS[0];
const M2: u32 = HEADER_MASKS[1];
const M3: u32 = HEADER_MASKS[2];
const M4: u32 = HEADER_MASKS[3];

/// Decoded QAR archive header
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Archive flags, see [`flags`]
    pub flags: u32,

    /// Number of entries in the section table
    pub file_count: u32,

    /// Number of 16-byte records following the section table
    pub unknown_count: u32,

    /// End of the block area
    pub block_file_end: u32,

    /// Offset of the first entry
    pub offset_first_file: u32,

    /// Format version
    pub version: FormatVersion,
}

impl ArchiveHeader {
    /// Create an empty header for the given version
    pub fn new(version: FormatVersion) -> Self {
        Self {
            flags: 0,
            file_count: 0,
            unknown_count: 0,
            block_file_end: 0,
            offset_first_file: 0,
            version,
        }
    }

    /// Read and unmask a header from the start of an archive
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; ARCHIVE_HEADER_SIZE];
        reader
            .read_exact(&mut raw)
            .map_err(|e| Error::from_read(e, "archive header"))?;

        let mut cursor = &raw[..];
        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != signatures::SQAR {
            return Err(FormatError::InvalidSignature(signature).into());
        }

        let flags = cursor.read_u32::<LittleEndian>()? ^ M1;
        let file_count = cursor.read_u32::<LittleEndian>()? ^ M2;
        let unknown_count = cursor.read_u32::<LittleEndian>()? ^ M3;
        let block_file_end = cursor.read_u32::<LittleEndian>()? ^ M4;
        let offset_first_file = cursor.read_u32::<LittleEndian>()? ^ M1;
        let version_word = cursor.read_u32::<LittleEndian>()? ^ M1;
        let reserved = cursor.read_u32::<LittleEndian>()? ^ M2;

        let version = FormatVersion::from_word(version_word)
            .ok_or(FormatError::UnsupportedVersion(version_word))?;
        if reserved != 0 {
            return Err(FormatError::NonZeroReserved(reserved).into());
        }

        log::debug!(
            "QAR v{} header: flags=0x{:08X}, files={}, unknown={}, first_file=0x{:X}",
            version_word,
            flags,
            file_count,
            unknown_count,
            offset_first_file
        );

        Ok(Self {
            flags,
            file_count,
            unknown_count,
            block_file_end,
            offset_first_file,
            version,
        })
    }

    /// Mask and write the header
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(signatures::SQAR)?;
        writer.write_u32::<LittleEndian>(self.flags ^ M1)?;
        writer.write_u32::<LittleEndian>(self.file_count ^ M2)?;
        writer.write_u32::<LittleEndian>(self.unknown_count ^ M3)?;
        writer.write_u32::<LittleEndian>(self.block_file_end ^ M4)?;
        writer.write_u32::<LittleEndian>(self.offset_first_file ^ M1)?;
        writer.write_u32::<LittleEndian>(self.version.as_word() ^ M1)?;
        writer.write_u32::<LittleEndian>(M2)?;
        Ok(())
    }

    /// Shift turning a section block number into a byte offset
    pub fn block_shift(&self) -> u32 {
        crate::block_shift(self.flags)
    }

    /// Total size of the records that follow the section table
    pub fn unknown_table_size(&self) -> u64 {
        u64::from(self.unknown_count) * UNKNOWN_RECORD_SIZE
    }
}
