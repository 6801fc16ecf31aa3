//! # QAR - Fox Engine Archive Library
//!
//! A safe Rust reader for the SQAR archive container used by Fox Engine
//! titles. A QAR file bundles many payloads that are addressed by 64-bit
//! name hashes instead of literal paths. Stored payloads are obfuscated with
//! one or two XOR stream ciphers; compressed payloads are gzip members.
//!
//! ## Features
//!
//! - Version 1 and version 2 archives, including the chained v2 section table
//! - Lazy, cached entry header parsing
//! - Layered entry streams: position and rotor ciphers, or gzip decompression
//! - Seeded CityHash64 name hashing and reverse lookup through a pluggable
//!   [`NameResolver`]
//! - Memory-mapped I/O support
//!
//! ## Example
//!
//! ```no_run
//! use qar::{Archive, NameMap};
//! use std::io::Read;
//!
//! # fn main() -> Result<(), qar::Error> {
//! let mut archive = Archive::open("chunk0.dat")?;
//!
//! let mut names = NameMap::new();
//! names.add_extension("fpk");
//! names.add_file_name("/Assets/tpp/pack/player/motion/player2_resident_motion");
//! archive.set_name_resolver(names);
//!
//! for entry in archive.entries()? {
//!     println!("{} ({} bytes)", entry.full_name()?, entry.length()?);
//! }
//!
//! let mut data = Vec::new();
//! if let Some(entry) = archive.find("/Assets/tpp/pack/player/motion/player2_resident_motion.fpk")? {
//!     entry.open()?.read_to_end(&mut data)?;
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod archive;
pub mod compression;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod hash;
pub mod header;
pub mod io;
pub mod names;
pub mod section;
pub mod stream;

// Re-export commonly used types
pub use archive::{Archive, ArchiveEntry, ArchiveMode, Entries, OpenOptions};
pub use compression::CompressionFormat;
pub use entry::{ContentHeader, EntryHeader};
pub use error::{Error, FormatError, Result};
pub use header::ArchiveHeader;
pub use io::{ArchiveSource, Capabilities, WithCapabilities};
pub use names::{NameMap, NameResolver};
pub use stream::EntryReader;

/// QAR format version constants
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Original format: static section table, unseeded position cipher
    V1 = 1,
    /// Chained section table, seed-mixed position cipher, swapped sizes
    V2 = 2,
}

impl FormatVersion {
    /// Parse an unmasked header version word
    pub fn from_word(word: u32) -> Option<Self> {
        match word {
            1 => Some(FormatVersion::V1),
            2 => Some(FormatVersion::V2),
            _ => None,
        }
    }

    /// The on-disk version word
    pub fn as_word(self) -> u32 {
        self as u32
    }
}

/// QAR signature constants
pub mod signatures {
    /// Archive magic ('SQAR')
    pub const SQAR: u32 = 0x5241_5153;

    /// Content header announcing an 8-byte header and a rotor-encrypted payload
    pub const CONTENT_SHORT: u32 = 0xA0F8_EFE6;

    /// Content header announcing a 16-byte header and a rotor-encrypted payload
    pub const CONTENT_LONG: u32 = 0xE3F8_EFE6;
}

/// Shift applied to a section's block number to obtain a byte offset
#[inline]
pub fn block_shift(flags: u32) -> u32 {
    if flags & header::flags::LARGE_BLOCKS != 0 {
        12
    } else {
        10
    }
}
