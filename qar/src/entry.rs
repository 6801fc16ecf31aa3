//! Entry headers and the optional content sub-header
//!
//! Every entry starts with a 32-byte masked header. Directly after it the
//! payload may begin with an 8- or 16-byte content header, itself hidden
//! under the position cipher, announcing a rotor-encrypted payload.

use crate::crypto::{PositionCipher, HEADER_MASKS};
use crate::error::{Error, FormatError, Result};
use crate::{signatures, FormatVersion};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use std::io::{self, Read, Write};

/// Size of an entry header on disk
pub const ENTRY_HEADER_SIZE: usize = 32;

/// Size of the content header probe, and of the short content header
pub const CONTENT_PROBE_SIZE: usize = 8;

/// Size of the long content header
pub const CONTENT_LONG_SIZE: usize = 16;

const M1: u32 = HEADER_MASKS[0];
const M2: u32 = HEADER_MASKS[1];
const M3: u32 = HEADER_MASKS[2];
const M4: u32 = HEADER_MASKS[3];

/// Decoded content header
///
/// A header that is not present decodes to all zeros.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentHeader {
    /// One of the content signatures, or 0 when absent
    pub signature: u32,

    /// Rotor cipher key, or 0 when absent
    pub key: u32,

    /// Payload size recorded by the 16-byte form
    pub size: Option<u32>,
}

impl ContentHeader {
    /// An 8-byte header carrying `key`
    pub fn short(key: u32) -> Self {
        Self {
            signature: signatures::CONTENT_SHORT,
            key,
            size: None,
        }
    }

    /// A 16-byte header carrying `key` and the payload size
    pub fn long(key: u32, size: u32) -> Self {
        Self {
            signature: signatures::CONTENT_LONG,
            key,
            size: Some(size),
        }
    }

    /// Whether the entry carries a content header at all
    pub fn is_present(&self) -> bool {
        self.header_size() != 0
    }

    /// Whether the payload is rotor encrypted
    pub fn is_encrypted(&self) -> bool {
        self.is_present()
    }

    /// Number of payload bytes taken by the header
    pub fn header_size(&self) -> usize {
        match self.signature {
            signatures::CONTENT_SHORT => CONTENT_PROBE_SIZE,
            signatures::CONTENT_LONG => CONTENT_LONG_SIZE,
            _ => 0,
        }
    }

    /// Probe for a content header at the reader's position
    ///
    /// `cipher` must be a fresh position cipher for the entry. On success it
    /// has advanced past the probed bytes.
    pub fn probe<R: Read>(reader: &mut R, cipher: &mut PositionCipher) -> Result<Self> {
        let mut block = [0u8; CONTENT_PROBE_SIZE];
        match reader.read_exact(&mut block) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        }
        cipher.apply(&mut block);

        let signature = LittleEndian::read_u32(&block[0..4]);
        let key = LittleEndian::read_u32(&block[4..8]);

        match signature {
            signatures::CONTENT_SHORT => Ok(Self::short(key)),
            signatures::CONTENT_LONG => {
                reader
                    .read_exact(&mut block)
                    .map_err(|e| Error::from_read(e, "content header"))?;
                cipher.apply(&mut block);

                let first = LittleEndian::read_u32(&block[0..4]);
                let second = LittleEndian::read_u32(&block[4..8]);
                if first != second {
                    return Err(FormatError::ContentSizeMismatch { first, second }.into());
                }
                Ok(Self::long(key, first))
            }
            _ => Ok(Self::default()),
        }
    }

    /// Plain on-disk bytes of the header, before position encryption
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.header_size());
        if !self.is_present() {
            return bytes;
        }
        bytes.extend_from_slice(&self.signature.to_le_bytes());
        bytes.extend_from_slice(&self.key.to_le_bytes());
        if let Some(size) = self.size {
            bytes.extend_from_slice(&size.to_le_bytes());
            bytes.extend_from_slice(&size.to_le_bytes());
        }
        bytes
    }
}

/// Decoded entry header
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Archive version the sizes are interpreted with
    pub version: FormatVersion,

    /// Entry identifier: name key plus extension key
    pub hash: u64,

    /// First size field
    pub size1: u32,

    /// Second size field
    pub size2: u32,

    /// Payload digest, also the source of the entry seed
    pub digest: [u8; 16],

    /// Content header found after the entry header
    pub content: ContentHeader,
}

impl EntryHeader {
    /// Read the 32-byte header followed by the content header probe
    pub fn read<R: Read>(reader: &mut R, version: FormatVersion) -> Result<Self> {
        let mut raw = [0u8; ENTRY_HEADER_SIZE];
        reader
            .read_exact(&mut raw)
            .map_err(|e| Error::from_read(e, "entry header"))?;

        let mut cursor = &raw[..];
        let hash_low = cursor.read_u32::<LittleEndian>()? ^ M1;
        let hash_high = cursor.read_u32::<LittleEndian>()? ^ M1;
        let size1 = cursor.read_u32::<LittleEndian>()? ^ M2;
        let size2 = cursor.read_u32::<LittleEndian>()? ^ M3;

        let mut digest = [0u8; 16];
        for (chunk, mask) in digest.chunks_exact_mut(4).zip([M4, M1, M1, M2]) {
            LittleEndian::write_u32(chunk, cursor.read_u32::<LittleEndian>()? ^ mask);
        }

        let mut header = Self {
            version,
            hash: (u64::from(hash_high) << 32) | u64::from(hash_low),
            size1,
            size2,
            digest,
            content: ContentHeader::default(),
        };

        let mut cipher = PositionCipher::new(version, header.hash, header.seed());
        header.content = ContentHeader::probe(reader, &mut cipher)?;

        if let Some(size) = header.content.size {
            let payload = u64::from(header.compressed_length())
                .saturating_sub(CONTENT_LONG_SIZE as u64);
            if u64::from(size) != payload {
                log::warn!(
                    "Entry 0x{:016X}: content header size {} does not match payload size {}",
                    header.hash,
                    size,
                    payload
                );
            }
        }

        log::trace!(
            "Entry 0x{:016X}: length={}, compressed_length={}, content_header={}",
            header.hash,
            header.length(),
            header.compressed_length(),
            header.content.header_size()
        );

        Ok(header)
    }

    /// Mask and write the 32-byte header
    ///
    /// The content header belongs to the payload and is not written here.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.hash as u32 ^ M1)?;
        writer.write_u32::<LittleEndian>((self.hash >> 32) as u32 ^ M1)?;
        writer.write_u32::<LittleEndian>(self.size1 ^ M2)?;
        writer.write_u32::<LittleEndian>(self.size2 ^ M3)?;
        for (chunk, mask) in self.digest.chunks_exact(4).zip([M4, M1, M1, M2]) {
            writer.write_u32::<LittleEndian>(LittleEndian::read_u32(chunk) ^ mask)?;
        }
        Ok(())
    }

    /// Uncompressed payload length
    pub fn length(&self) -> u32 {
        match self.version {
            FormatVersion::V1 => self.size1,
            FormatVersion::V2 => self.size2,
        }
    }

    /// Stored payload length, content header included
    pub fn compressed_length(&self) -> u32 {
        match self.version {
            FormatVersion::V1 => self.size2,
            FormatVersion::V2 => self.size1,
        }
    }

    /// Whether the payload is compressed
    pub fn is_compressed(&self) -> bool {
        self.length() != self.compressed_length()
    }

    /// Whether the payload is rotor encrypted
    pub fn is_encrypted(&self) -> bool {
        self.content.is_encrypted()
    }

    /// Position cipher seed: one half of the digest, picked by the hash
    pub fn seed(&self) -> u64 {
        let offset = ((self.hash as u32) % 2) as usize * 8;
        LittleEndian::read_u64(&self.digest[offset..offset + 8])
    }
}

/// A header read failure that can be reported again on later access
#[derive(Debug, Clone)]
pub(crate) enum HeaderFault {
    Format(FormatError),
    Io(io::ErrorKind, String),
}

impl HeaderFault {
    /// Capture an error worth caching; transient conditions are not
    pub(crate) fn capture(err: &Error) -> Option<Self> {
        match err {
            Error::Format(e) => Some(HeaderFault::Format(e.clone())),
            Error::Io(e) => Some(HeaderFault::Io(e.kind(), e.to_string())),
            _ => None,
        }
    }

    pub(crate) fn to_error(&self) -> Error {
        match self {
            HeaderFault::Format(e) => Error::Format(e.clone()),
            HeaderFault::Io(kind, message) => Error::Io(io::Error::new(*kind, message.clone())),
        }
    }
}

/// Lazy header state of one entry
#[derive(Debug, Clone)]
pub(crate) enum HeaderState {
    Unparsed,
    Parsed(EntryHeader),
    Failed(HeaderFault),
}

/// One section table slot and its lazily read header
#[derive(Debug)]
pub(crate) struct Entry {
    section: u64,
    offset: u64,
    state: Mutex<HeaderState>,
}

impl Entry {
    pub(crate) fn new(section: u64, flags: u32) -> Self {
        Self {
            section,
            offset: crate::section::section_offset(section, flags),
            state: Mutex::new(HeaderState::Unparsed),
        }
    }

    pub(crate) fn section(&self) -> u64 {
        self.section
    }

    /// Byte offset of the entry header
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Return the cached header, reading it with `load` on first use
    ///
    /// Format and I/O failures are cached and returned on every later call.
    pub(crate) fn header_with<F>(&self, load: F) -> Result<EntryHeader>
    where
        F: FnOnce(u64) -> Result<EntryHeader>,
    {
        let mut state = self.state.lock();
        match &*state {
            HeaderState::Parsed(header) => return Ok(header.clone()),
            HeaderState::Failed(fault) => return Err(fault.to_error()),
            HeaderState::Unparsed => {}
        }

        match load(self.offset) {
            Ok(header) => {
                *state = HeaderState::Parsed(header.clone());
                Ok(header)
            }
            Err(err) => {
                if let Some(fault) = HeaderFault::capture(&err) {
                    log::debug!("Entry at 0x{:X} failed to parse: {}", self.offset, err);
                    *state = HeaderState::Failed(fault);
                }
                Err(err)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_parsed(&self) -> bool {
        matches!(*self.state.lock(), HeaderState::Parsed(_))
    }
}
