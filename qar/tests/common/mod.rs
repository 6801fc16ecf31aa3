//! Shared fixtures: hand-encoded QAR archives

#![allow(dead_code)]

use qar::crypto::{CipherTransform, PositionCipher, RotorCipher};
use qar::header::{flags, ARCHIVE_HEADER_SIZE};
use qar::section::SectionDecoder;
use qar::{ArchiveHeader, CompressionFormat, ContentHeader, EntryHeader, FormatVersion};

pub const MOTION: &str = "/Assets/tpp/pack/player/motion/player2_resident_motion.fpk";
pub const ICON: &str = "/Assets/tpp/ui/texture/icon.ftex";
pub const SCRIPT: &str = "/Assets/tpp/level/mission2/story/s10010/s10010_sequence.lua";

/// Route library logs to the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Bytes that do not start with a content signature once deciphered
pub fn sample_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[derive(Debug, Clone)]
pub struct FixtureEntry {
    pub path: String,
    pub payload: Vec<u8>,
    pub key: Option<u32>,
    pub long_header: bool,
    pub long_sizes: Option<(u32, u32)>,
    pub compression: Option<CompressionFormat>,
    pub digest: [u8; 16],
}

impl FixtureEntry {
    pub fn new(path: &str, payload: &[u8]) -> Self {
        let mut digest = [0u8; 16];
        for (i, byte) in digest.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(17) ^ payload.len() as u8;
        }
        Self {
            path: path.to_string(),
            payload: payload.to_vec(),
            key: None,
            long_header: false,
            long_sizes: None,
            compression: None,
            digest,
        }
    }

    pub fn encrypted(mut self, key: u32) -> Self {
        self.key = Some(key);
        self
    }

    pub fn long_header(mut self) -> Self {
        self.long_header = true;
        self
    }

    /// Force the two size fields of a long content header
    pub fn long_sizes(mut self, first: u32, second: u32) -> Self {
        self.long_header = true;
        self.long_sizes = Some((first, second));
        self
    }

    pub fn compressed(mut self, format: CompressionFormat) -> Self {
        self.compression = Some(format);
        self
    }

    pub fn hash(&self) -> u64 {
        qar::hash::entry_hash(&self.path)
    }

    fn encode(&self, version: FormatVersion) -> Vec<u8> {
        // Compressed bodies are stored as-is, with no content header
        let (stored, length) = match self.compression {
            Some(format) => (
                format.compress(&self.payload).unwrap(),
                Some(self.payload.len() as u32),
            ),
            None => (self.encode_stored(), None),
        };

        let compressed_length = stored.len() as u32;
        let length = length.unwrap_or(compressed_length);
        let (size1, size2) = match version {
            FormatVersion::V1 => (length, compressed_length),
            FormatVersion::V2 => (compressed_length, length),
        };

        let header = EntryHeader {
            version,
            hash: self.hash(),
            size1,
            size2,
            digest: self.digest,
            content: ContentHeader::default(),
        };

        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        let mut stored = stored;
        if self.compression.is_none() {
            PositionCipher::new(version, header.hash, header.seed()).apply(&mut stored);
        }
        out.extend(stored);
        out
    }

    /// Content header plus body, before the position cipher
    fn encode_stored(&self) -> Vec<u8> {
        let content = match self.key {
            Some(key) if self.long_header => ContentHeader::long(key, self.payload.len() as u32),
            Some(key) => ContentHeader::short(key),
            None => ContentHeader::default(),
        };
        let body = match self.key {
            Some(key) => rotor(key, &self.payload),
            None => self.payload.clone(),
        };

        let mut stored = content.to_bytes();
        if let Some((first, second)) = self.long_sizes {
            stored[8..12].copy_from_slice(&first.to_le_bytes());
            stored[12..16].copy_from_slice(&second.to_le_bytes());
        }
        stored.extend(body);
        stored
    }
}

/// Apply the rotor cipher the way an entry stream partitions it
pub fn rotor(key: u32, data: &[u8]) -> Vec<u8> {
    let mut cipher = RotorCipher::new(key);
    let whole = data.len() / 64 * 64;
    let mut out = vec![0u8; whole];
    cipher.transform_block(&data[..whole], &mut out);
    out.extend(cipher.transform_final_block(&data[whole..]));
    out
}

#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    version: FormatVersion,
    flags: u32,
    unknown_count: u32,
    entries: Vec<FixtureEntry>,
}

/// An encoded archive and where each entry header landed
#[derive(Debug, Clone)]
pub struct Built {
    pub bytes: Vec<u8>,
    pub offsets: Vec<u64>,
}

impl ArchiveBuilder {
    pub fn new(version: FormatVersion) -> Self {
        Self {
            version,
            flags: 0,
            unknown_count: 0,
            entries: Vec::new(),
        }
    }

    pub fn large_blocks(mut self) -> Self {
        self.flags |= flags::LARGE_BLOCKS;
        self
    }

    pub fn unknown_records(mut self, count: u32) -> Self {
        self.unknown_count = count;
        self
    }

    pub fn add(mut self, path: &str, payload: &[u8]) -> Self {
        self.entries.push(FixtureEntry::new(path, payload));
        self
    }

    pub fn entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_offsets().bytes
    }

    pub fn build_with_offsets(&self) -> Built {
        let shift = qar::block_shift(self.flags);
        let block = 1u64 << shift;

        let tables_end = ARCHIVE_HEADER_SIZE as u64
            + 8 * self.entries.len() as u64
            + 16 * u64::from(self.unknown_count);

        let mut body = Vec::new();
        let mut offsets = Vec::new();
        let mut next = tables_end.div_ceil(block) * block;
        for entry in &self.entries {
            let encoded = entry.encode(self.version);
            let len = encoded.len() as u64;
            offsets.push(next);
            body.push((next, encoded));
            next = (next + len).div_ceil(block) * block;
        }

        let header = ArchiveHeader {
            flags: self.flags,
            file_count: self.entries.len() as u32,
            unknown_count: self.unknown_count,
            block_file_end: (next >> shift) as u32,
            offset_first_file: offsets.first().copied().unwrap_or(0) as u32,
            version: self.version,
        };

        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();

        let mut decoder = SectionDecoder::new(self.version);
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            let section = ((offset >> shift) << 40) | (entry.hash() & 0xFF_FFFF_FFFF);
            decoder.write_next(&mut bytes, section).unwrap();
        }
        bytes.extend(std::iter::repeat(0xEEu8).take(16 * self.unknown_count as usize));

        for (offset, encoded) in body {
            bytes.resize(offset as usize, 0);
            bytes.extend(encoded);
        }

        Built { bytes, offsets }
    }
}
