//! Layered entry streams
//!
//! An entry's payload is read through a stack of readers over a bounded
//! window on the archive source. Stored entries go through the position
//! cipher and, when the content header asks for it, the rotor cipher.
//! Compressed entries skip both ciphers and are inflated straight from the
//! window.

use crate::compression::CompressionFormat;
use crate::crypto::{CipherTransform, PositionCipher, RotorCipher};
use crate::entry::{EntryHeader, ENTRY_HEADER_SIZE};
use crate::error::{Error, FormatError, Result};
use crate::io::{RegionReader, SharedSource};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

/// Bytes pulled from the inner reader per refill
const CHUNK_SIZE: usize = 4096;

/// Applies a [`CipherTransform`] to everything read through it
///
/// Whole blocks are transformed as soon as they arrive. Whatever is left
/// when the inner reader reaches end of file goes through the final-block
/// transform.
pub struct CipherReader<R, T> {
    inner: R,
    transform: T,
    chunk: Box<[u8]>,
    pending: Vec<u8>,
    output: Vec<u8>,
    output_pos: usize,
    finished: bool,
}

impl<R: Read, T: CipherTransform> CipherReader<R, T> {
    /// Wrap `inner` with `transform`
    pub fn new(inner: R, transform: T) -> Self {
        let block = transform.block_size().max(1);
        Self {
            inner,
            transform,
            chunk: vec![0u8; CHUNK_SIZE / block * block + block].into_boxed_slice(),
            pending: Vec::new(),
            output: Vec::new(),
            output_pos: 0,
            finished: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        self.output.clear();
        self.output_pos = 0;

        let read = loop {
            match self.inner.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        if read == 0 {
            self.output = self.transform.transform_final_block(&self.pending);
            self.pending.clear();
            self.finished = true;
            return Ok(());
        }

        self.pending.extend_from_slice(&self.chunk[..read]);
        let block = self.transform.block_size().max(1);
        let whole = self.pending.len() / block * block;
        if whole > 0 {
            self.output.resize(whole, 0);
            let done = self
                .transform
                .transform_block(&self.pending[..whole], &mut self.output);
            self.output.truncate(done);
            self.pending.drain(..done);
        }
        Ok(())
    }
}

impl<R: Read, T: CipherTransform> Read for CipherReader<R, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.output_pos >= self.output.len() {
            if self.finished {
                return Ok(0);
            }
            self.refill()?;
        }

        let available = &self.output[self.output_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.output_pos += n;
        Ok(n)
    }
}

impl<R, T> fmt::Debug for CipherReader<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherReader")
            .field("pending", &self.pending.len())
            .field("buffered", &(self.output.len() - self.output_pos))
            .field("finished", &self.finished)
            .finish()
    }
}

/// Readable contents of one archive entry
///
/// Reads stop at the entry's length even if the layers below would yield
/// more. Running out of data before that length is a truncation error. The stream only moves forward: seeking is not supported, except
/// that `SeekFrom::Current(0)` reports the current position.
pub struct EntryReader<'a> {
    inner: Box<dyn Read + 'a>,
    length: u64,
    position: u64,
}

impl<'a> EntryReader<'a> {
    pub(crate) fn new(inner: Box<dyn Read + 'a>, length: u64) -> Self {
        Self {
            inner,
            length,
            position: 0,
        }
    }

    /// Number of bytes the stream yields in total
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the stream yields no bytes at all
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of bytes read so far
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.length - self.position;
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if want == 0 {
            return Ok(0);
        }

        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                Error::from(FormatError::Truncated("entry payload")),
            ));
        }
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for EntryReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Current(0) => Ok(self.position),
            _ => Err(Error::unsupported("entry streams cannot seek").into()),
        }
    }
}

impl fmt::Debug for EntryReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryReader")
            .field("length", &self.length)
            .field("position", &self.position)
            .finish()
    }
}

/// Compose the reader stack for the entry whose header sits at `offset`
pub(crate) fn open_entry<'a, R: Read + Seek + 'a>(
    source: &'a SharedSource<R>,
    offset: u64,
    header: &EntryHeader,
    compression: CompressionFormat,
) -> Result<EntryReader<'a>> {
    let start = offset + ENTRY_HEADER_SIZE as u64;
    let stored = u64::from(header.compressed_length());
    let mut region = RegionReader::new(source, start, stored);

    let mut cipher = PositionCipher::new(header.version, header.hash, header.seed());

    // The content header is not part of the payload but advances the cipher
    let header_size = header.content.header_size();
    if header_size > 0 {
        let mut skipped = vec![0u8; header_size];
        region
            .read_exact(&mut skipped)
            .map_err(|e| Error::from_read(e, "content header"))?;
        cipher.apply(&mut skipped);
    }

    // Compressed payloads are stored without either cipher layer
    if header.is_compressed() {
        log::trace!(
            "Entry 0x{:016X}: {:?} decompression over {} bytes at 0x{:X}",
            header.hash,
            compression,
            region.remaining(),
            start + header_size as u64
        );
        let layer = compression.decoder(region);
        return Ok(EntryReader::new(layer, u64::from(header.length())));
    }

    log::trace!(
        "Entry 0x{:016X}: position layer over {} bytes at 0x{:X}",
        header.hash,
        region.remaining(),
        start + header_size as u64
    );
    let mut layer: Box<dyn Read + 'a> = Box::new(CipherReader::new(region, cipher));

    if header.is_encrypted() {
        log::trace!("Entry 0x{:016X}: rotor layer", header.hash);
        layer = Box::new(CipherReader::new(layer, RotorCipher::new(header.content.key)));
    }

    let length = stored.saturating_sub(header_size as u64);
    Ok(EntryReader::new(layer, length))
}
