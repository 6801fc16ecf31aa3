//! I/O abstractions for QAR archives
//!
//! An archive owns one seekable byte source behind a lock. Every read made
//! on behalf of an entry seeks to an absolute offset inside that lock and
//! puts the cursor back afterwards, so headers and any number of open entry
//! readers can share the source.

use crate::error::{Error, Result};
use bitflags::bitflags;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};

bitflags! {
    /// Operations a byte source supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Bytes can be read
        const READ = 0x01;
        /// Bytes can be written
        const WRITE = 0x02;
        /// The cursor can be repositioned
        const SEEK = 0x04;
    }
}

/// A byte source an archive can be opened on
///
/// Rust encodes read and seek support in the type, but whether a source may
/// also be written to is a property of the value. Sources report what they
/// allow so the archive can check it against the requested mode before
/// touching any byte.
pub trait ArchiveSource: Read + Seek {
    /// Operations this source permits
    fn capabilities(&self) -> Capabilities;
}

impl ArchiveSource for File {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }
}

impl ArchiveSource for Cursor<Vec<u8>> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }
}

impl ArchiveSource for Cursor<&mut Vec<u8>> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }
}

impl ArchiveSource for Cursor<&[u8]> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ | Capabilities::SEEK
    }
}

impl ArchiveSource for Cursor<&Vec<u8>> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ | Capabilities::SEEK
    }
}

#[cfg(feature = "mmap")]
impl ArchiveSource for Cursor<memmap2::Mmap> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ | Capabilities::SEEK
    }
}

impl<R: ArchiveSource> ArchiveSource for BufReader<R> {
    fn capabilities(&self) -> Capabilities {
        self.get_ref().capabilities() - Capabilities::WRITE
    }
}

/// Wrap a source and declare its capabilities explicitly
///
/// Useful to open a read-only view of a writable source, or to describe
/// sources that have no [`ArchiveSource`] impl of their own.
#[derive(Debug)]
pub struct WithCapabilities<R> {
    inner: R,
    capabilities: Capabilities,
}

impl<R> WithCapabilities<R> {
    /// Wrap `inner`, reporting `capabilities`
    pub fn new(inner: R, capabilities: Capabilities) -> Self {
        Self {
            inner,
            capabilities,
        }
    }

    /// Unwrap the source
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Borrow the source
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read> Read for WithCapabilities<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for WithCapabilities<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl<R: Write> Write for WithCapabilities<R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<R: Read + Seek> ArchiveSource for WithCapabilities<R> {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

/// Restores the cursor of a source when dropped
pub(crate) struct PositionGuard<'a, R: Seek> {
    source: &'a mut R,
    saved: u64,
}

impl<'a, R: Seek> PositionGuard<'a, R> {
    pub(crate) fn new(source: &'a mut R) -> io::Result<Self> {
        let saved = source.stream_position()?;
        Ok(Self { source, saved })
    }
}

impl<R: Seek> Deref for PositionGuard<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.source
    }
}

impl<R: Seek> DerefMut for PositionGuard<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.source
    }
}

impl<R: Seek> Drop for PositionGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.source.seek(SeekFrom::Start(self.saved)) {
            log::warn!("Failed to restore source position {}: {}", self.saved, e);
        }
    }
}

/// The single lock around an archive's byte source
#[derive(Debug)]
pub(crate) struct SharedSource<R> {
    inner: Mutex<Option<R>>,
}

impl<R: Read + Seek> SharedSource<R> {
    pub(crate) fn new(source: R) -> Self {
        Self {
            inner: Mutex::new(Some(source)),
        }
    }

    /// Run `f` on the source with its cursor restored afterwards
    pub(crate) fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut R) -> Result<T>,
    {
        let mut slot = self.inner.lock();
        let source = slot.as_mut().ok_or(Error::Closed)?;
        let mut guard = PositionGuard::new(source)?;
        f(&mut *guard)
    }

    /// Read up to `buf.len()` bytes from the absolute `offset`
    ///
    /// Returns fewer bytes only at the end of the source.
    pub(crate) fn read_upto_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.with(|source| {
            source.seek(SeekFrom::Start(offset))?;
            let mut filled = 0;
            while filled < buf.len() {
                match source.read(&mut buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(filled)
        })
    }

    /// Total length of the source
    pub(crate) fn len(&self) -> Result<u64> {
        self.with(|source| Ok(source.seek(SeekFrom::End(0))?))
    }

    /// Take the source out, closing it for every later access
    pub(crate) fn take(&self) -> Option<R> {
        self.inner.lock().take()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }

    pub(crate) fn into_inner(self) -> Option<R> {
        self.inner.into_inner()
    }
}

/// A bounded window `[start, start + len)` of a shared source
#[derive(Debug)]
pub(crate) struct RegionReader<'a, R> {
    source: &'a SharedSource<R>,
    start: u64,
    len: u64,
    pos: u64,
}

impl<'a, R: Read + Seek> RegionReader<'a, R> {
    pub(crate) fn new(source: &'a SharedSource<R>, start: u64, len: u64) -> Self {
        Self {
            source,
            start,
            len,
            pos: 0,
        }
    }

    /// Bytes left before the end of the window
    pub(crate) fn remaining(&self) -> u64 {
        self.len - self.pos
    }
}

impl<R: Read + Seek> Read for RegionReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = buf.len().min(usize::try_from(self.remaining()).unwrap_or(usize::MAX));
        if want == 0 {
            return Ok(0);
        }

        let read = self
            .source
            .read_upto_at(self.start + self.pos, &mut buf[..want])?;
        self.pos += read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cursor_capabilities() {
        let data = vec![0u8; 4];
        assert_eq!(Cursor::new(data.clone()).capabilities(), Capabilities::all());
        assert_eq!(
            Cursor::new(&data[..]).capabilities(),
            Capabilities::READ | Capabilities::SEEK
        );
        assert_eq!(
            BufReader::new(Cursor::new(data)).capabilities(),
            Capabilities::READ | Capabilities::SEEK
        );
    }

    #[test]
    fn test_with_capabilities() {
        let source = WithCapabilities::new(Cursor::new(vec![1u8, 2, 3]), Capabilities::READ);
        assert_eq!(source.capabilities(), Capabilities::READ);
        assert_eq!(source.into_inner().into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_upto_at_restores_position() {
        let mut cursor = Cursor::new((0u8..32).collect::<Vec<_>>());
        cursor.set_position(5);
        let shared = SharedSource::new(cursor);

        let mut buf = [0u8; 4];
        assert_eq!(shared.read_upto_at(10, &mut buf).unwrap(), 4);
        assert_eq!(buf, [10, 11, 12, 13]);
        assert_eq!(shared.into_inner().unwrap().position(), 5);
    }

    #[test]
    fn test_read_upto_at_stops_at_end() {
        let shared = SharedSource::new(Cursor::new(vec![7u8; 10]));
        let mut buf = [0u8; 8];
        assert_eq!(shared.read_upto_at(6, &mut buf).unwrap(), 4);
        assert_eq!(shared.read_upto_at(20, &mut buf).unwrap(), 0);
        assert_eq!(shared.len().unwrap(), 10);
    }

    #[test]
    fn test_closed_source() {
        let shared = SharedSource::new(Cursor::new(vec![0u8; 4]));
        assert!(shared.take().is_some());
        assert!(shared.is_closed());
        assert!(matches!(shared.read_upto_at(0, &mut [0u8; 1]), Err(Error::Closed)));
    }

    #[test]
    fn test_region_reader_clamps() {
        let shared = SharedSource::new(Cursor::new((0u8..64).collect::<Vec<_>>()));
        let mut region = RegionReader::new(&shared, 60, 10);
        let mut out = Vec::new();
        region.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![60, 61, 62, 63]);

        let mut region = RegionReader::new(&shared, 8, 3);
        let mut out = Vec::new();
        region.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![8, 9, 10]);
        assert_eq!(region.remaining(), 0);
    }
}
