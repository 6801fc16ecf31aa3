//! QAR archive handling

use crate::compression::CompressionFormat;
use crate::entry::{Entry, EntryHeader};
use crate::error::{Error, Result};
use crate::hash::path::{entry_hash, extension_key, file_name_key};
use crate::header::ArchiveHeader;
use crate::io::{ArchiveSource, Capabilities, SharedSource};
use crate::names::{base_name, display_name, NameMap, NameResolver};
use crate::section::SectionDecoder;
use crate::stream::{open_entry, EntryReader};
use crate::FormatVersion;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// How an archive is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ArchiveMode {
    /// Read an existing archive
    #[default]
    Read,
    /// Start a new archive
    Create,
    /// Read an existing archive, or start one on an empty source
    Update,
}

impl ArchiveMode {
    /// Capabilities the source must report for this mode
    pub fn required_capabilities(self) -> Capabilities {
        match self {
            ArchiveMode::Read => Capabilities::READ | Capabilities::SEEK,
            ArchiveMode::Create => Capabilities::WRITE,
            ArchiveMode::Update => Capabilities::all(),
        }
    }
}

/// Options for opening QAR archives
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    mode: ArchiveMode,
    compression: CompressionFormat,
    preload_headers: bool,
}

impl OpenOptions {
    /// Create new default options: read mode, gzip payloads, lazy headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the archive mode
    pub fn mode(mut self, mode: ArchiveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the framing of compressed payloads
    pub fn compression(mut self, compression: CompressionFormat) -> Self {
        self.compression = compression;
        self
    }

    /// Read every entry header while opening instead of on first access
    pub fn preload_headers(mut self, preload: bool) -> Self {
        self.preload_headers = preload;
        self
    }

    /// Open the archive at `path` with these options
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Archive<BufReader<File>>> {
        let path = path.as_ref();
        log::debug!("Opening QAR archive: {:?}", path);
        let file = File::open(path)?;
        Archive::with_options(BufReader::new(file), self)
    }
}

/// A QAR archive over a byte source
pub struct Archive<R> {
    source: SharedSource<R>,
    options: OpenOptions,
    header: Option<ArchiveHeader>,
    entries: Vec<Entry>,
    resolver: Box<dyn NameResolver + Send + Sync>,
}

impl Archive<BufReader<File>> {
    /// Open an existing archive file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::new().open(path)
    }
}

#[cfg(feature = "mmap")]
impl Archive<io::Cursor<memmap2::Mmap>> {
    /// Open an existing archive file through a read-only memory map
    #[cfg_attr(docsrs, doc(cfg(feature = "mmap")))]
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the map is read-only; the caller must not modify the file
        // while the archive is alive.
        let map = unsafe { memmap2::MmapOptions::new().map(&file)? };
        log::debug!("Memory-mapped {:?} ({} bytes)", path.as_ref(), map.len());
        Archive::new(io::Cursor::new(map))
    }
}

impl<R: ArchiveSource> Archive<R> {
    /// Open `source` for reading
    pub fn new(source: R) -> Result<Self> {
        Self::with_options(source, OpenOptions::new())
    }

    /// Open `source` with the given options
    ///
    /// The source's capabilities are checked against the mode before any
    /// byte is read.
    pub fn with_options(source: R, options: OpenOptions) -> Result<Self> {
        let required = options.mode.required_capabilities();
        let missing = required - source.capabilities();
        if !missing.is_empty() {
            return Err(Error::MissingCapability {
                mode: options.mode,
                missing,
            });
        }

        let mut archive = Self {
            source: SharedSource::new(source),
            options,
            header: None,
            entries: Vec::new(),
            resolver: Box::new(NameMap::new()),
        };

        let read_existing = match archive.options.mode {
            ArchiveMode::Read => true,
            ArchiveMode::Create => false,
            ArchiveMode::Update => archive.source.len()? > 0,
        };

        if read_existing {
            archive.read_tables()?;
            if archive.options.preload_headers {
                archive.preload()?;
            }
        } else {
            log::debug!("Opened empty QAR archive in {:?} mode", archive.options.mode);
        }

        Ok(archive)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Read the header, the section table and the records after it
    fn read_tables(&mut self) -> Result<()> {
        let (header, sections) = self.source.with(|source| {
            source.seek(SeekFrom::Start(0))?;
            let header = ArchiveHeader::read(source)?;

            let mut decoder = SectionDecoder::new(header.version);
            let sections = (0..header.file_count)
                .map(|_| decoder.read_next(source))
                .collect::<Result<Vec<u64>>>()?;

            let unknown = header.unknown_table_size();
            let skipped = io::copy(&mut source.by_ref().take(unknown), &mut io::sink())?;
            if skipped != unknown {
                return Err(crate::FormatError::Truncated("record table").into());
            }

            Ok((header, sections))
        })?;

        log::debug!(
            "Decoded {} sections (v{}, block shift {})",
            sections.len(),
            header.version.as_word(),
            header.block_shift()
        );

        self.entries = sections
            .into_iter()
            .map(|section| Entry::new(section, header.flags))
            .collect();
        self.header = Some(header);
        Ok(())
    }

    fn preload(&self) -> Result<()> {
        for entry in self.entries()? {
            entry.header()?;
        }
        log::debug!("Preloaded {} entry headers", self.entries.len());
        Ok(())
    }

    fn read_entry_header(&self, offset: u64, version: FormatVersion) -> Result<EntryHeader> {
        self.source.with(|source| {
            source.seek(SeekFrom::Start(offset))?;
            EntryHeader::read(source, version)
        })
    }

    /// Version of an archive that can be read
    fn readable_version(&self) -> Result<FormatVersion> {
        if self.source.is_closed() {
            return Err(Error::Closed);
        }
        match &self.header {
            Some(header) => Ok(header.version),
            None => Err(Error::unsupported(format!(
                "archive opened in {:?} mode has no entries to read",
                self.options.mode
            ))),
        }
    }

    /// Iterate over all entries in table order
    pub fn entries(&self) -> Result<Entries<'_, R>> {
        self.readable_version()?;
        Ok(Entries {
            archive: self,
            index: 0,
        })
    }

    /// Entry at `index` in table order
    pub fn entry(&self, index: usize) -> Result<Option<ArchiveEntry<'_, R>>> {
        self.readable_version()?;
        Ok(self.entries.get(index).map(|entry| ArchiveEntry {
            archive: self,
            entry,
            index,
        }))
    }

    /// Find the entry stored under an asset path
    ///
    /// Entry headers are read as needed. A header that fails to parse stops
    /// the search with its error.
    pub fn find(&self, path: &str) -> Result<Option<ArchiveEntry<'_, R>>> {
        let target = entry_hash(path);
        for entry in self.entries()? {
            let hash = entry.hash()?;
            if file_name_key(hash) == file_name_key(target)
                && extension_key(hash) == extension_key(target)
            {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Start a new entry
    ///
    /// Writing archives is not supported; this always fails.
    pub fn create_entry(&mut self, name: &str) -> Result<ArchiveEntry<'_, R>> {
        if self.source.is_closed() {
            return Err(Error::Closed);
        }
        if self.options.mode == ArchiveMode::Read {
            return Err(Error::unsupported("archive was opened read-only"));
        }
        if name.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "entry name cannot be empty",
            )));
        }
        Err(Error::unsupported("writing QAR entries"))
    }

    /// Number of entries in the section table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decoded archive header, absent for archives started empty
    pub fn header(&self) -> Option<&ArchiveHeader> {
        self.header.as_ref()
    }

    /// Format version, absent for archives started empty
    pub fn version(&self) -> Option<FormatVersion> {
        self.header.as_ref().map(|header| header.version)
    }

    /// Mode the archive was opened in
    pub fn mode(&self) -> ArchiveMode {
        self.options.mode
    }

    /// Replace the resolver used for entry names
    pub fn set_name_resolver<N>(&mut self, resolver: N)
    where
        N: NameResolver + Send + Sync + 'static,
    {
        self.resolver = Box::new(resolver);
    }

    /// Resolver used for entry names
    pub fn name_resolver(&self) -> &dyn NameResolver {
        &*self.resolver
    }

    /// Release the source; every later operation fails with [`Error::Closed`]
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::debug!("Closed QAR archive");
        }
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.source.is_closed()
    }

    /// Unwrap the source, or `None` if the archive was closed
    pub fn into_inner(self) -> Option<R> {
        self.source.into_inner()
    }
}

impl<R> fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("mode", &self.options.mode)
            .field("header", &self.header)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

/// Iterator over the entries of an archive
pub struct Entries<'a, R> {
    archive: &'a Archive<R>,
    index: usize,
}

impl<'a, R: Read + Seek> Iterator for Entries<'a, R> {
    type Item = ArchiveEntry<'a, R>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.archive.entries.get(self.index)?;
        let item = ArchiveEntry {
            archive: self.archive,
            entry,
            index: self.index,
        };
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.archive.entries.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<R: Read + Seek> ExactSizeIterator for Entries<'_, R> {}

impl<R> fmt::Debug for Entries<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entries")
            .field("index", &self.index)
            .field("len", &self.archive.entries.len())
            .finish()
    }
}

/// A view of one entry, borrowing its archive
pub struct ArchiveEntry<'a, R> {
    archive: &'a Archive<R>,
    entry: &'a Entry,
    index: usize,
}

impl<R> Clone for ArchiveEntry<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for ArchiveEntry<'_, R> {}

impl<'a, R: Read + Seek> ArchiveEntry<'a, R> {
    /// Position in the section table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw section record
    pub fn section(&self) -> u64 {
        self.entry.section()
    }

    /// Byte offset of the entry header inside the archive
    pub fn offset(&self) -> u64 {
        self.entry.offset()
    }

    /// Decoded entry header, read on first access
    pub fn header(&self) -> Result<EntryHeader> {
        let version = self.archive.readable_version()?;
        self.entry
            .header_with(|offset| self.archive.read_entry_header(offset, version))
    }

    /// Uncompressed length of the contents
    pub fn length(&self) -> Result<u64> {
        Ok(u64::from(self.header()?.length()))
    }

    /// Stored length of the contents, content header included
    pub fn compressed_length(&self) -> Result<u64> {
        Ok(u64::from(self.header()?.compressed_length()))
    }

    /// Whether the contents are compressed
    pub fn is_compressed(&self) -> Result<bool> {
        Ok(self.header()?.is_compressed())
    }

    /// Whether the contents are rotor encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        Ok(self.header()?.is_encrypted())
    }

    /// Stored entry hash
    pub fn hash(&self) -> Result<u64> {
        Ok(self.header()?.hash)
    }

    /// Position cipher seed
    pub fn seed(&self) -> Result<u64> {
        Ok(self.header()?.seed())
    }

    /// Display name resolved through the archive's name resolver
    pub fn full_name(&self) -> Result<String> {
        Ok(display_name(self.archive.name_resolver(), self.hash()?))
    }

    /// Final component of [`full_name`](Self::full_name)
    pub fn name(&self) -> Result<String> {
        Ok(base_name(&self.full_name()?).to_string())
    }

    /// Open the contents for reading
    pub fn open(&self) -> Result<EntryReader<'a>> {
        let header = self.header()?;
        open_entry(
            &self.archive.source,
            self.entry.offset(),
            &header,
            self.archive.options.compression,
        )
    }

    /// Read the whole contents
    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        let mut reader = self.open()?;
        let capacity = usize::try_from(reader.len()).unwrap_or(0).min(1 << 24);
        let mut data = Vec::with_capacity(capacity);
        reader.read_to_end(&mut data).map_err(Error::from_io)?;
        Ok(data)
    }
}

impl<R> fmt::Debug for ArchiveEntry<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("index", &self.index)
            .field("offset", &self.entry.offset())
            .finish()
    }
}
