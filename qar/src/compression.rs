//! Payload decompression
//!
//! Compressed QAR payloads are gzip members stored in the clear. Other
//! deflate framings can be selected through
//! [`OpenOptions::compression`](crate::OpenOptions::compression).

use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::{self, Read, Write};

/// Framing of compressed payloads
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CompressionFormat {
    /// zlib stream (RFC 1950)
    Zlib,
    /// gzip member (RFC 1952)
    #[default]
    Gzip,
    /// Raw deflate (RFC 1951)
    Deflate,
}

impl CompressionFormat {
    /// Wrap `reader` in a streaming decoder for this format
    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            CompressionFormat::Zlib => Box::new(Decoder(ZlibDecoder::new(reader))),
            CompressionFormat::Gzip => Box::new(Decoder(GzDecoder::new(reader))),
            CompressionFormat::Deflate => Box::new(Decoder(DeflateDecoder::new(reader))),
        }
    }

    /// Compress `data` in this format
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        let level = Compression::best();
        let compressed = match self {
            CompressionFormat::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionFormat::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionFormat::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()?
            }
        };
        Ok(compressed)
    }
}

/// Tags corrupt-stream errors of a decoder as decompression failures
struct Decoder<D>(D);

impl<D: Read> Read for Decoder<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData
                if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) =>
            {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    Error::compression(e.to_string()),
                )
            }
            _ => e,
        })
    }
}
