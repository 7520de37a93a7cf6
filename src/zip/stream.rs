//! Byte plumbing between the container and entry contents.
//!
//! Reading: bounded section of the archive → optional decryption →
//! optional inflate → CRC-32 tracking. Writing is the mirror image.

use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use super::crypto::ZipCryptoKeys;
use crate::io::ReadAt;

/// A `Read` over `len` bytes of a [`ReadAt`] source starting at `offset`.
pub struct SectionReader<R> {
    reader: Arc<R>,
    offset: u64,
    remaining: u64,
}

impl<R: ReadAt> SectionReader<R> {
    pub fn new(reader: Arc<R>, offset: u64, len: u64) -> Self {
        Self {
            reader,
            offset,
            remaining: len,
        }
    }
}

impl<R: ReadAt> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.reader.read_at(self.offset, &mut buf[..len])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "entry data is truncated",
            ));
        }
        self.offset += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Compressed bytes of one entry, decrypted when needed
pub enum Source<R> {
    Plain(SectionReader<R>),
    Encrypted(SectionReader<R>, ZipCryptoKeys),
}

impl<R: ReadAt> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(section) => section.read(buf),
            Source::Encrypted(section, keys) => {
                let n = section.read(buf)?;
                keys.decrypt_in_place(&mut buf[..n]);
                Ok(n)
            }
        }
    }
}

enum Decoder<R> {
    Stored(Source<R>),
    Deflated(Box<DeflateDecoder<Source<R>>>),
}

/// Decompressed content of one entry with running CRC-32 and byte count.
pub struct EntryReader<R> {
    decoder: Decoder<R>,
    hasher: crc32fast::Hasher,
    bytes_read: u64,
    exhausted: bool,
}

impl<R: ReadAt> EntryReader<R> {
    pub fn stored(source: Source<R>) -> Self {
        Self::with(Decoder::Stored(source))
    }

    pub fn deflated(source: Source<R>) -> Self {
        Self::with(Decoder::Deflated(Box::new(DeflateDecoder::new(source))))
    }

    fn with(decoder: Decoder<R>) -> Self {
        Self {
            decoder,
            hasher: crc32fast::Hasher::new(),
            bytes_read: 0,
            exhausted: false,
        }
    }

    /// Whether a zero-length read has been observed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl<R: ReadAt> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match &mut self.decoder {
            Decoder::Stored(source) => source.read(buf)?,
            Decoder::Deflated(decoder) => decoder.read(buf)?,
        };
        if n == 0 {
            self.exhausted = true;
        }
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Counts bytes on their way to the archive.
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Largest piece encrypted at once on the way out
const CHUNK_SIZE: usize = 4096;

/// Compressed bytes of one entry on their way out, encrypted when needed
pub enum Sink<W> {
    Plain(CountingWriter<W>),
    Encrypted {
        out: CountingWriter<W>,
        keys: ZipCryptoKeys,
        chunk: Vec<u8>,
    },
}

impl<W: Write> Sink<W> {
    pub fn encrypted(out: CountingWriter<W>, keys: ZipCryptoKeys) -> Self {
        Sink::Encrypted {
            out,
            keys,
            chunk: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    pub fn into_counter(self) -> CountingWriter<W> {
        match self {
            Sink::Plain(out) | Sink::Encrypted { out, .. } => out,
        }
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(out) => out.write(buf),
            Sink::Encrypted { out, keys, chunk } => {
                // The keystream advances per byte, so every piece must land.
                for piece in buf.chunks(CHUNK_SIZE) {
                    chunk.clear();
                    chunk.extend_from_slice(piece);
                    keys.encrypt_in_place(chunk.as_mut_slice());
                    out.write_all(chunk.as_slice())?;
                }
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(out) | Sink::Encrypted { out, .. } => out.flush(),
        }
    }
}

/// Plain content in, deflated (and possibly encrypted) bytes out.
pub struct EntrySink<W: Write> {
    encoder: DeflateEncoder<Sink<W>>,
    hasher: crc32fast::Hasher,
    bytes_written: u64,
}

impl<W: Write> EntrySink<W> {
    pub fn new(sink: Sink<W>, level: flate2::Compression) -> Self {
        Self {
            encoder: DeflateEncoder::new(sink, level),
            hasher: crc32fast::Hasher::new(),
            bytes_written: 0,
        }
    }

    /// Flush the compressor; returns (crc32, uncompressed size, counting sink).
    pub fn finish(self) -> io::Result<(u32, u64, CountingWriter<W>)> {
        let counter = self.encoder.finish()?.into_counter();
        Ok((self.hasher.finalize(), self.bytes_written, counter))
    }
}

impl<W: Write> Write for EntrySink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_reader_stops_at_its_length() {
        let data = Arc::new(b"0123456789".to_vec());
        let mut section = SectionReader::new(data, 2, 5);
        let mut out = Vec::new();
        section.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"23456");
    }

    #[test]
    fn section_reader_reports_truncation() {
        let data = Arc::new(b"0123".to_vec());
        let mut section = SectionReader::new(data, 2, 5);
        let mut out = Vec::new();
        let err = section.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn deflated_entry_tracks_crc_and_size() {
        let content = b"hello hello hello hello".repeat(20);
        let mut sink = EntrySink::new(
            Sink::Plain(CountingWriter::new(Vec::new())),
            flate2::Compression::best(),
        );
        sink.write_all(&content).unwrap();
        let (crc, size, counter) = sink.finish().unwrap();
        assert_eq!(crc, crc32fast::hash(&content));
        assert_eq!(size, content.len() as u64);
        assert!(counter.count() < size);

        let compressed = Arc::new(counter.into_inner());
        let len = compressed.len() as u64;
        let mut reader = EntryReader::deflated(Source::Plain(SectionReader::new(compressed, 0, len)));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, content);
        assert!(reader.is_exhausted());
        assert_eq!(reader.checksum(), crc);
        assert_eq!(reader.bytes_read(), size);
    }

    #[test]
    fn encrypted_sink_matches_one_shot_encryption() {
        let content = (0..10_000u32).map(|i| (i % 253) as u8).collect::<Vec<_>>();
        let mut sink = Sink::encrypted(CountingWriter::new(Vec::new()), ZipCryptoKeys::new(b"pw"));
        sink.write_all(&content).unwrap();
        let counter = sink.into_counter();
        assert_eq!(counter.count(), content.len() as u64);

        let mut expected = content.clone();
        ZipCryptoKeys::new(b"pw").encrypt_in_place(&mut expected);
        assert_eq!(counter.into_inner(), expected);
    }
}
