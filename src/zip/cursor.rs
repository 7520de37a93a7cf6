//! Sequential entry cursor over an open archive.
//!
//! The cursor walks the central directory in stored order. Opening the
//! current entry hands out a [`CurrentEntry`] that mutably borrows the
//! cursor, so at most one entry is open at a time and the cursor cannot be
//! advanced or dropped while an entry is still open. Dropping the guard
//! releases the entry on every exit path; [`CurrentEntry::close`] also
//! reports the checksum outcome.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::crypto;
use super::parser::ZipParser;
use super::stream::{EntryReader, SectionReader, Source};
use super::structures::{
    CompressionMethod, EntryMetadata, FLAG_DATA_DESCRIPTOR, FLAG_STRONG_ENCRYPTION, ZipFileEntry,
};
use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt};

pub struct EntryCursor<R: ReadAt> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
    /// Index of the current entry; `None` before the first advance or once exhausted
    position: Option<usize>,
}

impl EntryCursor<LocalFileReader> {
    /// Open the archive at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::ContainerOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_file(file, path)
    }

    /// Open an archive from an already opened file; `path` is for errors.
    pub fn from_file(file: File, path: &Path) -> Result<Self> {
        let reader = LocalFileReader::from_file(file).map_err(|e| Error::ContainerOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::new(reader).map_err(|e| match e {
            Error::ContainerOpen { reason, .. } => Error::ContainerOpen {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }
}

impl<R: ReadAt> EntryCursor<R> {
    /// Open an archive from any random-access source.
    pub fn new(reader: R) -> Result<Self> {
        let parser = ZipParser::new(Arc::new(reader));
        let entries = parser
            .central_directory()
            .map_err(|e| Error::ContainerOpen {
                path: Default::default(),
                reason: e.to_string(),
            })?;
        debug!(entries = entries.len(), "opened archive");
        Ok(Self {
            parser,
            entries,
            position: None,
        })
    }

    /// Number of entries in the archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move to the first entry; `false` when the archive is empty.
    pub fn advance_to_first(&mut self) -> Result<bool> {
        self.position = (!self.entries.is_empty()).then_some(0);
        Ok(self.position.is_some())
    }

    /// Move to the next entry; `false` once the listing is exhausted.
    pub fn advance_to_next(&mut self) -> Result<bool> {
        self.position = match self.position {
            Some(index) if index + 1 < self.entries.len() => Some(index + 1),
            _ => None,
        };
        Ok(self.position.is_some())
    }

    /// Position the cursor on the entry named exactly `name`.
    pub fn locate(&mut self, name: &str) -> Result<()> {
        match self.entries.iter().position(|e| e.file_name == name) {
            Some(index) => {
                self.position = Some(index);
                Ok(())
            }
            None => Err(Error::EntryNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn current(&self) -> Result<&ZipFileEntry> {
        self.position
            .and_then(|index| self.entries.get(index))
            .ok_or_else(|| Error::EntryMetadata("cursor is not positioned on an entry".into()))
    }

    /// Name of the current entry, straight from the central directory.
    pub fn current_name(&self) -> Result<String> {
        let name = &self.current()?.file_name;
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(name.clone())
    }

    pub fn current_metadata(&self) -> Result<EntryMetadata> {
        Ok(self.current()?.metadata())
    }

    /// Open the current entry's data, decrypting with `password` if set.
    pub fn open_current(&mut self, password: Option<&str>) -> Result<CurrentEntry<'_, R>> {
        let entry = self.current().map_err(|_| Error::EntryOpen {
            name: String::new(),
            reason: "cursor is not positioned on an entry".into(),
        })?;
        let name = entry.file_name.clone();
        let open_error = |reason: String| Error::EntryOpen {
            name: name.clone(),
            reason,
        };

        if entry.flags & FLAG_STRONG_ENCRYPTION != 0 {
            return Err(Error::Unsupported(format!(
                "entry '{name}' uses strong encryption"
            )));
        }
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(Error::Unsupported(format!(
                "entry '{name}' uses compression method {method}"
            )));
        }

        let data_offset = self
            .parser
            .data_offset(entry)
            .map_err(|e| open_error(e.to_string()))?;
        let reader = Arc::clone(self.parser.reader());

        let source = if entry.is_encrypted() {
            let Some(password) = password else {
                return Err(Error::Password {
                    name,
                    reason: "entry is encrypted and no password was supplied".into(),
                });
            };
            if entry.compressed_size < crypto::HEADER_SIZE as u64 {
                return Err(open_error("encryption header is truncated".into()));
            }

            let mut header = [0u8; crypto::HEADER_SIZE];
            reader
                .read_exact_at(data_offset, &mut header)
                .map_err(|e| open_error(e.to_string()))?;
            let check = if entry.flags & FLAG_DATA_DESCRIPTOR != 0 {
                (entry.last_mod_time >> 8) as u8
            } else {
                (entry.crc32 >> 24) as u8
            };
            let mut keys = crypto::keys_for(&name, password)?;
            if !keys.verify_header(header, check) {
                return Err(Error::Password {
                    name,
                    reason: "encryption header check failed".into(),
                });
            }

            let section = SectionReader::new(
                reader,
                data_offset + crypto::HEADER_SIZE as u64,
                entry.compressed_size - crypto::HEADER_SIZE as u64,
            );
            Source::Encrypted(section, keys)
        } else {
            Source::Plain(SectionReader::new(reader, data_offset, entry.compressed_size))
        };

        let stream = match entry.compression_method {
            CompressionMethod::Deflate => EntryReader::deflated(source),
            _ => EntryReader::stored(source),
        };
        let encrypted = entry.is_encrypted();
        let expected_crc = entry.crc32;

        debug!(%name, encrypted, "opened entry");
        Ok(CurrentEntry {
            cursor: self,
            name,
            stream,
            encrypted,
            expected_crc,
        })
    }

    /// Release the archive.
    pub fn close(self) {
        debug!("closed archive");
    }
}

/// The open entry of an [`EntryCursor`].
pub struct CurrentEntry<'a, R: ReadAt> {
    cursor: &'a mut EntryCursor<R>,
    name: String,
    stream: EntryReader<R>,
    encrypted: bool,
    expected_crc: u32,
}

impl<R: ReadAt> CurrentEntry<'_, R> {
    /// Entry name as stored; an empty name is corruption.
    pub fn name(&self) -> Result<String> {
        if self.name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(self.name.clone())
    }

    pub fn metadata(&self) -> Result<EntryMetadata> {
        self.cursor.current_metadata()
    }

    /// Read decompressed bytes; `Ok(0)` marks the end of the entry.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(|source| self.read_error(source))
    }

    fn read_error(&self, source: io::Error) -> Error {
        if self.encrypted {
            // Garbage from a wrong key rarely survives the inflater.
            Error::Password {
                name: self.name.clone(),
                reason: format!("decrypted data is unreadable: {source}"),
            }
        } else {
            Error::Corrupted {
                name: self.name.clone(),
                source,
            }
        }
    }

    /// Close the entry, validating the CRC-32 if the stream was drained.
    pub fn close(self) -> Result<()> {
        debug!(name = %self.name, bytes = self.stream.bytes_read(), "closed entry");
        if !self.stream.is_exhausted() {
            return Ok(());
        }
        let actual = self.stream.checksum();
        if actual == self.expected_crc {
            return Ok(());
        }
        if self.encrypted {
            Err(Error::Password {
                name: self.name,
                reason: "CRC-32 mismatch after decryption".into(),
            })
        } else {
            Err(Error::ChecksumMismatch {
                name: self.name,
                expected: self.expected_crc,
                actual,
            })
        }
    }
}
