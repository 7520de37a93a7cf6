//! Archive creation driver.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::structures::DosDateTime;
use super::writer::{EntryOptions, ZipWriter};
use crate::collect::{self, CollectedItem};
use crate::config::CreationTarget;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, LocalFs};

/// Chunk size for streaming source files into the archive
const BUFFER_SIZE: usize = 16 * 1024;

/// Summary of one creation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateReport {
    /// Entries written
    pub entries: usize,
    /// Uncompressed bytes read from the sources
    pub bytes_in: u64,
}

/// ZIP archive creator
pub struct ZipArchiver<F: FileSystem = LocalFs> {
    fs: F,
    span: tracing::Span,
}

impl Default for ZipArchiver<LocalFs> {
    fn default() -> Self {
        Self::new(LocalFs)
    }
}

impl<F: FileSystem> ZipArchiver<F> {
    pub fn new(fs: F) -> Self {
        Self::with_span(fs, tracing::debug_span!("zip"))
    }

    /// Use `span` as the parent of every event this archiver emits.
    pub fn with_span(fs: F, span: tracing::Span) -> Self {
        Self { fs, span }
    }

    /// Write a new archive holding every file under the configured sources.
    ///
    /// The destination must not exist. On failure the partially written
    /// archive is left in place.
    pub fn create(&self, target: &CreationTarget) -> Result<CreateReport> {
        let _enter = self.span.enter();
        if target.sources.is_empty() {
            return Err(Error::Configuration("no sources configured"));
        }
        let destination = target
            .destination
            .as_deref()
            .ok_or(Error::Configuration("no destination archive configured"))?;
        if self.fs.exists(destination) {
            return Err(Error::DestinationExists {
                path: destination.to_path_buf(),
            });
        }

        let file = self.fs.create_new(destination).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::DestinationExists {
                    path: destination.to_path_buf(),
                }
            } else {
                Error::ContainerOpen {
                    path: destination.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;
        let mut writer = ZipWriter::new(file);

        let items = collect::collect(&self.fs, &target.sources)?;
        debug!(items = items.len(), destination = %destination.display(), "collected sources");

        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut report = CreateReport::default();
        for item in &items {
            report.bytes_in += self
                .add_item(&mut writer, item, target, &mut buffer)
                .inspect_err(|e| error!(error = %e, "archive creation aborted"))?;
            report.entries += 1;
        }

        writer.finish()?;
        debug!(entries = report.entries, bytes = report.bytes_in, "created archive");
        Ok(report)
    }

    fn add_item<W: Write + std::io::Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        item: &CollectedItem,
        target: &CreationTarget,
        buffer: &mut [u8],
    ) -> Result<u64> {
        let mut source = self
            .fs
            .open(&item.source)
            .map_err(|source| Error::SourceOpen {
                path: item.source.clone(),
                source,
            })?;

        let crc32 = match target.password {
            Some(_) => Some(self.checksum(&item.source, &item.name)?),
            None => None,
        };
        let options = EntryOptions {
            compression_level: target.compression_level,
            modified: self.modified(&item.source),
            unix_mode: self.fs.mode(&item.source),
            password: target.password.clone(),
            crc32,
        };

        let mut entry = writer.start_entry(&item.name, &options)?;
        let mut total = 0u64;
        loop {
            let n = source
                .read(buffer)
                .map_err(|e| read_error(&item.source, e))?;
            if n == 0 {
                break;
            }
            entry.write_all(&buffer[..n])?;
            total += n as u64;
        }
        entry.finish()?;

        debug!(name = %item.name, bytes = total, "added entry");
        Ok(total)
    }

    /// CRC-32 of the whole source, needed before an encrypted entry is opened.
    fn checksum(&self, path: &Path, name: &str) -> Result<u32> {
        let content = self.fs.read(path).map_err(|e| Error::Password {
            name: name.to_string(),
            reason: format!("cannot read '{}' to compute its checksum: {e}", path.display()),
        })?;
        Ok(crc32fast::hash(&content))
    }

    /// Local calendar time of the source's mtime; zero fields when unavailable.
    fn modified(&self, path: &Path) -> DosDateTime {
        self.fs
            .modified(path)
            .ok()
            .and_then(DosDateTime::from_system_time)
            .unwrap_or_default()
    }
}

fn read_error(path: &Path, source: std::io::Error) -> Error {
    Error::SourceOpen {
        path: PathBuf::from(path),
        source,
    }
}
