//! Container writer.
//!
//! Each entry is written as a local header with placeholder CRC and sizes,
//! followed by its deflated (and optionally encrypted) data; the header is
//! patched once the data is complete. [`ZipWriter::finish`] appends the
//! central directory and the end record.

use std::io::{self, Seek, SeekFrom, Write};

use tracing::debug;

use super::crypto;
use super::stream::{CountingWriter, EntrySink, Sink};
use super::structures::{
    CompressionMethod, DosDateTime, EndOfCentralDirectory, FLAG_ENCRYPTED, FLAG_UTF8,
    LFH_CRC_OFFSET, ZipFileEntry,
};
use crate::config::CompressionLevel;
use crate::error::{Error, Result};

/// MS-DOS directory attribute
const DOS_DIRECTORY: u32 = 0x10;
const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;

/// Per-entry settings.
#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
    pub compression_level: CompressionLevel,
    pub modified: DosDateTime,
    /// POSIX mode to record in the external attributes
    pub unix_mode: Option<u32>,
    /// Encrypt with traditional PKWARE encryption
    pub password: Option<String>,
    /// CRC-32 of the whole plain content; required when encrypting
    pub crc32: Option<u32>,
}

pub struct ZipWriter<W: Write + Seek> {
    inner: W,
    entries: Vec<ZipFileEntry>,
}

impl<W: Write + Seek> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            entries: Vec::new(),
        }
    }

    /// Begin a file entry; write its content through the returned writer.
    pub fn start_entry(&mut self, name: &str, options: &EntryOptions) -> Result<EntryWriter<'_, W>> {
        let mut record = self.new_record(name, options, S_IFREG)?;
        record.compression_method = CompressionMethod::Deflate;

        let encryption = match (&options.password, options.crc32) {
            (Some(password), Some(crc)) => {
                Some((crypto::keys_for(name, password)?, (crc >> 24) as u8))
            }
            (Some(_), None) => {
                return Err(Error::Password {
                    name: name.to_string(),
                    reason: "encrypted entries need the content checksum up front".into(),
                });
            }
            (None, _) => None,
        };
        if encryption.is_some() {
            record.flags |= FLAG_ENCRYPTED;
        }

        record.write_local_to(&mut self.inner)?;

        let mut counter = CountingWriter::new(&mut self.inner);
        let sink = match encryption {
            Some((mut keys, check)) => {
                counter.write_all(&keys.encrypt_header(check))?;
                Sink::encrypted(counter, keys)
            }
            None => Sink::Plain(counter),
        };

        Ok(EntryWriter {
            sink: EntrySink::new(sink, options.compression_level.to_flate2()),
            record,
            entries: &mut self.entries,
            expected_crc: options.crc32.filter(|_| options.password.is_some()),
        })
    }

    /// Add an empty directory placeholder; a trailing `/` is appended if missing.
    pub fn add_directory(&mut self, name: &str, options: &EntryOptions) -> Result<()> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        let mut record = self.new_record(&name, options, S_IFDIR)?;
        record.external_attrs |= DOS_DIRECTORY;
        record.is_directory = true;
        record.write_local_to(&mut self.inner)?;
        debug!(%name, "wrote directory entry");
        self.entries.push(record);
        Ok(())
    }

    fn new_record(&mut self, name: &str, options: &EntryOptions, kind: u32) -> Result<ZipFileEntry> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        let lfh_offset = self.inner.stream_position()?;
        if lfh_offset > u32::MAX as u64 {
            return Err(zip64_required());
        }
        let (last_mod_date, last_mod_time) = options.modified.to_dos();
        let external_attrs = options
            .unix_mode
            .map(|mode| {
                let mode = if mode & S_IFMT == 0 { mode | kind } else { mode };
                mode << 16
            })
            .unwrap_or(0);

        Ok(ZipFileEntry {
            file_name: name.to_string(),
            flags: if name.is_ascii() { 0 } else { FLAG_UTF8 },
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            external_attrs,
            is_directory: false,
        })
    }

    /// Write the central directory and end record; returns the sink.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.inner.stream_position()?;
        for entry in &self.entries {
            entry.write_central_to(&mut self.inner)?;
        }
        let cd_end = self.inner.stream_position()?;

        let total_entries = u16::try_from(self.entries.len()).map_err(|_| zip64_required())?;
        if total_entries == u16::MAX || cd_end > u32::MAX as u64 {
            return Err(zip64_required());
        }

        EndOfCentralDirectory {
            entries: total_entries,
            cd_size: (cd_end - cd_offset) as u32,
            cd_offset: cd_offset as u32,
            comment_len: 0,
        }
        .write_to(&mut self.inner)?;
        self.inner.flush()?;

        debug!(entries = self.entries.len(), "finished archive");
        Ok(self.inner)
    }
}

/// Content sink for one entry.
///
/// Dropping it without [`finish`](EntryWriter::finish) leaves the entry
/// out of the central directory.
pub struct EntryWriter<'a, W: Write + Seek> {
    sink: EntrySink<&'a mut W>,
    record: ZipFileEntry,
    entries: &'a mut Vec<ZipFileEntry>,
    expected_crc: Option<u32>,
}

impl<W: Write + Seek> EntryWriter<'_, W> {
    /// Flush the compressor, patch the local header and record the entry.
    pub fn finish(self) -> Result<()> {
        let Self {
            sink,
            mut record,
            entries,
            expected_crc,
        } = self;

        let (crc32, uncompressed_size, counter) = sink.finish()?;
        if uncompressed_size > u32::MAX as u64 || counter.count() > u32::MAX as u64 {
            return Err(zip64_required());
        }
        // The encryption header already carries a check byte from `expected`.
        if let Some(expected) = expected_crc
            && expected != crc32
        {
            return Err(Error::Password {
                name: record.file_name,
                reason: "content changed after its checksum was taken".into(),
            });
        }
        record.crc32 = crc32;
        record.uncompressed_size = uncompressed_size;
        record.compressed_size = counter.count();

        let out = counter.into_inner();
        let end = out.stream_position()?;
        out.seek(SeekFrom::Start(record.lfh_offset + LFH_CRC_OFFSET))?;
        record.write_sizes_to(out)?;
        out.seek(SeekFrom::Start(end))?;

        debug!(
            name = %record.file_name,
            uncompressed = record.uncompressed_size,
            compressed = record.compressed_size,
            "wrote entry"
        );
        entries.push(record);
        Ok(())
    }
}

impl<W: Write + Seek> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

fn zip64_required() -> Error {
    Error::Unsupported("archive requires ZIP64, which is not written".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::EntryCursor;
    use std::io::Cursor;

    fn archive(entries: &[(&str, &[u8])], password: Option<&str>) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            let options = EntryOptions {
                password: password.map(str::to_string),
                crc32: Some(crc32fast::hash(data)),
                ..EntryOptions::default()
            };
            let mut entry = writer.start_entry(name, &options).unwrap();
            entry.write_all(data).unwrap();
            entry.finish().unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn read_all(cursor: &mut EntryCursor<Vec<u8>>, password: Option<&str>) -> Result<Vec<u8>> {
        let mut entry = cursor.open_current(password)?;
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = entry.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        entry.close()?;
        Ok(out)
    }

    #[test]
    fn written_entries_read_back_in_order() {
        let bytes = archive(&[("a.txt", b"alpha"), ("dir/b.txt", b"bravo bravo bravo")], None);
        let mut cursor = EntryCursor::new(bytes).unwrap();

        assert!(cursor.advance_to_first().unwrap());
        assert_eq!(cursor.current_name().unwrap(), "a.txt");
        assert_eq!(read_all(&mut cursor, None).unwrap(), b"alpha");

        assert!(cursor.advance_to_next().unwrap());
        assert_eq!(cursor.current_name().unwrap(), "dir/b.txt");
        assert_eq!(read_all(&mut cursor, None).unwrap(), b"bravo bravo bravo");

        assert!(!cursor.advance_to_next().unwrap());
    }

    #[test]
    fn encrypted_entry_needs_its_password() {
        let bytes = archive(&[("secret.txt", b"top secret")], Some("pw"));
        let mut cursor = EntryCursor::new(bytes).unwrap();
        cursor.locate("secret.txt").unwrap();

        assert!(cursor.current_metadata().unwrap().encrypted);
        assert_eq!(read_all(&mut cursor, Some("pw")).unwrap(), b"top secret");
        assert!(read_all(&mut cursor, None).unwrap_err().is_password());
        assert!(read_all(&mut cursor, Some("nope")).unwrap_err().is_password());
    }

    #[test]
    fn encryption_without_checksum_is_refused() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = EntryOptions {
            password: Some("pw".into()),
            ..EntryOptions::default()
        };
        assert!(writer.start_entry("x", &options).err().unwrap().is_password());
    }

    #[test]
    fn checksum_mismatch_fails_encrypted_entry() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = EntryOptions {
            password: Some("pw".into()),
            crc32: Some(crc32fast::hash(b"before")),
            ..EntryOptions::default()
        };
        let mut entry = writer.start_entry("moved.txt", &options).unwrap();
        entry.write_all(b"after").unwrap();

        let err = entry.finish().unwrap_err();
        assert!(matches!(err, Error::Password { ref name, .. } if name == "moved.txt"), "{err}");
    }

    #[test]
    fn non_ascii_passwords_are_refused_both_ways() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = EntryOptions {
            password: Some("pässword".into()),
            crc32: Some(0),
            ..EntryOptions::default()
        };
        assert!(writer.start_entry("x", &options).err().unwrap().is_password());

        let bytes = archive(&[("secret.txt", b"top secret")], Some("pw"));
        let mut cursor = EntryCursor::new(bytes).unwrap();
        cursor.advance_to_first().unwrap();
        assert!(read_all(&mut cursor, Some("pässword")).unwrap_err().is_password());
    }

    #[test]
    fn directories_get_a_trailing_slash() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("folder", &EntryOptions::default()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut cursor = EntryCursor::new(bytes).unwrap();
        cursor.advance_to_first().unwrap();
        assert_eq!(cursor.current_name().unwrap(), "folder/");
        assert_eq!(cursor.current_metadata().unwrap().uncompressed_size, 0);
    }

    #[test]
    fn locate_reports_missing_names() {
        let bytes = archive(&[("a.txt", b"alpha")], None);
        let mut cursor = EntryCursor::new(bytes).unwrap();
        assert!(matches!(
            cursor.locate("A.TXT"),
            Err(Error::EntryNotFound { .. })
        ));
    }
}
