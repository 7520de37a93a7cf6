//! Central directory reader.
//!
//! An archive is read from its tail: the end record points at the central
//! directory (through the ZIP64 locator when its fields are saturated), and
//! each central record points at a local header that precedes the entry data.

use byteorder::{ByteOrder, LittleEndian};
use std::io;
use std::sync::Arc;

use crate::io::ReadAt;

use super::structures::*;

/// The end record may be followed by a comment of at most this many bytes
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// ZIP64 extended information extra field
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Where the central directory lives and how many records it holds
struct DirectoryLocation {
    offset: u64,
    size: u64,
    entries: u64,
}

/// Reads archive structure from any [`ReadAt`] source.
///
/// Usually driven through [`EntryCursor`](super::EntryCursor).
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// The end record and its offset.
    ///
    /// Scans the tail backwards for a signature whose comment length runs
    /// exactly to the end of the archive.
    pub fn find_eocd(&self) -> io::Result<(EndOfCentralDirectory, u64)> {
        let record = EndOfCentralDirectory::SIZE as u64;
        if self.size < record {
            return Err(invalid("file is too small to be a ZIP archive"));
        }

        let tail_len = (record + MAX_COMMENT_SIZE).min(self.size);
        let tail_start = self.size - tail_len;
        let mut tail = vec![0u8; tail_len as usize];
        self.reader.read_exact_at(tail_start, &mut tail)?;

        let last = tail.len() - EndOfCentralDirectory::SIZE;
        let found = (0..=last).rev().find(|&at| {
            tail[at..].starts_with(EndOfCentralDirectory::SIGNATURE)
                && LittleEndian::read_u16(&tail[at + 20..]) as usize == last - at
        });
        let at = found.ok_or_else(|| invalid("end of central directory not found"))?;

        let eocd = EndOfCentralDirectory::from_bytes(&tail[at..])?;
        Ok((eocd, tail_start + at as u64))
    }

    /// The ZIP64 end record, located through the locator just before `eocd_offset`.
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> io::Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| invalid("ZIP64 locator is missing"))?;
        let mut raw = [0u8; Zip64EOCDLocator::SIZE];
        self.reader.read_exact_at(locator_offset, &mut raw)?;
        let locator = Zip64EOCDLocator::from_bytes(&raw)?;

        let mut raw = [0u8; Zip64EOCD::MIN_SIZE];
        self.reader.read_exact_at(locator.eocd64_offset, &mut raw)?;
        Zip64EOCD::from_bytes(&raw)
    }

    fn locate_directory(&self) -> io::Result<DirectoryLocation> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        let location = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            DirectoryLocation {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                entries: eocd64.entries,
            }
        } else {
            DirectoryLocation {
                offset: eocd.cd_offset.into(),
                size: eocd.cd_size.into(),
                entries: eocd.entries.into(),
            }
        };

        if location.offset.saturating_add(location.size) > self.size {
            return Err(invalid("central directory lies outside the archive"));
        }
        Ok(location)
    }

    /// Every central directory record, in stored order.
    pub fn central_directory(&self) -> io::Result<Vec<ZipFileEntry>> {
        let location = self.locate_directory()?;
        let mut directory = vec![0u8; location.size as usize];
        self.reader.read_exact_at(location.offset, &mut directory)?;

        // A lying entry count cannot outgrow the records that fit.
        let fits = location.size / CDFH_MIN_SIZE as u64;
        let mut entries = Vec::with_capacity(location.entries.min(fits) as usize);
        let mut rest = directory.as_slice();
        for _ in 0..location.entries {
            let (entry, used) = read_central_record(rest)?;
            entries.push(entry);
            rest = &rest[used..];
        }
        Ok(entries)
    }

    /// Offset of the entry's data, past its local header.
    ///
    /// Local name and extra lengths may differ from the central record, so
    /// the header itself is consulted.
    pub fn data_offset(&self, entry: &ZipFileEntry) -> io::Result<u64> {
        let mut header = [0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut header)?;
        if !header.starts_with(LFH_SIGNATURE) {
            return Err(invalid("invalid local file header"));
        }

        let variable = u64::from(LittleEndian::read_u16(&header[26..]))
            + u64::from(LittleEndian::read_u16(&header[28..]));
        let offset = entry.lfh_offset + LFH_SIZE as u64 + variable;
        if offset.saturating_add(entry.compressed_size) > self.size {
            return Err(invalid("entry data lies outside the archive"));
        }
        Ok(offset)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Decode one central record from the front of `data`; returns it with
/// the number of bytes it occupied.
fn read_central_record(data: &[u8]) -> io::Result<(ZipFileEntry, usize)> {
    if data.len() < CDFH_MIN_SIZE || !data.starts_with(CDFH_SIGNATURE) {
        return Err(invalid("invalid central directory file header"));
    }
    let u16_at = |at: usize| LittleEndian::read_u16(&data[at..]);
    let u32_at = |at: usize| LittleEndian::read_u32(&data[at..]);

    let name_len = usize::from(u16_at(28));
    let extra_len = usize::from(u16_at(30));
    let comment_len = usize::from(u16_at(32));
    let name_end = CDFH_MIN_SIZE + name_len;
    let extra_end = name_end + extra_len;
    let record_len = extra_end + comment_len;
    if data.len() < record_len {
        return Err(invalid("central directory record is truncated"));
    }

    // Legacy code-page names are kept readable rather than rejected
    let file_name = String::from_utf8_lossy(&data[CDFH_MIN_SIZE..name_end]).into_owned();
    let mut entry = ZipFileEntry {
        is_directory: file_name.ends_with('/'),
        file_name,
        flags: u16_at(8),
        compression_method: CompressionMethod::from_u16(u16_at(10)),
        last_mod_time: u16_at(12),
        last_mod_date: u16_at(14),
        crc32: u32_at(16),
        compressed_size: u32_at(20).into(),
        uncompressed_size: u32_at(24).into(),
        external_attrs: u32_at(38),
        lfh_offset: u32_at(42).into(),
    };
    apply_zip64_extra(&data[name_end..extra_end], &mut entry);

    Ok((entry, record_len))
}

/// Replace saturated 32-bit fields with their ZIP64 values.
///
/// Only saturated fields are present in the extra, in the order
/// uncompressed size, compressed size, local header offset.
fn apply_zip64_extra(mut extra: &[u8], entry: &mut ZipFileEntry) {
    while extra.len() >= 4 {
        let id = LittleEndian::read_u16(extra);
        let len = usize::from(LittleEndian::read_u16(&extra[2..])).min(extra.len() - 4);
        let mut field = &extra[4..4 + len];
        extra = &extra[4 + len..];
        if id != ZIP64_EXTRA_ID {
            continue;
        }

        for value in [
            &mut entry.uncompressed_size,
            &mut entry.compressed_size,
            &mut entry.lfh_offset,
        ] {
            if *value == u64::from(u32::MAX) && field.len() >= 8 {
                *value = LittleEndian::read_u64(field);
                field = &field[8..];
            }
        }
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
