use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{self, Write};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};

/// Compression method of an entry; anything but these two is refused on read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// General purpose flag: entry data is encrypted
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
/// General purpose flag: CRC and sizes follow the data in a descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag: strong (certificate/AES) encryption
pub const FLAG_STRONG_ENCRYPTION: u16 = 1 << 6;
/// General purpose flag: name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// Version needed to extract deflated or encrypted entries (2.0)
pub const VERSION_NEEDED: u16 = 20;
/// Version made by: UNIX host, APPNOTE 2.0
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// End of central directory record, single-disk archives only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        if data.len() < Self::SIZE || !data.starts_with(Self::SIGNATURE) {
            return Err(invalid("invalid end of central directory"));
        }
        let disk = LittleEndian::read_u16(&data[4..]);
        let cd_disk = LittleEndian::read_u16(&data[6..]);
        if disk != 0 || cd_disk != 0 {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "multi-disk archives are not supported",
            ));
        }
        Ok(Self {
            entries: LittleEndian::read_u16(&data[10..]),
            cd_size: LittleEndian::read_u32(&data[12..]),
            cd_offset: LittleEndian::read_u32(&data[16..]),
            comment_len: LittleEndian::read_u16(&data[20..]),
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(0)?; // this disk
        out.write_u16::<LittleEndian>(0)?; // disk holding the directory
        out.write_u16::<LittleEndian>(self.entries)?; // on this disk
        out.write_u16::<LittleEndian>(self.entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)
    }

    /// Whether the real values live in the ZIP64 end record.
    pub fn is_zip64(&self) -> bool {
        self.entries == u16::MAX || self.cd_size == u32::MAX || self.cd_offset == u32::MAX
    }
}

/// Points from the end record to the ZIP64 end record
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        if data.len() < Self::SIZE || !data.starts_with(Self::SIGNATURE) {
            return Err(invalid("invalid ZIP64 end of central directory locator"));
        }
        Ok(Self {
            eocd64_offset: LittleEndian::read_u64(&data[8..]),
        })
    }
}

/// ZIP64 end of central directory record, reduced to what locates the directory
pub struct Zip64EOCD {
    pub entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        if data.len() < Self::MIN_SIZE || !data.starts_with(Self::SIGNATURE) {
            return Err(invalid("invalid ZIP64 end of central directory"));
        }
        Ok(Self {
            entries: LittleEndian::read_u64(&data[32..]),
            cd_size: LittleEndian::read_u64(&data[40..]),
            cd_offset: LittleEndian::read_u64(&data[48..]),
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;
/// Offset of the CRC-32 field inside the local header
pub const LFH_CRC_OFFSET: u64 = 14;

/// Central directory record for one entry
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub external_attrs: u32,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn modified(&self) -> DosDateTime {
        DosDateTime::from_dos(self.last_mod_date, self.last_mod_time)
    }

    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            crc32: self.crc32,
            external_attributes: self.external_attrs,
            modified: self.modified(),
            compression_method: self.compression_method,
            encrypted: self.is_encrypted(),
        }
    }

    /// Serialize as a central directory record (no ZIP64 extra field)
    pub fn write_central_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let name = self.file_name.as_bytes();
        out.write_all(CDFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(narrow(self.compressed_size)?)?;
        out.write_u32::<LittleEndian>(narrow(self.uncompressed_size)?)?;
        out.write_u16::<LittleEndian>(name_len(name)?)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(self.external_attrs)?;
        out.write_u32::<LittleEndian>(narrow(self.lfh_offset)?)?;
        out.write_all(name)
    }

    /// Serialize the local header; CRC and sizes are patched in later
    pub fn write_local_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let name = self.file_name.as_bytes();
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        self.write_sizes_to(out)?;
        out.write_u16::<LittleEndian>(name_len(name)?)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_all(name)
    }

    /// CRC-32, compressed and uncompressed size, as laid out in the local header
    pub fn write_sizes_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(narrow(self.compressed_size)?)?;
        out.write_u32::<LittleEndian>(narrow(self.uncompressed_size)?)
    }
}

/// Entry metadata as the core sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    /// Host-specific attributes; UNIX mode lives in the upper 16 bits
    pub external_attributes: u32,
    pub modified: DosDateTime,
    pub compression_method: CompressionMethod,
    pub encrypted: bool,
}

impl EntryMetadata {
    /// Permission bits worth restoring, if they fall in 0o400..=0o777.
    pub fn permissions(&self) -> Option<u32> {
        if self.external_attributes == 0 {
            return None;
        }
        let permissions = (self.external_attributes >> 16) & 0o777;
        (0o400..=0o777).contains(&permissions).then_some(permissions)
    }
}

/// Calendar fields of an MS-DOS timestamp (two-second resolution)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DosDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DosDateTime {
    /// Local calendar time of `time`; `None` outside the DOS range.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let local: DateTime<Local> = time.into();
        let year = u16::try_from(local.year()).ok()?;
        if !(1980..=2107).contains(&year) {
            return None;
        }
        Some(Self {
            year,
            month: local.month() as u8,
            day: local.day() as u8,
            hour: local.hour() as u8,
            minute: local.minute() as u8,
            second: local.second().min(59) as u8,
        })
    }

    pub fn from_dos(date: u16, time: u16) -> Self {
        Self {
            year: ((date >> 9) & 0x7F) + 1980,
            month: ((date >> 5) & 0x0F) as u8,
            day: (date & 0x1F) as u8,
            hour: ((time >> 11) & 0x1F) as u8,
            minute: ((time >> 5) & 0x3F) as u8,
            second: ((time & 0x1F) * 2) as u8,
        }
    }

    /// Packed (date, time); the all-zero value packs to (0, 0).
    pub fn to_dos(&self) -> (u16, u16) {
        if self.year < 1980 {
            return (0, 0);
        }
        let date = ((self.year - 1980) << 9) | ((self.month as u16) << 5) | self.day as u16;
        let time =
            ((self.hour as u16) << 11) | ((self.minute as u16) << 5) | (self.second as u16 / 2);
        (date, time)
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn narrow(value: u64) -> io::Result<u32> {
    u32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::Unsupported, "entry requires ZIP64"))
}

fn name_len(name: &[u8]) -> io::Result<u16> {
    u16::try_from(name.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry name is too long"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(external_attrs: u32) -> EntryMetadata {
        EntryMetadata {
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            external_attributes: external_attrs,
            modified: DosDateTime::default(),
            compression_method: CompressionMethod::Deflate,
            encrypted: false,
        }
    }

    #[test]
    fn dos_timestamp_packs_calendar_fields() {
        let stamp = DosDateTime {
            year: 2022,
            month: 12,
            day: 10,
            hour: 17,
            minute: 45,
            second: 31,
        };

        let (date, time) = stamp.to_dos();

        assert_eq!(
            DosDateTime::from_dos(date, time),
            DosDateTime { second: 30, ..stamp }
        );
    }

    #[test]
    fn default_timestamp_packs_to_zero() {
        assert_eq!(DosDateTime::default().to_dos(), (0, 0));
    }

    #[test]
    fn permissions_require_owner_read() {
        assert_eq!(entry(0).permissions(), None);
        assert_eq!(entry(0o100644 << 16).permissions(), Some(0o644));
        assert_eq!(entry(0o100755 << 16).permissions(), Some(0o755));
        assert_eq!(entry(0o100044 << 16).permissions(), None);
        // DOS-only attributes leave the upper half empty
        assert_eq!(entry(0x20).permissions(), None);
    }

    #[test]
    fn eocd_round_trips_through_bytes() {
        let eocd = EndOfCentralDirectory {
            entries: 3,
            cd_size: 150,
            cd_offset: 4096,
            comment_len: 0,
        };
        let mut buf = Vec::new();
        eocd.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE);
        let parsed = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert_eq!(parsed, eocd);
        assert!(!parsed.is_zip64());

        buf[4] = 1;
        let err = EndOfCentralDirectory::from_bytes(&buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
