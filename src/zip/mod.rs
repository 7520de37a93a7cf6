//! ZIP archive reading, writing and the drivers built on them.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (EOCD, central and local headers) and
//!   the metadata types handed to callers
//! - [`parser`]: central-directory reader over any [`ReadAt`](crate::io::ReadAt)
//! - `crypto`: traditional PKWARE encryption
//! - `stream`: bounded, decrypting, inflating entry streams and their
//!   writing counterparts
//! - [`EntryCursor`]: sequential cursor with one open entry at a time
//! - [`ZipWriter`]: container writer
//! - [`ZipExtractor`] / [`ZipArchiver`]: the extraction and creation drivers
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Archives are read from the end: the EOCD locates the central directory,
//! which in turn locates each entry's local header.
//!
//! ## Supported Features
//!
//! - STORED and DEFLATE methods
//! - ZIP64 extensions when reading
//! - Traditional PKWARE encryption, reading and writing
//!
//! ## Limitations
//!
//! - No AES or strong encryption
//! - No multi-disk archives
//! - No ZIP64 when writing

mod archiver;
mod crypto;
mod cursor;
mod extractor;
pub mod parser;
mod stream;
pub mod structures;
mod writer;

pub use archiver::{CreateReport, ZipArchiver};
pub use cursor::{CurrentEntry, EntryCursor};
pub use extractor::{ZipExtractor, destination_path};
pub use parser::ZipParser;
pub use structures::{CompressionMethod, DosDateTime, EntryMetadata, ZipFileEntry};
pub use writer::{EntryOptions, EntryWriter, ZipWriter};
