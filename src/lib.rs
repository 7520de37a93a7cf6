//! # ziparc
//!
//! Read and write ZIP archives: list entries, extract all or selected
//! entries to a directory or into memory, and create new archives from
//! files and directories, optionally with traditional PKWARE encryption.
//!
//! ## Features
//!
//! - Sequential entry cursor with a single open entry at a time
//! - Path-safe extraction with permission restore
//! - Depth-aware listing of nested archives
//! - Password-protected reading and writing with CRC-32 verification
//! - STORED and DEFLATE methods, ZIP64 on read
//!
//! ## Example
//!
//! ```no_run
//! use ziparc::{CreationTarget, ExtractionTarget, ZipArchiver, ZipExtractor};
//!
//! fn main() -> ziparc::Result<()> {
//!     let target = CreationTarget::new(["notes.txt", "photos"], "backup.zip").password("s3cret");
//!     ZipArchiver::default().create(&target)?;
//!
//!     let target = ExtractionTarget::new("backup.zip")
//!         .destination("restored")
//!         .password("s3cret");
//!     let extractor = ZipExtractor::default();
//!     for name in extractor.list_entries(&target)? {
//!         println!("{name}");
//!     }
//!     extractor.extract_all(&target)?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod fs;
pub mod io;
pub mod path;
pub mod zip;

pub use cli::Cli;
pub use collect::{CollectedItem, collect};
pub use config::{CompressionLevel, CreationTarget, ExtractionTarget};
pub use error::{Error, Result};
pub use fs::{FileSystem, LocalFs};
pub use io::{LocalFileReader, ReadAt};
pub use path::{EntryName, depth_of, filter_depth, is_folder, normalize_separators};
pub use zip::{
    CreateReport, CurrentEntry, DosDateTime, EntryCursor, EntryMetadata, ZipArchiver,
    ZipExtractor, ZipWriter,
};
