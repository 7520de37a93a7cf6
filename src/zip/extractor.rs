//! Archive extraction driver.
//!
//! Walks an archive with an [`EntryCursor`] and materializes entries under a
//! destination root, or into memory. Every filesystem effect goes through
//! the [`FileSystem`] the extractor was built with, and every log event is
//! emitted inside its span.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, warn};

use super::cursor::{CurrentEntry, EntryCursor};
use super::structures::EntryMetadata;
use crate::config::ExtractionTarget;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, LocalFs};
use crate::io::{LocalFileReader, ReadAt};
use crate::path::{self, EntryName};

/// Chunk size for streaming entry contents out of the archive
const BUFFER_SIZE: usize = 4096;

/// ZIP archive extractor
pub struct ZipExtractor<F: FileSystem = LocalFs> {
    fs: F,
    span: tracing::Span,
}

impl Default for ZipExtractor<LocalFs> {
    fn default() -> Self {
        Self::new(LocalFs)
    }
}

impl<F: FileSystem> ZipExtractor<F> {
    pub fn new(fs: F) -> Self {
        Self::with_span(fs, tracing::debug_span!("unzip"))
    }

    /// Use `span` as the parent of every event this extractor emits.
    pub fn with_span(fs: F, span: tracing::Span) -> Self {
        Self { fs, span }
    }

    /// Names and central-directory metadata of every entry, in stored order.
    pub fn entries(&self, target: &ExtractionTarget) -> Result<Vec<(EntryName, EntryMetadata)>> {
        let _enter = self.span.enter();
        let source = self.validate_source(target)?;
        let mut cursor = self.open(source)?;

        let mut entries = Vec::with_capacity(cursor.len());
        let mut positioned = cursor.advance_to_first()?;
        while positioned {
            let name = cursor.current_name()?;
            let metadata = cursor.current_metadata()?;
            debug!(%name, "listed entry");
            entries.push((name, metadata));
            positioned = cursor.advance_to_next()?;
        }

        cursor.close();
        Ok(entries)
    }

    /// Entry names in stored order.
    pub fn list_entries(&self, target: &ExtractionTarget) -> Result<Vec<EntryName>> {
        Ok(self
            .entries(target)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Extract every entry under the destination root, in stored order.
    pub fn extract_all(&self, target: &ExtractionTarget) -> Result<()> {
        let _enter = self.span.enter();
        let source = self.validate_source(target)?;
        let root = self.validate_destination(target)?;
        let mut cursor = self.open(source)?;
        let password = target.password.as_deref();

        let mut positioned = cursor.advance_to_first()?;
        while positioned {
            self.extract_current(&mut cursor, root, password)
                .inspect_err(|e| error!(error = %e, "extraction aborted"))?;
            positioned = cursor.advance_to_next()?;
        }

        cursor.close();
        Ok(())
    }

    /// Extract only `names`, in the order given; each must match exactly.
    pub fn extract_selected<S: AsRef<str>>(
        &self,
        target: &ExtractionTarget,
        names: &[S],
    ) -> Result<()> {
        let _enter = self.span.enter();
        let source = self.validate_source(target)?;
        let root = self.validate_destination(target)?;
        let mut cursor = self.open(source)?;
        let password = target.password.as_deref();

        for name in names {
            cursor
                .locate(name.as_ref())
                .and_then(|()| self.extract_current(&mut cursor, root, password))
                .inspect_err(|e| error!(error = %e, "extraction aborted"))?;
        }

        cursor.close();
        Ok(())
    }

    /// Decompress the entry `name` into a buffer; directories yield an empty one.
    pub fn extract_to_memory(&self, target: &ExtractionTarget, name: &str) -> Result<Vec<u8>> {
        let _enter = self.span.enter();
        let source = self.validate_source(target)?;
        let mut cursor = self.open(source)?;
        cursor.locate(name)?;

        let data = {
            let entry = cursor.open_current(target.password.as_deref())?;
            let entry_name = entry.name()?;
            let mut data = Vec::new();
            if !path::is_folder(&path::normalize_separators(&entry_name)) {
                data.reserve(usize::try_from(entry.metadata()?.uncompressed_size).unwrap_or(0));
                let written = drain(entry, &mut data, Path::new(&entry_name))?;
                debug!(name = %entry_name, bytes = written, "extracted entry to memory");
            }
            data
        };

        cursor.close();
        Ok(data)
    }

    fn validate_source<'t>(&self, target: &'t ExtractionTarget) -> Result<&'t Path> {
        let source = target
            .source
            .as_deref()
            .ok_or(Error::Configuration("no source archive configured"))?;
        if !self.fs.exists(source) {
            return Err(Error::SourceNotFound {
                path: source.to_path_buf(),
            });
        }
        Ok(source)
    }

    fn validate_destination<'t>(&self, target: &'t ExtractionTarget) -> Result<&'t Path> {
        target
            .destination
            .as_deref()
            .ok_or(Error::Configuration("no destination directory configured"))
    }

    fn open(&self, source: &Path) -> Result<EntryCursor<LocalFileReader>> {
        let file = self.fs.open(source).map_err(|e| Error::ContainerOpen {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        EntryCursor::from_file(file, source)
    }

    /// Materialize the cursor's current entry under `root`.
    ///
    /// The entry guard is released on every path out of this function,
    /// before the caller advances or closes the cursor.
    fn extract_current<R: ReadAt>(
        &self,
        cursor: &mut EntryCursor<R>,
        root: &Path,
        password: Option<&str>,
    ) -> Result<()> {
        let entry = cursor.open_current(password)?;
        let name = path::normalize_separators(&entry.name()?);
        let metadata = entry.metadata()?;
        let full_path = destination_path(root, &name)?;
        let is_folder = path::is_folder(&name);

        self.create_intermediate_directories(&full_path, is_folder)?;
        if is_folder {
            debug!(%name, "extracted directory");
            return Ok(());
        }

        let mut file = self
            .fs
            .create(&full_path)
            .map_err(|source| Error::ExtractionFailed {
                path: full_path.clone(),
                source,
            })?;
        let written = match drain(entry, &mut file, &full_path) {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                if e.is_password()
                    && let Err(remove) = self.fs.remove_file(&full_path)
                {
                    warn!(path = %full_path.display(), error = %remove, "failed to remove output");
                }
                return Err(e);
            }
        };
        drop(file);

        if written != metadata.uncompressed_size {
            return Err(Error::Integrity {
                name,
                expected: metadata.uncompressed_size,
                written,
            });
        }
        debug!(%name, bytes = written, path = %full_path.display(), "extracted entry");

        if let Some(mode) = metadata.permissions()
            && let Err(e) = self.fs.set_mode(&full_path, mode)
        {
            warn!(path = %full_path.display(), mode = %format!("{mode:o}"), error = %e,
                "failed to set permissions");
        }
        Ok(())
    }

    /// Directory entries create themselves, file entries their parent.
    fn create_intermediate_directories(&self, full_path: &Path, is_folder: bool) -> Result<()> {
        let dir = if is_folder {
            full_path
        } else {
            match full_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => return Ok(()),
            }
        };
        if self.fs.exists(dir) {
            return Ok(());
        }
        self.fs
            .create_dir_all(dir)
            .map_err(|source| Error::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source,
            })?;
        debug!(path = %dir.display(), "created directories");
        Ok(())
    }
}

/// Stream an entry into `out` in fixed-size chunks, then close it.
fn drain<R: ReadAt, W: Write>(
    mut entry: CurrentEntry<'_, R>,
    out: &mut W,
    path: &Path,
) -> Result<u64> {
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = entry.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])
            .map_err(|source| Error::ExtractionFailed {
                path: path.to_path_buf(),
                source,
            })?;
        written += n as u64;
    }
    entry.close()?;
    Ok(written)
}

/// Join a normalized entry name under `root`, refusing names that would
/// land outside it.
pub fn destination_path(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name.trim_start_matches('/'));
    let escapes = relative.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(Error::PathTraversal {
            name: name.to_string(),
        });
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_path_joins_under_root() {
        let root = Path::new("/out");
        assert_eq!(
            destination_path(root, "dir/file.txt").unwrap(),
            Path::new("/out/dir/file.txt")
        );
        assert_eq!(
            destination_path(root, "/abs/file.txt").unwrap(),
            Path::new("/out/abs/file.txt")
        );
    }

    #[test]
    fn destination_path_keeps_trailing_slash_folders_under_root() {
        let path = destination_path(Path::new("/out"), "folder/").unwrap();
        assert!(path.starts_with("/out/folder"));
    }

    #[test]
    fn destination_path_rejects_parent_segments() {
        for name in ["../evil.txt", "a/../../evil.txt", "a/.."] {
            assert!(
                matches!(
                    destination_path(Path::new("/out"), name),
                    Err(Error::PathTraversal { .. })
                ),
                "{name} was accepted"
            );
        }
    }
}
