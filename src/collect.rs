//! Flattening of file and directory inputs into archive entries.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fs::FileSystem;

/// One file to archive and the entry name it gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedItem {
    pub source: PathBuf,
    pub name: String,
}

/// Expand `sources` into a flat, ordered list of archive items.
///
/// Plain files are stored under their base name. Directories contribute
/// every descendant file, named `<dir base name>/<relative path>`;
/// directories themselves produce no items. Within each directory, files
/// come before subdirectories and siblings are sorted by name. Inputs that
/// do not exist are treated as plain files and fail later when opened.
/// Duplicate inputs produce duplicate items.
pub fn collect<F: FileSystem>(fs: &F, sources: &[PathBuf]) -> Result<Vec<CollectedItem>> {
    let mut items = Vec::new();
    for source in sources {
        if fs.is_dir(source) {
            collect_directory(fs, source, &mut items)?;
        } else {
            items.push(CollectedItem {
                source: source.clone(),
                name: base_name(fs, source).unwrap_or_default(),
            });
        }
    }
    Ok(items)
}

fn collect_directory<F: FileSystem>(
    fs: &F,
    dir: &Path,
    items: &mut Vec<CollectedItem>,
) -> Result<()> {
    let prefix = base_name(fs, dir);
    let walk = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });
    for entry in walk {
        let entry = entry.map_err(|e| Error::SourceOpen {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            source: e.into(),
        })?;
        // Symlinked directories are neither descended into nor archived.
        if fs.is_dir(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| Error::SourceOpen {
                path: entry.path().to_path_buf(),
                source: std::io::Error::other("walked outside of its root"),
            })?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = match &prefix {
            Some(prefix) => format!("{prefix}/{relative}"),
            None => relative,
        };

        debug!(source = %entry.path().display(), %name, "collected");
        items.push(CollectedItem {
            source: entry.into_path(),
            name,
        });
    }
    Ok(())
}

/// Last path component, resolving `.`-style inputs through the filesystem.
fn base_name<F: FileSystem>(fs: &F, path: &Path) -> Option<String> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    name.or_else(|| {
        fs.canonicalize(path)
            .ok()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use std::fs;

    fn names(items: &[CollectedItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn files_use_their_base_name() {
        let sandbox = tempfile::tempdir().unwrap();
        let d1 = sandbox.path().join("folder1");
        let d2 = sandbox.path().join("folder2").join("folderInFolder2");
        fs::create_dir_all(&d1).unwrap();
        fs::create_dir_all(&d2).unwrap();
        let f1 = d1.join("file1.txt");
        let f2 = d2.join("file2.txt");
        fs::write(&f1, "one").unwrap();
        fs::write(&f2, "two").unwrap();

        let items = collect(&LocalFs, &[f1.clone(), f2.clone(), f2.clone()]).unwrap();

        assert_eq!(names(&items), ["file1.txt", "file2.txt", "file2.txt"]);
        assert_eq!(items[0].source, f1);
    }

    #[test]
    fn directory_name_becomes_top_segment() {
        let sandbox = tempfile::tempdir().unwrap();
        let dir = sandbox.path().join("dirB");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub").join("y.txt"), "y").unwrap();

        let items = collect(&LocalFs, &[dir.clone()]).unwrap();

        assert_eq!(names(&items), ["dirB/sub/y.txt"]);
        assert_eq!(items[0].source, dir.join("sub").join("y.txt"));
    }

    #[test]
    fn files_precede_subdirectories_in_name_order() {
        let sandbox = tempfile::tempdir().unwrap();
        let dir = sandbox.path().join("d");
        fs::create_dir_all(dir.join("a")).unwrap();
        fs::write(dir.join("a").join("z.txt"), "z").unwrap();
        fs::write(dir.join("c.txt"), "c").unwrap();
        fs::write(dir.join("b.txt"), "b").unwrap();

        let items = collect(&LocalFs, &[dir]).unwrap();

        assert_eq!(names(&items), ["d/b.txt", "d/c.txt", "d/a/z.txt"]);
    }

    #[test]
    fn empty_directories_contribute_nothing() {
        let sandbox = tempfile::tempdir().unwrap();
        let dir = sandbox.path().join("empty");
        fs::create_dir_all(dir.join("nested")).unwrap();

        assert!(collect(&LocalFs, &[dir]).unwrap().is_empty());
    }

    #[test]
    fn missing_input_is_kept_as_a_file() {
        let sandbox = tempfile::tempdir().unwrap();
        let missing = sandbox.path().join("ghost.bin");

        let items = collect(&LocalFs, &[missing.clone()]).unwrap();

        assert_eq!(items, [CollectedItem { source: missing, name: "ghost.bin".into() }]);
    }
}
