//! Shared helpers for the integration tests.
//!
//! Each integration test file compiles as its own crate and uses a subset
//! of these helpers.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use ziparc::zip::EntryOptions;
use ziparc::{CreationTarget, ExtractionTarget, ZipWriter};

/// A scratch directory with `input/` and `output/` halves.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::create_dir(dir.path().join("input")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input(&self) -> PathBuf {
        self.root().join("input")
    }

    pub fn output(&self) -> PathBuf {
        self.root().join("output")
    }

    pub fn archive(&self) -> PathBuf {
        self.root().join("archive.zip")
    }

    /// Write `content` to `input/<relative>`, creating parents.
    pub fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.input().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn creation(&self, sources: &[PathBuf]) -> CreationTarget {
        CreationTarget::new(sources.iter().cloned(), self.archive())
    }

    pub fn extraction(&self) -> ExtractionTarget {
        ExtractionTarget::new(self.archive()).destination(self.output())
    }
}

/// Every regular file under `root`, keyed by `/`-joined relative path.
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}

/// Write an archive with the given entries, in order, straight through the
/// container writer. Names ending in `/` become directory entries.
pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(name, &EntryOptions::default()).unwrap();
        } else {
            let mut entry = writer.start_entry(name, &EntryOptions::default()).unwrap();
            entry.write_all(data).unwrap();
            entry.finish().unwrap();
        }
    }
    writer.finish().unwrap();
}

/// Three top-level folders with files and sub-folders, in pre-order.
pub const NESTED: &[(&str, &[u8])] = &[
    ("alpha/", b""),
    ("alpha/one.txt", b"one"),
    ("alpha/inner/", b""),
    ("alpha/inner/two.txt", b"two"),
    ("beta/", b""),
    ("beta/three.txt", b"three"),
    ("gamma/", b""),
    ("gamma/deep/", b""),
    ("gamma/deep/er/", b""),
    ("gamma/deep/er/four.txt", b"four"),
];

/// Content that compresses well but is not trivially repetitive.
pub fn sample_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31) % 251) as u8).collect()
}
