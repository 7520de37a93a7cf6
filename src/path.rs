//! Pure helpers over archive entry names.
//!
//! Entry names are `/`-separated relative paths. A trailing `/` marks a
//! directory placeholder entry. None of these functions touch the
//! filesystem.

/// A `/`-separated path identifying one item inside an archive.
pub type EntryName = String;

/// Returns true iff `name` ends with `/`.
///
/// Backslashes are not considered; normalize with
/// [`normalize_separators`] first when the name may come from Windows.
pub fn is_folder(name: &str) -> bool {
    name.ends_with('/')
}

/// Replaces every `\` with `/`.
pub fn normalize_separators(name: &str) -> String {
    name.replace('\\', "/")
}

/// Nesting level of an entry, with top-level items at depth 0.
///
/// Folder names carry a trailing empty segment from their slash, so
/// `"folder/"` and `"file.txt"` are both depth 0.
pub fn depth_of(name: &str) -> usize {
    let segments = name.split('/').count();
    if is_folder(name) {
        segments.saturating_sub(2)
    } else {
        segments - 1
    }
}

/// Every name at exactly `depth`, in listing order.
pub fn filter_depth<S: AsRef<str>>(names: &[S], depth: usize) -> Vec<EntryName> {
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| depth_of(name) == depth)
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_detection_uses_trailing_slash_only() {
        assert!(is_folder("folder/"));
        assert!(is_folder("a/b/"));
        assert!(!is_folder("file.txt"));
        assert!(!is_folder("folder\\"));
    }

    #[test]
    fn normalize_replaces_backslashes() {
        assert_eq!(normalize_separators("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(normalize_separators("plain/name"), "plain/name");
    }

    #[test]
    fn depth_of_files_and_folders() {
        assert_eq!(depth_of("file.txt"), 0);
        assert_eq!(depth_of("folder/"), 0);
        assert_eq!(depth_of("folder/file.txt"), 1);
        assert_eq!(depth_of("folder/sub/"), 1);
        assert_eq!(depth_of("folder/sub/deep/file.txt"), 3);
    }

    #[test]
    fn filter_depth_keeps_listing_order() {
        let listing = [
            "folder1/",
            "folder1/file1.txt",
            "folder1/folder1_1/",
            "folder1/folder1_1/file1_1.txt",
            "folder2/",
            "folder2/file2.txt",
            "top.txt",
        ];

        assert_eq!(filter_depth(&listing, 0), ["folder1/", "folder2/", "top.txt"]);
        assert_eq!(
            filter_depth(&listing, 1),
            ["folder1/file1.txt", "folder1/folder1_1/", "folder2/file2.txt"]
        );
        assert_eq!(filter_depth(&listing, 2), ["folder1/folder1_1/file1_1.txt"]);
        assert!(filter_depth(&listing, 3).is_empty());
    }
}
