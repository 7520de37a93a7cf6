//! Property-based tests over entry names and archive round-trips.

use proptest::prelude::*;
use ziparc::{EntryCursor, depth_of, filter_depth, is_folder, normalize_separators};

/// Entry-name-like strings, mixing separators and trailing slashes.
fn name_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z0-9._-]{0,6}", 1..5)
        .prop_flat_map(|parts| {
            (Just(parts), prop::sample::select(vec!["/", "\\"]), any::<bool>())
        })
        .prop_map(|(parts, sep, folder)| {
            let mut name = parts.join(sep);
            if folder {
                name.push('/');
            }
            name
        })
}

proptest! {
    #[test]
    fn is_folder_is_trailing_slash(name in ".*") {
        prop_assert_eq!(is_folder(&name), name.ends_with('/'));
    }

    #[test]
    fn normalize_is_idempotent(name in ".*") {
        let once = normalize_separators(&name);
        prop_assert_eq!(normalize_separators(&once), once.clone());
        prop_assert!(!once.contains('\\'));
    }

    #[test]
    fn filter_depth_partitions_listing(names in proptest::collection::vec(name_strategy(), 0..30)) {
        let max_depth = names.iter().map(|n| depth_of(n)).max().unwrap_or(0);

        let mut recovered = Vec::new();
        for depth in 0..=max_depth {
            let level = filter_depth(&names, depth);
            // Order preserving: each level is a subsequence of the listing
            let mut rest = names.iter();
            for name in &level {
                prop_assert!(rest.any(|n| n == name));
            }
            recovered.extend(level);
        }

        let mut expected = names.clone();
        expected.sort();
        recovered.sort();
        prop_assert_eq!(recovered, expected);
    }

    #[test]
    fn stored_entries_read_back(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        password in proptest::option::of("[ -~]{1,16}"),
    ) {
        use std::io::{Cursor, Write};
        use ziparc::zip::EntryOptions;

        let options = EntryOptions {
            password: password.clone(),
            crc32: Some(crc32fast::hash(&data)),
            ..EntryOptions::default()
        };
        let mut writer = ziparc::ZipWriter::new(Cursor::new(Vec::new()));
        let mut entry = writer.start_entry("blob", &options).unwrap();
        entry.write_all(&data).unwrap();
        entry.finish().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut cursor = EntryCursor::new(bytes).unwrap();
        prop_assert!(cursor.advance_to_first().unwrap());
        let mut entry = cursor.open_current(password.as_deref()).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 1000];
        loop {
            let n = entry.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        entry.close().unwrap();
        prop_assert_eq!(out, data);
    }
}
