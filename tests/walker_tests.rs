use std::fs;

use fsflux::{walk, FileTypeFilter, WalkOptions};

fn tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a/b")).unwrap();
    fs::write(dir.path().join("a/one.txt"), b"one").unwrap();
    fs::write(dir.path().join("a/b/two.txt"), b"two").unwrap();
    fs::write(dir.path().join("root.txt"), b"root").unwrap();
    dir
}

#[test]
fn walk_collects_every_file_and_directory() {
    let dir = tree();
    let entries = walk(dir.path(), &WalkOptions::default()).unwrap();

    let files: Vec<_> = entries.iter().filter(|e| e.is_file()).collect();
    let dirs: Vec<_> = entries.iter().filter(|e| e.is_dir()).collect();
    assert_eq!(files.len(), 3);
    // "a", "a/b", and the root itself (depth 0) are directories.
    assert_eq!(dirs.len(), 3);
    assert!(entries.iter().any(|e| e.depth == 0 && e.is_dir()));
}

#[test]
fn walk_respects_file_type_filter() {
    let dir = tree();
    let options = WalkOptions {
        file_type: FileTypeFilter::File,
        ..WalkOptions::default()
    };
    let entries = walk(dir.path(), &options).unwrap();
    assert!(entries.iter().all(|e| e.is_file()));
    assert_eq!(entries.len(), 3);
}

#[test]
fn walk_respects_max_depth() {
    let dir = tree();
    let options = WalkOptions {
        max_depth: 1,
        ..WalkOptions::default()
    };
    let entries = walk(dir.path(), &options).unwrap();
    // The root itself (depth 0), plus root.txt and the "a" directory at depth 1.
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.iter().filter(|e| e.depth == 0).count(), 1);
    assert_eq!(entries.iter().filter(|e| e.depth == 1).count(), 2);
    assert!(entries.iter().all(|e| e.depth <= 1));
}

#[test]
fn walk_max_depth_zero_yields_only_root() {
    let dir = tree();
    let options = WalkOptions {
        max_depth: 0,
        ..WalkOptions::default()
    };
    let entries = walk(dir.path(), &options).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].depth, 0);
    assert!(entries[0].is_dir());
}

#[test]
fn walk_skips_hidden_entries_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".hidden"), b"x").unwrap();
    fs::write(dir.path().join("visible.txt"), b"y").unwrap();
    fs::create_dir_all(dir.path().join(".hidden_dir/nested")).unwrap();

    let options = WalkOptions {
        skip_hidden: true,
        ..WalkOptions::default()
    };
    let entries = walk(dir.path(), &options).unwrap();
    let names: Vec<_> = entries
        .iter()
        .filter_map(|e| e.path.file_name().and_then(|n| n.to_str()))
        .collect();
    assert!(names.contains(&"visible.txt"));
    assert!(!names.contains(&".hidden"));
    assert!(!names.contains(&".hidden_dir"));
    // The hidden directory's contents must never surface, even though "nested" itself isn't hidden.
    assert!(!names.contains(&"nested"));
}

#[test]
fn walk_sorts_entries_when_requested() {
    let dir = tree();
    let options = WalkOptions {
        sort: true,
        ..WalkOptions::default()
    };
    let entries = walk(dir.path(), &options).unwrap();
    let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
    let mut sorted_paths = paths.clone();
    sorted_paths.sort();
    assert_eq!(paths, sorted_paths);
}

#[test]
fn walk_on_missing_root_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let result = walk(&missing, &WalkOptions::default());
    assert!(result.is_err());
}

#[test]
fn walk_iter_streams_same_entries_as_collecting_form() {
    let dir = tree();
    let streamed: Vec<_> = fsflux::WalkIter::new(dir.path(), &WalkOptions::default())
        .unwrap()
        .collect();
    let collected = walk(dir.path(), &WalkOptions::default()).unwrap();
    assert_eq!(streamed.len(), collected.len());
}
