use std::fs;

use fsflux::{find_duplicates, Algorithm, DedupOptions};

#[test]
fn find_duplicates_groups_identical_content_across_megabyte_files() {
    let dir = tempfile::tempdir().unwrap();
    let content = vec![0x42u8; 1024 * 1024];
    fs::write(dir.path().join("x"), &content).unwrap();
    fs::write(dir.path().join("y"), &content).unwrap();
    fs::write(dir.path().join("z"), vec![0x99u8; 1024 * 1024]).unwrap();

    let groups = find_duplicates(
        &[dir.path().to_path_buf()],
        &DedupOptions::default(),
        |_, _, _| {},
    )
    .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths.len(), 2);
    assert_eq!(groups[0].wasted_bytes(), 1024 * 1024);
}

#[test]
fn find_duplicates_discards_unique_sized_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a"), b"same").unwrap();
    fs::write(dir.path().join("b"), b"same").unwrap();
    fs::write(dir.path().join("c"), b"different-size-content").unwrap();

    let groups = find_duplicates(
        &[dir.path().to_path_buf()],
        &DedupOptions::default(),
        |_, _, _| {},
    )
    .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths.len(), 2);
}

#[test]
fn find_duplicates_min_size_excludes_small_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a"), b"hi").unwrap();
    fs::write(dir.path().join("b"), b"hi").unwrap();

    let options = DedupOptions {
        min_size: 10,
        ..DedupOptions::default()
    };
    let groups = find_duplicates(&[dir.path().to_path_buf()], &options, |_, _, _| {}).unwrap();
    assert!(groups.is_empty());
}

#[test]
fn find_duplicates_min_size_zero_groups_zero_byte_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a"), b"").unwrap();
    fs::write(dir.path().join("b"), b"").unwrap();

    let options = DedupOptions {
        min_size: 0,
        ..DedupOptions::default()
    };
    let groups = find_duplicates(&[dir.path().to_path_buf()], &options, |_, _, _| {}).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths.len(), 2);
}

#[test]
fn find_duplicates_is_idempotent_on_an_unchanged_tree() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a"), b"repeat me").unwrap();
    fs::write(dir.path().join("b"), b"repeat me").unwrap();

    let options = DedupOptions {
        algorithm: Algorithm::Sha256,
        ..DedupOptions::default()
    };
    let first = find_duplicates(&[dir.path().to_path_buf()], &options, |_, _, _| {}).unwrap();
    let second = find_duplicates(&[dir.path().to_path_buf()], &options, |_, _, _| {}).unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].hash_hex, second[0].hash_hex);
    assert_eq!(first[0].paths, second[0].paths);
}

#[test]
fn find_duplicates_progress_callback_reports_known_stages() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a"), b"dup").unwrap();
    fs::write(dir.path().join("b"), b"dup").unwrap();

    let stages = std::sync::Mutex::new(Vec::new());
    find_duplicates(&[dir.path().to_path_buf()], &DedupOptions::default(), |stage, _, _| {
        stages.lock().unwrap().push(stage.to_string());
    })
    .unwrap();

    let stages = stages.into_inner().unwrap();
    assert!(stages.contains(&"collecting".to_string()));
    assert!(stages.contains(&"partial_hash".to_string()));
    assert!(stages.contains(&"full_hash".to_string()));
}

#[test]
fn find_duplicates_results_sorted_by_wasted_bytes_descending() {
    let dir = tempfile::tempdir().unwrap();
    // Small duplicate pair.
    fs::write(dir.path().join("s1"), vec![1u8; 100]).unwrap();
    fs::write(dir.path().join("s2"), vec![1u8; 100]).unwrap();
    // Larger duplicate pair, more wasted bytes.
    fs::write(dir.path().join("l1"), vec![2u8; 5000]).unwrap();
    fs::write(dir.path().join("l2"), vec![2u8; 5000]).unwrap();

    let groups = find_duplicates(
        &[dir.path().to_path_buf()],
        &DedupOptions::default(),
        |_, _, _| {},
    )
    .unwrap();

    assert_eq!(groups.len(), 2);
    assert!(groups[0].wasted_bytes() >= groups[1].wasted_bytes());
    assert_eq!(groups[0].file_size, 5000);
}

#[test]
fn find_duplicates_aborts_when_a_queued_file_vanishes_before_the_full_hash_stage() {
    let dir = tempfile::tempdir().unwrap();
    // Three equal-size files so the full-hash stage has work left to do after the
    // partial-hash stage (partial_hash takes the cheap whole-file path below 2x the
    // partial size, so all three still look identical going into stage 3).
    fs::write(dir.path().join("a"), b"same size").unwrap();
    fs::write(dir.path().join("b"), b"same size").unwrap();
    fs::write(dir.path().join("c"), b"same size").unwrap();

    let seen_partial = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen_partial_clone = std::sync::Arc::clone(&seen_partial);
    let victim = dir.path().join("c");

    let result = find_duplicates(
        &[dir.path().to_path_buf()],
        &DedupOptions::default(),
        move |stage, _done, _total| {
            if stage == "partial_hash" {
                let n = seen_partial_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    // Remove one file partway through the partial-hash stage so its
                    // full-hash read fails later in the same call.
                    let _ = fs::remove_file(&victim);
                }
            }
        },
    );

    assert!(result.is_err());
}
