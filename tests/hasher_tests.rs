use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fsflux::{hash_file, hash_files, Algorithm};

#[test]
fn hash_file_empty_input_matches_blake3_known_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty");
    fs::write(&path, b"").unwrap();

    let result = hash_file(&path, Algorithm::Blake3, 1024 * 1024).unwrap();
    assert_eq!(
        result.hash_hex,
        "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
    );
    assert_eq!(result.size, 0);
}

#[test]
fn hash_file_sha256_produces_64_char_lowercase_hex() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.bin");
    fs::write(&path, b"hello world").unwrap();

    let result = hash_file(&path, Algorithm::Sha256, 4096).unwrap();
    assert_eq!(result.hash_hex.len(), 64);
    assert!(result.hash_hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn hash_file_above_mmap_threshold_matches_buffered_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.bin");
    // 5 MiB, above the 4 MiB mmap threshold.
    let content = vec![0x5au8; 5 * 1024 * 1024];
    fs::write(&path, &content).unwrap();

    let mmap_result = hash_file(&path, Algorithm::Blake3, 65536).unwrap();
    let expected = blake3::hash(&content).to_hex().to_string();
    assert_eq!(mmap_result.hash_hex, expected);
}

#[test]
fn hash_files_invokes_callback_once_per_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..5 {
        let path = dir.path().join(format!("f{i}.txt"));
        fs::write(&path, format!("content-{i}")).unwrap();
        paths.push(path);
    }

    let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let results = hash_files(&paths, Algorithm::Blake3, 4096, 4, move |r| {
        seen_clone.lock().unwrap().push(r.path.clone());
    })
    .unwrap();

    assert_eq!(results.len(), 5);
    assert_eq!(seen.lock().unwrap().len(), 5);
}

#[test]
fn hash_files_empty_input_succeeds_with_empty_output() {
    let results = hash_files(&[], Algorithm::Blake3, 4096, 4, |_| {}).unwrap();
    assert!(results.is_empty());
}

#[test]
fn hash_files_aborts_with_no_partial_results_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    fs::write(&good, b"ok").unwrap();
    let missing = dir.path().join("does-not-exist.txt");

    let result = hash_files(
        &[good, missing],
        Algorithm::Blake3,
        4096,
        2,
        |_| {},
    );
    assert!(result.is_err());
}

#[test]
fn equal_content_yields_equal_hash_results_regardless_of_path() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"identical content").unwrap();
    fs::write(&b, b"identical content").unwrap();

    let ra = hash_file(&a, Algorithm::Blake3, 4096).unwrap();
    let rb = hash_file(&b, Algorithm::Blake3, 4096).unwrap();
    assert_eq!(ra, rb);
}
