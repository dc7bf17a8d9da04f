use dropstow_analyze::{ComparisonMethod, DuplicateConfig, DuplicateDetector};
use dropstow_core::MoveError;
use filetime::{FileTime, set_file_mtime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_identical_files_are_exact_duplicates() {
    let temp = TempDir::new().unwrap();
    let source = write(temp.path(), "a.txt", b"duplicate content here");
    let dest = write(temp.path(), "b.txt", b"duplicate content here");

    let detector = DuplicateDetector::new();
    let result = detector
        .check_for_duplicate(&source, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(result.is_duplicate);
    assert!(result.is_exact_match);
    assert_eq!(result.comparison_method, ComparisonMethod::Hash);
    assert_eq!(detector.files_hashed(), 2);

    let source_hash = result.source.unwrap().hash.unwrap();
    let dest_hash = result.destination.unwrap().hash.unwrap();
    assert_eq!(source_hash, dest_hash);
}

#[tokio::test]
async fn test_equal_size_different_content_is_hashed() {
    let temp = TempDir::new().unwrap();
    let source = write(temp.path(), "a.txt", b"aaaaaaaa");
    let dest = write(temp.path(), "b.txt", b"bbbbbbbb");

    let detector = DuplicateDetector::new();
    let result = detector
        .check_for_duplicate(&source, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_duplicate);
    assert!(!result.is_exact_match);
    assert_eq!(result.comparison_method, ComparisonMethod::Hash);
    assert_eq!(detector.files_hashed(), 2);
    assert!(result.source.unwrap().hash.is_some());
}

#[tokio::test]
async fn test_different_sizes_never_hash() {
    let temp = TempDir::new().unwrap();
    let source = write(temp.path(), "a.txt", b"short");
    let dest = write(temp.path(), "b.txt", b"much longer content");

    let detector = DuplicateDetector::new();
    let result = detector
        .check_for_duplicate(&source, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_duplicate);
    assert_eq!(result.comparison_method, ComparisonMethod::SizeOnly);
    assert_eq!(detector.files_hashed(), 0);
    assert!(result.source.unwrap().hash.is_none());
}

#[tokio::test]
async fn test_missing_destination_is_not_duplicate() {
    let temp = TempDir::new().unwrap();
    let source = write(temp.path(), "a.txt", b"content");

    let detector = DuplicateDetector::new();
    let result = detector
        .check_for_duplicate(&source, &temp.path().join("missing.txt"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(!result.is_duplicate);
    assert_eq!(result.comparison_method, ComparisonMethod::None);
}

#[tokio::test]
async fn test_missing_source_fails_the_check() {
    let temp = TempDir::new().unwrap();
    let dest = write(temp.path(), "b.txt", b"content");

    let detector = DuplicateDetector::new();
    let result = detector
        .check_for_duplicate(&temp.path().join("gone.txt"), &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_success());
    assert!(result.error.unwrap().contains("gone.txt"));
    assert!(!result.is_duplicate);
}

#[tokio::test]
async fn test_blank_source_is_validation_error() {
    let detector = DuplicateDetector::new();
    let err = detector
        .check_for_duplicate(Path::new("   "), Path::new("/tmp/x"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, MoveError::Validation { .. }));
}

#[tokio::test]
async fn test_disabled_detector_short_circuits() {
    let config = DuplicateConfig::builder().enabled(false).build().unwrap();
    let detector = DuplicateDetector::with_config(config);

    // Neither file exists; a disabled detector must not look.
    let result = detector
        .check_for_duplicate(
            Path::new("/definitely/not/here.txt"),
            Path::new("/nor/here.txt"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(!result.is_duplicate);
    assert_eq!(result.comparison_method, ComparisonMethod::None);
}

#[tokio::test]
async fn test_already_cancelled_aborts_before_io() {
    let temp = TempDir::new().unwrap();
    let source = write(temp.path(), "a.txt", b"same");
    let dest = write(temp.path(), "b.txt", b"same");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let detector = DuplicateDetector::new();
    let err = detector
        .check_for_duplicate(&source, &dest, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(detector.files_hashed(), 0);
}

#[tokio::test]
async fn test_large_files_use_size_and_date() {
    let temp = TempDir::new().unwrap();
    let source = write(temp.path(), "a.bin", b"0123456789");
    let dest = write(temp.path(), "b.bin", b"9876543210");
    set_file_mtime(&source, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    set_file_mtime(&dest, FileTime::from_unix_time(1_700_000_001, 0)).unwrap();

    let config = DuplicateConfig::builder().hash_size_limit(4u64).build().unwrap();
    let detector = DuplicateDetector::with_config(config);
    let result = detector
        .check_for_duplicate(&source, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.comparison_method, ComparisonMethod::SizeAndDate);
    assert!(result.is_duplicate);
    assert!(!result.is_exact_match);
    assert_eq!(detector.files_hashed(), 0);

    set_file_mtime(&dest, FileTime::from_unix_time(1_700_003_600, 0)).unwrap();
    let result = detector
        .check_for_duplicate(&source, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.comparison_method, ComparisonMethod::SizeAndDate);
    assert!(!result.is_duplicate);
}

#[tokio::test]
async fn test_compute_file_hash_empty_file() {
    let temp = TempDir::new().unwrap();
    let path = write(temp.path(), "empty", b"");

    let detector = DuplicateDetector::new();
    let cancel = CancellationToken::new();
    let first = detector.compute_file_hash(&path, &cancel).await.unwrap();
    let second = detector.compute_file_hash(&path, &cancel).await.unwrap();

    assert_eq!(first.to_hex(), EMPTY_SHA256);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_compute_file_hash_errors() {
    let temp = TempDir::new().unwrap();
    let detector = DuplicateDetector::new();
    let cancel = CancellationToken::new();

    let err = detector
        .compute_file_hash(&temp.path().join("missing"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MoveError::NotFound { .. }));

    let err = detector
        .compute_file_hash(Path::new(""), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MoveError::Validation { .. }));
}

#[tokio::test]
async fn test_directories_are_not_compared() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src_dir");
    let dest = temp.path().join("dest_dir");
    fs::create_dir(&source).unwrap();
    fs::create_dir(&dest).unwrap();

    let detector = DuplicateDetector::new();
    let result = detector
        .check_for_duplicate(&source, &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_duplicate);
    assert_eq!(result.comparison_method, ComparisonMethod::None);
}
