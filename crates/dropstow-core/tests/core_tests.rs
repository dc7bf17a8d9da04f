use dropstow_core::{
    ComparisonMethod, ContentHash, DroppedItem, EngineConfig, FileCategory, MoveError,
    OperationHistoryItem, OperationKind, OperationStatus,
};
use std::fs;
use strum::IntoEnumIterator;
use tempfile::TempDir;

#[test]
fn test_dropped_item_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("holiday.JPG");
    fs::write(&path, b"12345").unwrap();

    let item = DroppedItem::from_path(&path).unwrap();
    assert_eq!(item.name, "holiday.JPG");
    assert_eq!(item.extension, "jpg");
    assert_eq!(item.size, 5);
    assert!(!item.is_directory);
    assert_eq!(item.category, FileCategory::Images);
}

#[test]
fn test_dropped_item_from_directory_sums_children() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("project");
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("a.txt"), b"abc").unwrap();
    fs::write(dir.join("nested/b.txt"), b"defgh").unwrap();

    let item = DroppedItem::from_path(&dir).unwrap();
    assert!(item.is_directory);
    assert_eq!(item.size, 8);
    assert_eq!(item.category, FileCategory::Folders);
}

#[test]
fn test_dropped_item_missing_and_blank() {
    let temp = TempDir::new().unwrap();
    let err = DroppedItem::from_path(temp.path().join("nope.txt")).unwrap_err();
    assert!(matches!(err, MoveError::NotFound { .. }));

    let err = DroppedItem::from_path("  ").unwrap_err();
    assert!(matches!(err, MoveError::Validation { .. }));
}

#[test]
fn test_every_category_has_folder_name() {
    for category in FileCategory::iter() {
        assert!(!category.folder_name().is_empty());
    }
}

#[test]
fn test_history_item_json_shape() {
    let item = OperationHistoryItem::new("/in/a.txt", "/out/a.txt", OperationKind::Move)
        .with_item(false, 42)
        .with_confidence(Some(0.5));

    let json = serde_json::to_string(&item).unwrap();
    assert!(json.contains("\"status\":\"Success\""));
    assert!(!json.contains("undone_at"));

    let back: OperationHistoryItem = serde_json::from_str(&json).unwrap();
    assert_eq!(back, item);
    assert_eq!(back.status, OperationStatus::Success);
}

#[test]
fn test_config_round_trip_through_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("conf/config.toml");

    let config = EngineConfig::builder()
        .undo_expiration_secs(30u64)
        .use_trash(true)
        .build()
        .unwrap();
    config.save_to(&path).unwrap();

    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_partial_file_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "history_max_items = 7\n").unwrap();

    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded.history_max_items, 7);
    assert_eq!(loaded.hash_chunk_size, 8 * 1024);
}

#[test]
fn test_misc_displays() {
    assert_eq!(ComparisonMethod::Hash.to_string(), "SHA-256");
    assert_eq!(ContentHash::new([0; 32]).to_hex(), "0".repeat(64));
}
