//! History persistence across restarts and display-index deletion.

use std::fs;

use ocrdesk::history::HISTORY_LOG_FILE;
use ocrdesk::{HistoryStore, content_hash};

fn png_like(tag: &str) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

#[test]
fn test_append_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let image = png_like("receipt");

    {
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&image, "Total: 12.50", "en", 1.37).unwrap();
    }

    let reopened = HistoryStore::open(dir.path()).unwrap();
    assert_eq!(reopened.len(), 1);

    let item = reopened.get(0).unwrap();
    assert_eq!(item.text, "Total: 12.50");
    assert_eq!(item.language, "en");
    assert_eq!(item.processing_time, 1.37);
    assert_eq!(item.image_file, format!("{}.png", content_hash(&image)));
    assert_eq!(reopened.read_image(&item).unwrap(), Some(image));
}

#[test]
fn test_delete_by_display_index_removes_matching_item_and_image() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path()).unwrap();

    let n = 5;
    for i in 0..n {
        store
            .append(&png_like(&format!("page-{i}")), format!("text {i}"), "en", 0.5)
            .unwrap();
    }

    let display_index = 1;
    let expected_appended = n - 1 - display_index;
    let target = store.get(display_index).unwrap();
    assert_eq!(target.text, format!("text {expected_appended}"));
    let image_path = store.image_path(&target).unwrap();
    assert!(image_path.exists());

    let removed = store.delete(display_index).unwrap().unwrap();
    assert_eq!(removed, target);
    assert!(!image_path.exists());

    let reopened = HistoryStore::open(dir.path()).unwrap();
    let remaining: Vec<_> = reopened.items().into_iter().map(|i| i.text).collect();
    assert_eq!(remaining, vec!["text 0", "text 1", "text 2", "text 4"]);
}

#[test]
fn test_delete_out_of_bounds_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path()).unwrap();
    store.append(&png_like("only"), "only", "en", 0.1).unwrap();

    assert_eq!(store.delete(1).unwrap(), None);
    assert_eq!(store.delete(usize::MAX).unwrap(), None);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_clear_removes_images_and_empties_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path()).unwrap();
    let first = store.append(&png_like("a"), "a", "en", 0.1).unwrap();
    store.append(&png_like("a"), "a again", "en", 0.1).unwrap();
    let second = store.append(&png_like("b"), "b", "ru", 0.1).unwrap();

    assert_eq!(store.clear().unwrap(), 3);
    assert!(store.is_empty());
    assert!(!dir.path().join(&first.image_file).exists());
    assert!(!dir.path().join(&second.image_file).exists());

    let log = fs::read_to_string(dir.path().join(HISTORY_LOG_FILE)).unwrap();
    assert_eq!(serde_json::from_str::<Vec<serde_json::Value>>(&log).unwrap().len(), 0);
}

#[test]
fn test_reads_log_with_offsetless_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let log = r#"[
        {
            "timestamp": "2024-03-01T09:15:30.123456",
            "text": "legacy entry",
            "language": "ru",
            "processing_time": 2.1,
            "image_file": "abc.png"
        }
    ]"#;
    fs::write(dir.path().join(HISTORY_LOG_FILE), log).unwrap();

    let store = HistoryStore::open(dir.path()).unwrap();
    let item = store.get(0).unwrap();
    assert_eq!(item.text, "legacy entry");
    assert_eq!(item.timestamp.to_rfc3339(), "2024-03-01T09:15:30.123456+00:00");

    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    assert_eq!(store.items_on(date).len(), 1);
    assert_eq!(store.read_image(&item).unwrap(), None);
}

#[test]
fn test_log_files_leave_no_temporaries() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path()).unwrap();
    for i in 0..3 {
        store.append(&png_like(&i.to_string()), "t", "en", 0.1).unwrap();
    }
    store.update_text(0, "edited").unwrap();
    store.delete(2).unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
        .collect();
    assert!(leftovers.is_empty());
    assert_eq!(HistoryStore::open(dir.path()).unwrap().get(0).unwrap().text, "edited");
}
