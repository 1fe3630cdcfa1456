//! Local artifact and export tests

use std::io::Read;
use std::time::Duration;

use wpfleet::artifacts::{export_installations, ArtifactStore, ExportFormat};
use wpfleet::audit::EventCategory;
use wpfleet::errors::FleetError;
use wpfleet::storage::layout::StorageLayout;

use crate::common::{memory_auditor, site};

#[tokio::test]
async fn test_saved_backups_list_newest_first() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(tmp.path());
    let (log, auditor) = memory_auditor();
    let store = ArtifactStore::new(layout.clone(), auditor);

    store.save_backup("wp.26_1.zip", b"first").await.unwrap();
    // Keep modification times apart
    tokio::time::sleep(Duration::from_millis(1100)).await;
    store.save_backup("wp.26_2.zip", b"second!").await.unwrap();

    let backups = store.backups().await.unwrap();
    let names: Vec<_> = backups.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["wp.26_2.zip", "wp.26_1.zip"]);
    assert_eq!(backups[0].size, 7);
    assert!(backups[0].modified.is_some());

    let latest = store.latest_backup().await.unwrap().unwrap();
    assert_eq!(latest.name, "wp.26_2.zip");

    let events = log.by_category(EventCategory::FileOperation);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, "BACKUP_DOWNLOAD");
}

#[tokio::test]
async fn test_save_backup_rejects_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let (log, auditor) = memory_auditor();
    let store = ArtifactStore::new(StorageLayout::new(tmp.path()), auditor);

    let err = store.save_backup("../escape.zip", b"x").await.unwrap_err();
    assert!(matches!(err, FleetError::ValidationError(_)));
    assert!(!tmp.path().join("escape.zip").exists());
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_no_backups_means_no_latest() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, auditor) = memory_auditor();
    let store = ArtifactStore::new(StorageLayout::new(tmp.path()), auditor);
    assert!(store.latest_backup().await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let (log, auditor) = memory_auditor();
    let store = ArtifactStore::new(StorageLayout::new(tmp.path()), auditor);

    let a = store.save_backup("a.zip", b"alpha").await.unwrap();
    let b = store.save_backup("b.zip", b"bravo").await.unwrap();
    let path = store.create_archive("clas", &[a, b]).await.unwrap();

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("clas_"));
    assert!(name.ends_with(".zip"));
    // clas_YYYYmmdd_HHMMSS.zip
    assert_eq!(name.len(), "clas_".len() + 15 + ".zip".len());

    let file = std::fs::File::open(&path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    assert_eq!(zip.len(), 2);
    let mut contents = String::new();
    zip.by_name("b.zip").unwrap().read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "bravo");

    assert_eq!(store.archives().await.unwrap().len(), 1);
    assert_eq!(log.by_action("ARCHIVE_CREATE").len(), 1);
}

#[tokio::test]
async fn test_archive_needs_files() {
    let tmp = tempfile::tempdir().unwrap();
    let (log, auditor) = memory_auditor();
    let store = ArtifactStore::new(StorageLayout::new(tmp.path()), auditor);

    assert!(store.create_archive("clas", &[]).await.is_err());
    assert!(store.archives().await.unwrap().is_empty());
    assert_eq!(
        log.by_action("ARCHIVE_CREATE")[0].outcome,
        wpfleet::audit::Outcome::Failure
    );
}

#[tokio::test]
async fn test_export_writes_report() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(tmp.path());
    let (log, auditor) = memory_auditor();
    let sites = vec![site("26_1", "a"), site("26_2", "b")];

    let path = export_installations(&sites, ExportFormat::Json, &layout.exports_dir(), &auditor)
        .await
        .unwrap();
    assert_eq!(path.extension().unwrap(), "json");

    let report: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(report["total_installations"], 2);
    assert_eq!(report["installations"][1]["installation_id"], "26_2");
    assert_eq!(report["installations"][1]["full_url"], "https://b.example.edu");

    let events = log.by_category(EventCategory::ExportOperation);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].details["format"], "json");
    assert_eq!(events[0].details["count"], 2);
}

#[tokio::test]
async fn test_export_empty_csv_has_columns() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(tmp.path());
    let (_, auditor) = memory_auditor();

    let path = export_installations(&[], ExportFormat::Csv, &layout.exports_dir(), &auditor)
        .await
        .unwrap();
    let csv = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        csv.trim_end(),
        "installation_id,domain,display_name,path,version,user,full_url"
    );
}
