mod common;

use common::TestLibrary;
use shoebox::backup::{
    archive, BackupFormat, DuplicatePolicy, ExportRequest, IntegrityValidator, RestoreOptions,
    RestoreStrategy,
};
use shoebox::config::settings::{Settings, Theme};
use shoebox::models::Category;
use shoebox::storage::{LibraryStore, PhotoFileStore};

fn replace() -> RestoreOptions {
    RestoreOptions::new(RestoreStrategy::Replace, DuplicatePolicy::Replace).with_settings(true)
}

fn merge(policy: DuplicatePolicy) -> RestoreOptions {
    RestoreOptions::new(RestoreStrategy::Merge, policy)
}

#[test]
fn replace_into_fresh_library_reproduces_it() {
    let source = TestLibrary::new();
    source.add_photo("family", "img_1.jpg", b"first photo");
    source.add_photo("family", "img_2.jpg", b"second photo");
    source.add_photo("pets", "rex.png", b"a dog");
    let mut trips = Category::with_position("trips", 4);
    trips.display_name = "Road Trips".into();
    trips.color_hex = Some("#336699".into());
    source.storage.insert_category(trips).unwrap();
    source.add_photo("trips", "coast.jpg", b"the sea");

    let paths = source.storage.paths().clone();
    let mut settings = Settings::load_or_create(&paths).unwrap();
    settings.theme = Theme::Dark;
    settings.grid_columns = 5;
    settings.save(&paths).unwrap();

    let backup = source.export();

    let target = TestLibrary::new();
    let result = target.restore(&backup, replace()).unwrap();

    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.photos_imported, 4);
    assert_eq!(result.payloads_restored, 4);
    assert!(result.settings_restored);
    assert_eq!(target.snapshot(), source.snapshot());
    assert_eq!(target.preferences(), source.preferences());
    assert!(target.work_dir_is_empty());

    // Ids survive a replace
    let original = source.storage.find_photo_by_path("coast.jpg").unwrap().unwrap();
    let restored = target.storage.find_photo_by_path("coast.jpg").unwrap().unwrap();
    assert_eq!(original.id, restored.id);
}

#[test]
fn repeated_merge_with_skip_changes_nothing() {
    let source = TestLibrary::new();
    source.add_photo("family", "img_1.jpg", b"one");
    source.add_photo("friends", "party.jpg", b"two");
    let backup = source.export();

    let target = TestLibrary::new();
    target.add_photo("places", "home.jpg", b"local");

    let first = target.restore(&backup, merge(DuplicatePolicy::Skip)).unwrap();
    assert!(first.success);
    assert_eq!(first.photos_imported, 2);
    let after_first = target.snapshot();

    let second = target.restore(&backup, merge(DuplicatePolicy::Skip)).unwrap();
    assert!(second.success);
    assert_eq!(second.photos_imported, 0);
    assert_eq!(second.photos_skipped, 2);
    assert_eq!(second.categories_imported, 0);
    assert_eq!(target.snapshot(), after_first);
}

#[test]
fn basic_scenario_two_categories_three_photos() {
    let source = TestLibrary::new();
    source.add_photo("family", "a.jpg", b"aaa");
    source.add_photo("family", "b.jpg", b"bbb");
    source.add_photo("pets", "c.jpg", b"ccc");

    let mut request = ExportRequest::default();
    request.filter.category_names = Some(vec!["family".into(), "pets".into()]);
    let export = source.export_to("three.zip", &request);
    assert_eq!(export.categories_exported, 2);
    assert_eq!(export.photos_exported, 3);
    assert_eq!(export.payloads_included, 3);
    assert!(export.warnings.is_empty());

    let report = IntegrityValidator::new().validate(&export.path, true);
    assert!(report.is_valid);
    assert!(report.integrity_passed);
    assert_eq!(report.category_count, 2);
    assert_eq!(report.photo_count, 3);

    let target = TestLibrary::empty();
    let result = target.restore(&export.path, replace()).unwrap();
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.categories_imported, 2);
    assert_eq!(result.photos_imported, 3);

    let restored = target.snapshot();
    assert_eq!(restored.categories.len(), 2);
    assert_eq!(
        restored.photos,
        vec![
            ("a.jpg".to_string(), "family".to_string(), "a".to_string()),
            ("b.jpg".to_string(), "family".to_string(), "b".to_string()),
            ("c.jpg".to_string(), "pets".to_string(), "c".to_string()),
        ]
    );
    assert_eq!(target.payload("c.jpg").unwrap(), b"ccc");
}

#[test]
fn merge_into_seeded_library_maps_categories_by_name() {
    let source = TestLibrary::new();
    source.add_photo("pets", "rex.jpg", b"dog");
    let backup = source.export();

    let target = TestLibrary::new();
    let result = target.restore(&backup, merge(DuplicatePolicy::Skip)).unwrap();
    assert_eq!(result.categories_imported, 0);
    assert_eq!(result.categories_updated, 4);

    let pets = target.storage.find_category_by_name("pets").unwrap().unwrap();
    let rex = target.storage.find_photo_by_path("rex.jpg").unwrap().unwrap();
    assert_eq!(rex.category_id, pets.id);
    assert_eq!(target.storage.list_categories().unwrap().len(), 4);
}

#[test]
fn merge_rename_keeps_both_photos() {
    let source = TestLibrary::new();
    source.add_photo("family", "img_1.jpg", b"from backup");
    let backup = source.export();

    let target = TestLibrary::new();
    target.add_photo("family", "img_1.jpg", b"already here");

    let result = target.restore(&backup, merge(DuplicatePolicy::Rename)).unwrap();
    assert!(result.success);
    assert_eq!(result.photos_imported, 1);

    let photos = target.storage.list_photos().unwrap();
    assert_eq!(photos.len(), 2);
    assert_eq!(target.payload("img_1.jpg").unwrap(), b"already here");

    let renamed = photos
        .iter()
        .find(|p| p.source_path != "img_1.jpg")
        .unwrap();
    assert!(renamed.source_path.starts_with("img_1_"));
    assert!(renamed.source_path.ends_with(".jpg"));
    assert_eq!(target.payload(&renamed.source_path).unwrap(), b"from backup");
}

#[test]
fn missing_payload_keeps_record_and_warns() {
    let source = TestLibrary::new();
    source.add_photo("family", "present.jpg", b"here");
    source.add_photo("family", "gone.jpg", b"soon gone");
    source.storage.files().remove("gone.jpg").unwrap();

    let export = source.export_to("partial.zip", &ExportRequest::default());
    assert_eq!(export.photos_exported, 2);
    assert_eq!(export.payloads_included, 1);
    assert_eq!(export.warnings.len(), 1);

    let target = TestLibrary::new();
    let result = target.restore(&export.path, replace()).unwrap();
    assert!(result.success);
    assert_eq!(result.photos_imported, 2);
    assert_eq!(result.payloads_restored, 1);
    assert!(target.storage.find_photo_by_path("gone.jpg").unwrap().is_some());
    assert!(target.payload("gone.jpg").is_none());
}

#[test]
fn manifest_entry_without_archive_payload() {
    let source = TestLibrary::new();
    source.add_photo("family", "lost.jpg", b"bytes that never made it");
    let full = source.export();

    // Repack with the metadata document only
    let metadata = archive::read_entry(&full, "metadata.json").unwrap();
    let stripped = source.dir.path().join("stripped.zip");
    common::write_zip(&stripped, &[("metadata.json", &metadata)]);

    let report = IntegrityValidator::new().validate(&stripped, true);
    assert!(report.is_valid);
    assert!(report.has_metadata);
    assert!(!report.integrity_passed);
    assert_eq!(report.warnings.len(), 1);

    let target = TestLibrary::new();
    let result = target.restore(&stripped, merge(DuplicatePolicy::Skip)).unwrap();
    assert!(result.success);
    assert_eq!(result.photos_imported, 1);
    assert_eq!(result.payloads_restored, 0);
    assert!(result.warnings.iter().any(|w| w.contains("lost.jpg")));
    assert!(target.storage.find_photo_by_path("lost.jpg").unwrap().is_some());
}

#[test]
fn json_backup_restores_records_only() {
    let source = TestLibrary::new();
    source.add_photo("pets", "cat.jpg", b"meow");

    let request = ExportRequest {
        format: BackupFormat::Json,
        ..ExportRequest::default()
    };
    let export = source.export_to("records.json", &request);
    assert_eq!(export.format, BackupFormat::Json);
    assert_eq!(export.payloads_included, 0);

    let target = TestLibrary::new();
    let result = target.restore(&export.path, merge(DuplicatePolicy::Skip)).unwrap();
    assert!(result.success);
    assert_eq!(result.photos_imported, 1);
    assert_eq!(result.payloads_restored, 0);
    assert!(target.storage.find_photo_by_path("cat.jpg").unwrap().is_some());
}

#[test]
fn category_filter_limits_export() {
    let source = TestLibrary::new();
    source.add_photo("family", "a.jpg", b"a");
    source.add_photo("pets", "b.jpg", b"b");

    let mut request = ExportRequest::default();
    request.filter.category_names = Some(vec!["pets".into(), "unknown".into()]);
    let export = source.export_to("pets.zip", &request);

    assert_eq!(export.categories_exported, 1);
    assert_eq!(export.photos_exported, 1);
    assert_eq!(export.warnings.len(), 1);
}

#[test]
fn replace_from_archive_without_payloads_keeps_local_files() {
    let library = TestLibrary::new();
    library.add_photo("family", "img_1.jpg", b"only copy");
    library.add_photo("pets", "rex.jpg", b"dog");

    let request = ExportRequest {
        include_photo_payloads: false,
        ..ExportRequest::default()
    };
    let export = library.export_to("records.zip", &request);
    assert_eq!(export.payloads_included, 0);

    let result = library.restore(&export.path, replace()).unwrap();
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.photos_imported, 2);
    assert_eq!(library.payload("img_1.jpg").unwrap(), b"only copy");
    assert_eq!(library.payload("rex.jpg").unwrap(), b"dog");
}

#[test]
fn backslash_in_file_name_survives_round_trip() {
    let source = TestLibrary::new();
    source.add_photo("family", "scan\\2019.jpg", b"scanned");

    let export = source.export_to("scans.zip", &ExportRequest::default());
    assert_eq!(export.payloads_included, 1);
    assert!(IntegrityValidator::new().validate(&export.path, true).is_valid);

    let target = TestLibrary::empty();
    let result = target.restore(&export.path, replace()).unwrap();
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.payloads_restored, 1);
    assert_eq!(target.payload("scan\\2019.jpg").unwrap(), b"scanned");
}
