//! Integration tests for the vault facade.
//!
//! These tests drive ingest, trash and purge end to end against the
//! in-memory index and hosts:
//! - Exact and near-duplicate detection, and the override
//! - Required vs optional host failures
//! - Soft delete, restore, partial and full purge
//! - Collections and record edits
//! - Ingest of files found on disk

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use imgvault::core::detector::MatchKind;
use imgvault::core::hosts::{InMemoryHost, IMGBB, PIXVID};
use imgvault::core::index::{InMemoryIndex, RecordIndex};
use imgvault::core::record::{CreationDateSource, DisplaySource, FileTypeSource, RecordUpdate};
use imgvault::core::replication::{FormFields, IngestRequest};
use imgvault::core::scanner::{ScanConfig, WalkDirScanner};
use imgvault::error::{IngestError, LifecycleError, VaultError};
use imgvault::Vault;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    index: Arc<InMemoryIndex>,
    pixvid: Arc<InMemoryHost>,
    imgbb: Arc<InMemoryHost>,
    vault: Vault,
}

fn harness() -> Harness {
    let index = Arc::new(InMemoryIndex::new());
    let pixvid = Arc::new(InMemoryHost::new(PIXVID));
    let imgbb = Arc::new(InMemoryHost::new(IMGBB));
    let vault = Vault::builder(index.clone(), pixvid.clone())
        .optional_host(imgbb.clone())
        .build();

    Harness {
        index,
        pixvid,
        imgbb,
        vault,
    }
}

/// Smooth interference pattern, varying mostly along x
fn waves(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        let fx = x as f32 * 240.0 / width as f32;
        let fy = y as f32 * 180.0 / height as f32;
        let v = 128.0 + 80.0 * (fx * 0.07).sin() + 30.0 * (fy * 0.11).cos();
        let v = v.clamp(0.0, 255.0) as u8;
        Rgb([v, v.saturating_sub(20), v.saturating_add(10)])
    }))
}

/// Dark top half, bright bottom half
fn split() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(240, 180, |_, y| {
        if y < 90 {
            Rgb([20, 20, 30])
        } else {
            Rgb([230, 230, 220])
        }
    }))
}

fn png(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn jpeg(image: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&image.to_rgb8())
        .unwrap();
    bytes
}

fn request(bytes: Vec<u8>) -> IngestRequest {
    IngestRequest::from_bytes(bytes)
}

#[tokio::test]
async fn exact_duplicate_is_reported_then_stored_on_override() {
    let h = harness();
    let bytes = png(&waves(240, 180));

    let first = h.vault.ingest(request(bytes.clone()), false).await.unwrap();
    let uploads = h.pixvid.upload_attempts();

    let err = h.vault.ingest(request(bytes.clone()), false).await.unwrap_err();
    match err {
        VaultError::Ingest(IngestError::DuplicateFound { existing }) => {
            assert_eq!(existing.record.id, first.id);
            assert_eq!(existing.kind, MatchKind::Exact);
        }
        other => panic!("expected duplicate, got {:?}", other),
    }
    assert_eq!(h.pixvid.upload_attempts(), uploads, "no upload for a duplicate");

    let second = h.vault.ingest(request(bytes), true).await.unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.sha256, first.sha256);
    assert_eq!(h.vault.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn reencoded_and_resized_copies_are_near_duplicates() {
    let h = harness();
    let original = waves(240, 180);
    let stored = h.vault.ingest(request(png(&original)), false).await.unwrap();

    let reencoded = h
        .vault
        .ingest(request(jpeg(&original, 92)), false)
        .await
        .unwrap_err();
    match reencoded {
        VaultError::Ingest(IngestError::DuplicateFound { existing }) => {
            assert_eq!(existing.record.id, stored.id);
            assert!(matches!(existing.kind, MatchKind::Perceptual { .. }));
        }
        other => panic!("expected near duplicate, got {:?}", other),
    }

    let smaller = original.resize_exact(120, 90, FilterType::Triangle);
    let resized = h.vault.ingest(request(png(&smaller)), false).await.unwrap_err();
    assert!(matches!(
        resized,
        VaultError::Ingest(IngestError::DuplicateFound { .. })
    ));

    let unrelated = h.vault.ingest(request(png(&split())), false).await.unwrap();
    assert_ne!(unrelated.id, stored.id);
    assert_eq!(h.vault.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn required_host_failure_stores_nothing() {
    let h = harness();
    h.pixvid.fail_uploads(true);

    let err = h
        .vault
        .ingest(request(png(&waves(240, 180))), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VaultError::Ingest(IngestError::RequiredHostUpload(_))
    ));
    assert!(h.index.query_all().await.unwrap().is_empty());
    // The optional copy is left behind and reported, not cleaned up
    assert_eq!(h.imgbb.asset_count(), 1);
}

#[tokio::test]
async fn optional_host_failure_is_tolerated() {
    let h = harness();
    h.imgbb.fail_uploads(true);

    let record = h
        .vault
        .ingest(request(png(&waves(240, 180))), false)
        .await
        .unwrap();

    assert!(record.imgbb_url.is_none());
    assert!(record.imgbb_delete_token.is_none());
    assert!(!record.pixvid_url.is_empty());
    assert_eq!(record.display_url(DisplaySource::Imgbb), record.pixvid_url);
    assert_eq!(h.vault.get_by_id(&record.id).await.unwrap(), Some(record));
}

#[tokio::test]
async fn vault_without_optional_host_stores_on_required_only() {
    let index = Arc::new(InMemoryIndex::new());
    let pixvid = Arc::new(InMemoryHost::new(PIXVID));
    let vault = Vault::builder(index, pixvid.clone()).build();

    let record = vault
        .ingest(request(png(&waves(240, 180))), false)
        .await
        .unwrap();

    assert!(record.imgbb_url.is_none());
    assert!(pixvid.contains(&record.pixvid_delete_token));

    let trashed = vault.soft_delete(&record.id).await.unwrap();
    vault.permanently_delete(&trashed.id).await.unwrap();
    assert_eq!(pixvid.asset_count(), 0);
}

#[tokio::test]
async fn form_fields_are_kept_on_the_record() {
    let h = harness();
    let fields = FormFields {
        source_image_url: Some("https://example.com/img/a.png".to_string()),
        source_page_url: Some("https://example.com/gallery".to_string()),
        page_title: Some("Gallery".to_string()),
        description: "reference".to_string(),
        file_name: Some("a.png".to_string()),
        ..FormFields::default()
    }
    .with_tag_list(" sky, ,blue ");

    let record = h
        .vault
        .ingest(IngestRequest::new(png(&waves(240, 180)), fields, None), false)
        .await
        .unwrap();

    assert_eq!(record.tags, vec!["sky", "blue"]);
    assert_eq!(record.file_name, "a.png");
    assert_eq!(record.page_title.as_deref(), Some("Gallery"));
    assert_eq!(record.width, Some(240));
    assert_eq!(record.height, Some(180));
    assert_eq!(record.file_type_source, FileTypeSource::Exif);
    assert_eq!(record.creation_date_source, CreationDateSource::Unknown);
}

#[tokio::test]
async fn soft_delete_then_restore_gives_back_the_same_record() {
    let h = harness();
    let record = h
        .vault
        .ingest(request(png(&waves(240, 180))), false)
        .await
        .unwrap();

    let trashed = h.vault.soft_delete(&record.id).await.unwrap();
    assert_eq!(h.vault.get_by_id(&record.id).await.unwrap(), None);
    assert_eq!(h.vault.list_trash().await.unwrap().len(), 1);
    assert_eq!(h.pixvid.delete_attempts(), 0, "trashing never touches hosts");

    let restored = h.vault.restore(&trashed.id).await.unwrap();
    assert_eq!(restored, record);
    assert_eq!(h.vault.get_trashed_by_id(&trashed.id).await.unwrap(), None);
    assert_eq!(h.vault.get_by_id(&record.id).await.unwrap(), Some(record));
}

#[tokio::test]
async fn bulk_soft_delete_reports_each_id() {
    let h = harness();
    let a = h.vault.ingest(request(png(&waves(240, 180))), false).await.unwrap();
    let b = h.vault.ingest(request(png(&split())), false).await.unwrap();

    let ids = vec![a.id.clone(), "missing".to_string(), b.id.clone()];
    let results = h.vault.soft_delete_many(&ids).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_ok());
    assert!(matches!(results[1].1, Err(LifecycleError::NotFound { .. })));
    assert!(results[2].1.is_ok());
    assert!(h.vault.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn partial_purge_keeps_the_record_and_retry_skips_the_deleted_host() {
    let h = harness();
    let record = h
        .vault
        .ingest(request(png(&waves(240, 180))), false)
        .await
        .unwrap();
    let trashed = h.vault.soft_delete(&record.id).await.unwrap();

    h.imgbb.fail_deletes(true);
    let err = h.vault.permanently_delete(&trashed.id).await.unwrap_err();
    match err {
        VaultError::Lifecycle(LifecycleError::HostDelete { failures, .. }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].host, IMGBB);
        }
        other => panic!("expected host delete failure, got {:?}", other),
    }

    let remaining = h.vault.get_trashed_by_id(&trashed.id).await.unwrap().unwrap();
    assert!(remaining.pixvid_purged);
    assert!(remaining.record.imgbb_url.is_some());
    assert!(!h.pixvid.contains(&record.pixvid_delete_token));

    let refused = h.vault.restore(&trashed.id).await.unwrap_err();
    assert!(matches!(
        refused,
        VaultError::Lifecycle(LifecycleError::RequiredAssetPurged { .. })
    ));

    h.imgbb.fail_deletes(false);
    h.vault.permanently_delete(&trashed.id).await.unwrap();

    assert_eq!(h.pixvid.delete_attempts(), 1);
    assert_eq!(h.imgbb.asset_count(), 0);
    assert!(h.vault.list_trash().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_trash_destroys_what_it_can() {
    let h = harness();
    let mut trash_ids = Vec::new();
    let mut tokens = Vec::new();
    for image in [waves(240, 180), split(), waves(64, 64).rotate90()] {
        let record = h.vault.ingest(request(png(&image)), true).await.unwrap();
        tokens.push(record.pixvid_delete_token.clone());
        trash_ids.push(h.vault.soft_delete(&record.id).await.unwrap().id);
    }
    h.pixvid.fail_delete_for(&tokens[1]);

    let report = h.vault.empty_trash().await.unwrap();

    assert_eq!(report.destroyed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].trash_id, trash_ids[1]);
    assert!(!report.is_complete());

    let left: Vec<_> = h
        .vault
        .list_trash()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(left, vec![trash_ids[1].clone()]);
}

#[tokio::test]
async fn deleting_a_collection_keeps_its_images() {
    let h = harness();
    let trips = h.vault.create_collection("  Trips ", "holiday refs").await.unwrap();
    assert_eq!(trips.name, "Trips");
    assert!(matches!(
        h.vault.create_collection("   ", "").await,
        Err(VaultError::InvalidInput(_))
    ));

    let fields = FormFields {
        collection_id: Some(trips.id.clone()),
        ..FormFields::default()
    };
    let inside = h
        .vault
        .ingest(IngestRequest::new(png(&waves(240, 180)), fields, None), false)
        .await
        .unwrap();
    let outside = h.vault.ingest(request(png(&split())), false).await.unwrap();

    let members = h.vault.list_collection(&trips.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, inside.id);

    let unknown = FormFields {
        collection_id: Some("nope".to_string()),
        ..FormFields::default()
    };
    let err = h
        .vault
        .ingest(IngestRequest::new(png(&waves(64, 64).rotate90()), unknown, None), false)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::CollectionNotFound { .. }));

    let trashed = h.vault.soft_delete(&inside.id).await.unwrap();
    h.vault.delete_collection(&trips.id).await.unwrap();

    assert!(h.vault.list_collections().await.unwrap().is_empty());
    assert_eq!(h.vault.get_by_id(&outside.id).await.unwrap().unwrap().collection_id, None);
    let still_trashed = h.vault.get_trashed_by_id(&trashed.id).await.unwrap().unwrap();
    assert_eq!(still_trashed.record.collection_id, None);
}

#[tokio::test]
async fn update_edits_fields_and_checks_collections() {
    let h = harness();
    let record = h
        .vault
        .ingest(request(png(&waves(240, 180))), false)
        .await
        .unwrap();
    let album = h.vault.create_collection("Album", "").await.unwrap();

    let update = RecordUpdate {
        description: Some("edited".to_string()),
        tags: Some(vec!["one".to_string()]),
        collection_id: Some(Some(album.id.clone())),
        ..RecordUpdate::default()
    };
    let updated = h.vault.update(&record.id, &update).await.unwrap();

    assert_eq!(updated.description, "edited");
    assert_eq!(updated.tags, vec!["one"]);
    assert_eq!(updated.collection_id.as_deref(), Some(album.id.as_str()));
    assert_eq!(updated.sha256, record.sha256);
    assert_eq!(h.vault.get_by_id(&record.id).await.unwrap(), Some(updated));

    let bad = RecordUpdate {
        collection_id: Some(Some("missing".to_string())),
        ..RecordUpdate::default()
    };
    assert!(matches!(
        h.vault.update(&record.id, &bad).await,
        Err(VaultError::CollectionNotFound { .. })
    ));
    assert!(matches!(
        h.vault.update("missing", &update).await,
        Err(VaultError::RecordNotFound { .. })
    ));
}

#[tokio::test]
async fn files_on_disk_carry_declared_type_and_modified_time() {
    let h = harness();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("waves.png"), png(&waves(240, 180))).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

    let scan = WalkDirScanner::new(ScanConfig::default()).scan(&[dir.path().to_path_buf()]);
    assert_eq!(scan.files.len(), 1);

    let file = &scan.files[0];
    let record = h
        .vault
        .ingest(file.read(FormFields::default()).unwrap(), false)
        .await
        .unwrap();

    assert_eq!(record.file_name, "waves.png");
    assert_eq!(record.file_type, "image/png");
    assert_eq!(record.file_type_source, FileTypeSource::FileObject);
    assert_eq!(record.creation_date_source, CreationDateSource::FileLastModified);
    assert_eq!(record.creation_date, file.modified);
}
