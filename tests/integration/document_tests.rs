//! Document open and export integration tests.
//!
//! Tests verify:
//! - Opening manifests from disk through ManifestOpener
//! - Password handling (blank, locked, wrong, correct)
//! - Distinct open failures for unreadable and invalid files
//! - Page orientation through the full pipeline
//! - PNG and JPEG export of rendered pages

use std::sync::Arc;

use image::Rgba;

use page_raster::{
    Document, ExportFormat, ManifestOpener, OpenError, PageEncoder, PageIndex, RenderConfig,
};

use super::test_utils::{
    blocking, protected_manifest, write_manifest, HUNTER2_SHA256, THREE_PAGE_MANIFEST,
};

async fn open(path: &std::path::Path, credential: Option<&str>) -> Result<Document, OpenError> {
    Document::open(
        &ManifestOpener::new(),
        path.to_str().unwrap(),
        credential,
        RenderConfig::default(),
    )
    .await
}

// =============================================================================
// Opening
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, "three.json", THREE_PAGE_MANIFEST);

    let document = open(&path, None).await.unwrap();

    assert_eq!(document.file_name(), "three.json");
    assert_eq!(document.page_count(), 3);

    let report = document.wait_for_prefetch().await.unwrap();
    assert_eq!(report.warmed, 3);

    let dims: Vec<_> = PageIndex::all(3)
        .map(|i| document.get_page(i).unwrap().dimensions())
        .collect();
    assert_eq!(dims, vec![(185, 240), (240, 120), (240, 240)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_page_top_is_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, "three.json", THREE_PAGE_MANIFEST);
    let document = Arc::new(open(&path, None).await.unwrap());

    let d = Arc::clone(&document);
    let image = blocking(move || d.get_page(PageIndex::new(3))).await.unwrap();

    // The red block covers the upper half of the page in page space
    assert_eq!(image.pixel(120, 10), Some(Rgba([255, 0, 0, 255])));
    assert_eq!(image.pixel(120, 230), Some(Rgba([255, 255, 255, 255])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_protected_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, "secret.json", &protected_manifest(HUNTER2_SHA256));

    assert!(matches!(open(&path, None).await, Err(OpenError::Locked(_))));
    assert!(matches!(
        open(&path, Some("hunter3")).await,
        Err(OpenError::WrongCredential(_))
    ));

    let document = open(&path, Some("hunter2")).await.unwrap();
    assert_eq!(document.page_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blank_password_unlocks_without_credential() {
    let dir = tempfile::tempdir().unwrap();
    let blank_sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    let path = write_manifest(&dir, "blank.json", &protected_manifest(blank_sha256));

    let document = open(&path, None).await.unwrap();
    assert_eq!(document.page_count(), 1);

    // A supplied credential is ignored when the blank password works
    assert!(open(&path, Some("anything")).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_failures_are_distinct() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        open(&missing, None).await,
        Err(OpenError::Unreadable { .. })
    ));

    let garbage = write_manifest(&dir, "garbage.json", "not json at all");
    assert!(matches!(
        open(&garbage, None).await,
        Err(OpenError::Invalid { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, "three.json", THREE_PAGE_MANIFEST);

    let result = Document::open(
        &ManifestOpener::new(),
        path.to_str().unwrap(),
        None,
        RenderConfig::default().with_cache_bytes(0),
    )
    .await;

    assert!(matches!(result, Err(OpenError::Config(_))));
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_export_png_and_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, "three.json", THREE_PAGE_MANIFEST);
    let document = open(&path, None).await.unwrap();
    document.wait_for_prefetch().await.unwrap();

    let encoder = PageEncoder::new();
    let page = document.get_page(PageIndex::new(2)).unwrap();

    let png = encoder.encode(&page, ExportFormat::Png).unwrap();
    let png_path = dir.path().join("page-0002.png");
    std::fs::write(&png_path, &png).unwrap();

    let decoded = image::open(&png_path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (240, 120));
    assert_eq!(decoded.as_raw(), page.as_bytes());

    let jpeg = encoder
        .encode(&page, ExportFormat::Jpeg { quality: 90 })
        .unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (240, 120));
}
