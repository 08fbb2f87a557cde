//! End-to-end ingest pipeline tests over in-memory stores.

mod support;

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
use uuid::Uuid;

use dupli_core::{AssetKind, AssetStore, ClusterStore, IngestJob};
use dupli_jobs::{IngestPipeline, JobOutcome};
use support::{MemObjectStore, MemStore, StubRasterizer};

fn png_bytes(width: u32, height: u32, pixel: [u8; 3]) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb(pixel));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// A gradient so distinct sizes still hash consistently and non-trivially.
fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

struct Harness {
    store: Arc<MemStore>,
    storage: Arc<MemObjectStore>,
    pipeline: IngestPipeline,
}

fn harness(pages: Vec<Vec<u8>>) -> Harness {
    let store = Arc::new(MemStore::new());
    let storage = Arc::new(MemObjectStore::new());
    let pipeline = IngestPipeline::new(
        store.clone(),
        store.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(StubRasterizer::new(pages)),
    );
    Harness {
        store,
        storage,
        pipeline,
    }
}

fn job(storage_key: &str, mime_type: &str) -> IngestJob {
    IngestJob {
        owner_id: Uuid::new_v4(),
        file_id: Uuid::new_v4(),
        storage_key: storage_key.to_string(),
        mime_type: mime_type.to_string(),
    }
}

#[tokio::test]
async fn image_ingest_creates_asset_fingerprint_and_thumbnail() {
    let h = harness(Vec::new());
    h.storage.put("uploads/a.png", gradient_png(640, 480));

    let report = h.pipeline.process(&job("uploads/a.png", "image/png")).await.unwrap();

    assert_eq!(report.assets.len(), 1);
    assert!(report.clusters.is_empty());
    assert!(report.failed_pages.is_empty());

    let asset = h.store.fetch(report.assets[0]).await.unwrap();
    assert_eq!(asset.kind, AssetKind::Image);
    assert_eq!(asset.page_index, None);
    assert_eq!((asset.width, asset.height), (Some(640), Some(480)));

    let thumb_key = asset.thumb_key.expect("thumbnail attached");
    assert_eq!(thumb_key, format!("thumbs/{}.jpg", asset.id));
    let thumb = image::load_from_memory(&h.storage.get(&thumb_key).unwrap()).unwrap();
    assert_eq!(thumb.width(), 480);

    let fingerprint = h.store.fingerprint_of(asset.id).expect("fingerprint indexed");
    assert_eq!(fingerprint.hex64.len(), 16);
    assert_eq!(h.store.fingerprint_count(), 1);
}

#[tokio::test]
async fn keeper_tracks_largest_rendition_as_cluster_grows() {
    let h = harness(Vec::new());
    let owner = Uuid::new_v4();
    // One solid color at three sizes. Box-sampling a constant image gives
    // the same 32x32 matrix at every size, so all three hashes are equal.
    h.storage.put("uploads/s.png", png_bytes(640, 480, [77, 77, 77]));
    h.storage.put("uploads/l.png", png_bytes(1280, 960, [77, 77, 77]));
    h.storage.put("uploads/m.png", png_bytes(960, 720, [77, 77, 77]));

    let mut small = job("uploads/s.png", "image/png");
    small.owner_id = owner;
    let mut large = job("uploads/l.png", "image/png");
    large.owner_id = owner;
    let mut mid = job("uploads/m.png", "image/png");
    mid.owner_id = owner;

    h.pipeline.process(&small).await.unwrap();
    let r2 = h.pipeline.process(&large).await.unwrap();
    assert_eq!(r2.clusters.len(), 1);
    let cluster = r2.clusters[0];

    // Two members; the larger pixel area holds the keeper flag.
    let members = h.store.members_with_assets(cluster).await.unwrap();
    assert_eq!(members.len(), 2);
    let keeper = members.iter().find(|m| m.is_keeper).unwrap();
    assert_eq!(keeper.asset_id, r2.assets[0]);

    // A third, mid-sized copy joins the same cluster. The keeper is
    // recomputed over the full membership and stays with the largest.
    let r3 = h.pipeline.process(&mid).await.unwrap();
    assert_eq!(r3.clusters, vec![cluster]);
    let members = h.store.members_with_assets(cluster).await.unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members.iter().filter(|m| m.is_keeper).count(), 1);
    let keeper = members.iter().find(|m| m.is_keeper).unwrap();
    assert_eq!((keeper.width, keeper.height), (Some(1280), Some(960)));
}

#[tokio::test]
async fn duplicate_uploads_end_up_clustered() {
    let h = harness(Vec::new());
    let owner = Uuid::new_v4();
    // The same file uploaded twice under different keys: identical hashes.
    h.storage.put("uploads/a.png", gradient_png(640, 480));
    h.storage.put("uploads/b.png", gradient_png(640, 480));

    let mut first = job("uploads/a.png", "image/png");
    first.owner_id = owner;
    let mut second = job("uploads/b.png", "image/png");
    second.owner_id = owner;

    let r1 = h.pipeline.process(&first).await.unwrap();
    let r2 = h.pipeline.process(&second).await.unwrap();

    assert!(r1.clusters.is_empty());
    assert_eq!(r2.clusters.len(), 1);

    let members = h.store.members_with_assets(r2.clusters[0]).await.unwrap();
    assert_eq!(members.len(), 2);
    // Equal areas fall back to first-seen membership order. The merge
    // inserts the triggering asset before its neighbors, so the second
    // upload holds the keeper flag.
    let keeper = members.iter().find(|m| m.is_keeper).unwrap();
    assert_eq!(keeper.asset_id, r2.assets[0]);
}

#[tokio::test]
async fn unsupported_mime_type_is_a_recorded_noop() {
    let h = harness(Vec::new());
    h.storage.put("uploads/doc.txt", b"plain text".to_vec());

    let report = h.pipeline.process(&job("uploads/doc.txt", "text/plain")).await.unwrap();

    assert!(report.assets.is_empty());
    assert!(report.clusters.is_empty());
    assert_eq!(h.store.asset_count(), 0);
}

#[tokio::test]
async fn missing_upload_is_retryable() {
    let h = harness(Vec::new());
    let outcome = h.pipeline.process_ingest_job(&job("uploads/gone.png", "image/png")).await;
    assert!(matches!(outcome, JobOutcome::Retry(_)));
}

#[tokio::test]
async fn undecodable_image_fails_permanently() {
    let h = harness(Vec::new());
    h.storage.put("uploads/bad.png", b"not a png at all".to_vec());

    let outcome = h.pipeline.process_ingest_job(&job("uploads/bad.png", "image/png")).await;
    assert!(matches!(outcome, JobOutcome::Failed(_)));
    assert_eq!(h.store.asset_count(), 0);
}

#[tokio::test]
async fn pdf_pages_become_sequential_page_assets() {
    let h = harness(vec![gradient_png(300, 400), png_bytes(300, 400, [9, 9, 9])]);
    h.storage.put("uploads/doc.pdf", b"%PDF-1.7 irrelevant to the stub".to_vec());

    let report = h.pipeline.process(&job("uploads/doc.pdf", "application/pdf")).await.unwrap();

    assert_eq!(report.assets.len(), 2);
    assert!(report.failed_pages.is_empty());
    for (i, asset_id) in report.assets.iter().enumerate() {
        let asset = h.store.fetch(*asset_id).await.unwrap();
        assert_eq!(asset.kind, AssetKind::PdfPage);
        assert_eq!(asset.page_index, Some(i as i32));
        assert!(asset.thumb_key.is_some());
    }
}

#[tokio::test]
async fn failed_page_does_not_undo_its_siblings() {
    let h = harness(vec![
        gradient_png(300, 400),
        b"garbage page bytes".to_vec(),
        png_bytes(300, 400, [50, 60, 70]),
    ]);
    h.storage.put("uploads/doc.pdf", b"%PDF-1.7".to_vec());

    let outcome = h.pipeline.process_ingest_job(&job("uploads/doc.pdf", "application/pdf")).await;

    let report = match outcome {
        JobOutcome::Success(report) => report,
        other => panic!("partial page failure must not fail the job: {:?}", other),
    };
    assert_eq!(report.assets.len(), 2);
    assert_eq!(report.failed_pages.len(), 1);
    assert_eq!(report.failed_pages[0].page_index, 1);

    // Pages 0 and 2 persisted with their original page numbers.
    let first = h.store.fetch(report.assets[0]).await.unwrap();
    let last = h.store.fetch(report.assets[1]).await.unwrap();
    assert_eq!(first.page_index, Some(0));
    assert_eq!(last.page_index, Some(2));
}

#[tokio::test]
async fn identical_pdf_pages_cluster_together() {
    let page = gradient_png(300, 400);
    let h = harness(vec![page.clone(), page]);
    h.storage.put("uploads/doc.pdf", b"%PDF-1.7".to_vec());

    let report = h.pipeline.process(&job("uploads/doc.pdf", "application/pdf")).await.unwrap();

    assert_eq!(report.assets.len(), 2);
    assert_eq!(report.clusters.len(), 1);
    let members = h.store.members_with_assets(report.clusters[0]).await.unwrap();
    assert_eq!(members.iter().filter(|m| m.is_keeper).count(), 1);
}
