// End-to-end composition: load from disk and HTTP, render, export

use super::test_harness::{solid, write_png, png_bytes, CannedResponse, Responder};
use inkmark::watermark::{
    AssetLoader, AssetLoaderConfig, AssetStatus, CanvasDimensions, CanvasRect, CompositionSession,
    Compositor, ExportEncoder, FilenamePolicy, PointerEvent, RedrawScheduler,
};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn new_session(width: u32, height: u32) -> CompositionSession {
    CompositionSession::new(
        Compositor::new(),
        CanvasDimensions::new(width, height),
        RedrawScheduler::with_frame_rate(60),
    )
}

fn loader() -> AssetLoader {
    AssetLoader::new(AssetLoaderConfig {
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn close_to(actual: &[u8], expected: [u8; 4], tolerance: i16) -> bool {
    actual
        .iter()
        .zip(expected.iter())
        .all(|(a, e)| (*a as i16 - *e as i16).abs() <= tolerance)
}

#[tokio::test]
async fn test_compose_image_watermark_from_disk_and_export() {
    // Test: base and watermark loaded from files, watermark dragged, PNG exported
    let dir = TempDir::new().unwrap();
    let base = write_png(dir.path(), "paper.png", &solid(200, 100, [255, 255, 255, 255]));
    let logo = write_png(dir.path(), "logo.png", &solid(40, 20, [255, 0, 0, 255]));

    let loader = loader();
    let mut session = new_session(200, 100);
    assert!(session.load_base(&loader, base.to_str().unwrap()).await);
    assert!(
        session
            .load_watermark(&loader, logo.to_str().unwrap(), Some("brand logo.final.png"))
            .await
    );
    session.set_opacity(0.5).unwrap();
    session.set_scale(0.2).unwrap();

    let rect = CanvasRect::new(0.0, 0.0, 400.0, 200.0); // displayed at 2x
    session.pointer(PointerEvent::Down { x: 100.0, y: 100.0 }, &rect);
    session.pointer(PointerEvent::Move { x: 200.0, y: 100.0 }, &rect);
    session.pointer(PointerEvent::Leave, &rect);
    assert!(!session.is_dragging());

    let exported = session.export(&ExportEncoder::default()).unwrap();
    assert_eq!(exported.filename, "brand logo.png");

    let decoded = image::load_from_memory(&exported.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (200, 100));

    // Anchor (0.5, 0.5): 40x20 watermark centered at (100, 50)
    let center = decoded.get_pixel(100, 50);
    assert!(close_to(&center.0, [255, 128, 128, 255], 2), "{:?}", center);
    assert_eq!(decoded.get_pixel(5, 5).0, [255, 255, 255, 255]);
    assert_eq!(decoded.get_pixel(79, 50).0, [255, 255, 255, 255]);

    session.teardown();
}

#[tokio::test]
async fn test_watermark_loaded_over_http() {
    let logo = solid(10, 10, [0, 0, 255, 255]);
    let server = Responder::start(CannedResponse::bytes("image/png", png_bytes(&logo))).await;

    let loader = loader();
    let mut session = new_session(100, 100);
    let base = session.assign_base("data:image/png;base64,").unwrap();
    session.complete_base(&base, Ok(solid(100, 100, [0, 0, 0, 255])));

    let url = format!("{}/assets/logo.png", server.base_url());
    assert!(session.load_watermark(&loader, &url, Some("logo.png")).await);
    assert_eq!(server.hits(), 1);

    let surface = session.render_now().unwrap().unwrap();
    // Default opacity 0.5 blue over black
    assert!(close_to(&surface.get_pixel(50, 50).0, [0, 0, 128, 255], 2));
}

#[tokio::test]
async fn test_missing_base_file_leaves_nothing_to_render() {
    let loader = loader();
    let mut session = new_session(64, 64);

    // A failed load is committed, not an error
    assert!(session.load_base(&loader, "/nonexistent/inkmark/base.png").await);
    assert_eq!(session.state().base().status(), Some(AssetStatus::Failed));

    assert!(session.pump(Instant::now()).unwrap());
    assert!(session.surface().is_none());
    assert!(session.export(&ExportEncoder::default()).is_err());
}

#[tokio::test]
async fn test_reassigned_watermark_ignores_stale_fetch() {
    let dir = TempDir::new().unwrap();
    let first = write_png(dir.path(), "first.png", &solid(8, 8, [255, 0, 0, 255]));
    let second = write_png(dir.path(), "second.png", &solid(8, 8, [0, 255, 0, 255]));

    let loader = loader();
    let mut session = new_session(32, 32);
    let base = session.assign_base("base").unwrap();
    session.complete_base(&base, Ok(solid(32, 32, [0, 0, 0, 255])));
    session.set_opacity(1.0).unwrap();

    let stale = session.assign_watermark(first.to_str().unwrap(), None).unwrap();
    let current = session.assign_watermark(second.to_str().unwrap(), None).unwrap();

    // Both fetches finish; the stale one lands last
    let current_outcome = loader.fetch(&current).await;
    let stale_outcome = loader.fetch(&stale).await;
    assert!(session.complete_watermark(&current, current_outcome));
    assert!(!session.complete_watermark(&stale, stale_outcome));

    let surface = session.render_now().unwrap().unwrap();
    assert!(close_to(&surface.get_pixel(16, 16).0, [0, 255, 0, 255], 1));
}

#[tokio::test]
async fn test_text_watermark_export_uses_default_name() {
    let loader = loader();
    let dir = TempDir::new().unwrap();
    let base = write_png(dir.path(), "paper.png", &solid(1000, 400, [0, 0, 255, 255]));

    let mut session = new_session(1000, 400);
    session.load_base(&loader, base.to_str().unwrap()).await;
    session.set_text("DRAFT");

    let encoder = ExportEncoder::new(FilenamePolicy::Preserve, "boring-paper-watermarked.png");
    let exported = session.export(&encoder).unwrap();
    assert_eq!(exported.filename, "boring-paper-watermarked.png");

    let decoded = image::load_from_memory(&exported.bytes).unwrap().to_rgba8();
    let changed = decoded
        .pixels()
        .filter(|p| p.0 != [0, 0, 255, 255])
        .count();
    assert!(changed > 0);
}
