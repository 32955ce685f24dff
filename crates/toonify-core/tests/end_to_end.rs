use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use toonify_core::{
    ArtifactKind, Config, ContainerDecoder, Notice, PipelineError, PipelineObserver,
    PipelinePhase, Segmenter, Session, SourceFile, Stage, StageOutcome, Toonify,
};

const MIB: usize = 1024 * 1024;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([30, 144, 255, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Stands in for a HEIC decoder: ignores the container and yields a photo.
struct PhotoDecoder;

#[async_trait]
impl ContainerDecoder for PhotoDecoder {
    async fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, String> {
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            48,
            Rgba([250, 220, 200, 255]),
        )))
    }
}

struct CutoutSegmenter;

#[async_trait]
impl Segmenter for CutoutSegmenter {
    fn name(&self) -> &str {
        "cutout"
    }

    async fn remove_background(&self, _image: &[u8]) -> Result<Vec<u8>, PipelineError> {
        Ok(png_bytes(64, 48))
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Notice>>);

impl PipelineObserver for Recorder {
    fn on_notice(&self, notice: &Notice) {
        self.0.lock().unwrap().push(notice.clone());
    }
}

/// Cartoonize endpoint whose first answer is a 200 with an empty URL.
async fn start_server(cartoon: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let route_calls = calls.clone();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .route(
            "/api/cartoonize",
            post(move |body: Bytes| {
                let call = route_calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let form = String::from_utf8_lossy(&body);
                    if !form.contains("name=\"image\"") || !form.contains("filename=\"image.png\"")
                    {
                        return (StatusCode::BAD_REQUEST, "missing image part".to_string());
                    }
                    let url = if call == 0 {
                        String::new()
                    } else {
                        format!("http://{addr}/files/cartoon.png")
                    };
                    (StatusCode::OK, format!(r#"{{"cartoonUrl":"{url}"}}"#))
                }
            }),
        )
        .route(
            "/files/cartoon.png",
            get(move || {
                let data = cartoon.clone();
                async move { Body::from(data) }
            }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, calls)
}

async fn start_failing_server() -> SocketAddr {
    let app = Router::new().route(
        "/api/cartoonize",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model offline").into_response() }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr) -> Config {
    let mut config = Config::default();
    config.stylization.endpoint = format!("http://{addr}");
    config.progress.tick_ms = 5;
    config.progress.settle_ms = 50;
    config
}

#[tokio::test]
async fn heic_upload_runs_through_retry_and_export() {
    let cartoon = png_bytes(16, 16);
    let (addr, calls) = start_server(cartoon.clone()).await;
    let out = tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());

    let toonify = Toonify::new(config_for(addr))
        .with_decoder(Arc::new(PhotoDecoder))
        .with_segmenter(Arc::new(CutoutSegmenter))
        .with_observer(recorder.clone())
        .with_output_dir(out.path().to_path_buf());
    let mut session = Session::new();

    // 9 MiB HEIC container: converted first, then size-checked
    let heic = SourceFile::new("photo.HEIC", "image/heic", vec![0u8; 9 * MIB]);
    assert!(toonify.select(&mut session, Some(heic)).await.unwrap());
    let image = session.image().unwrap();
    assert_eq!(image.name, "photo.jpg");
    assert_eq!(image.media_type, "image/jpeg");
    assert_eq!(image.dimensions.map(|d| (d.width, d.height)), Some((64, 48)));

    assert!(toonify.remove_background(&mut session).await.is_committed());
    assert_eq!(session.phase(), PipelinePhase::BackgroundReady);

    let outcome = toonify.stylize(&mut session).await;
    assert!(matches!(
        outcome,
        StageOutcome::Failed(PipelineError::StylizationFailed { .. })
    ));
    assert_eq!(session.last_failed_stage(), Some(Stage::Stylization));
    assert!(session.background_removed().is_some());

    assert!(toonify.retry(&mut session).await.is_committed());
    assert_eq!(session.phase(), PipelinePhase::Stylized);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let expected_url = format!("http://{addr}/files/cartoon.png");
    assert_eq!(session.stylized().unwrap().url(), Some(expected_url.as_str()));

    let cutout_path = toonify
        .export(&session, ArtifactKind::BackgroundRemoved)
        .await
        .unwrap()
        .unwrap();
    let cartoon_path = toonify
        .export(&session, ArtifactKind::Stylized)
        .await
        .unwrap()
        .unwrap();
    assert!(cartoon_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("cartoon-"));
    assert_eq!(std::fs::read(&cartoon_path).unwrap(), cartoon);
    assert!(cutout_path.exists());

    let failures = recorder
        .0
        .lock()
        .unwrap()
        .iter()
        .filter(|n| n.is_failure())
        .count();
    assert_eq!(failures, 1);

    toonify.reset(&mut session);
    assert_eq!(session.phase(), PipelinePhase::Idle);
    assert!(session.stylized().is_none());
}

#[tokio::test]
async fn oversize_png_is_rejected() {
    let toonify = Toonify::new(Config::default()).with_segmenter(Arc::new(CutoutSegmenter));
    let mut session = Session::new();

    let big = SourceFile::new("big.png", "image/png", vec![0u8; 11 * MIB]);
    let err = toonify.select(&mut session, Some(big)).await.unwrap_err();
    match err {
        PipelineError::OversizeFile { size, max, .. } => {
            assert_eq!(size, (11 * MIB) as u64);
            assert_eq!(max, (10 * MIB) as u64);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.phase(), PipelinePhase::Idle);
}

#[tokio::test]
async fn http_error_reports_status_code() {
    let addr = start_failing_server().await;
    let toonify = Toonify::new(config_for(addr)).with_segmenter(Arc::new(CutoutSegmenter));
    let mut session = Session::new();

    let png = SourceFile::new("cat.png", "image/png", png_bytes(32, 32));
    toonify.select(&mut session, Some(png)).await.unwrap();
    toonify.remove_background(&mut session).await;

    match toonify.stylize(&mut session).await {
        StageOutcome::Failed(PipelineError::StylizationFailed { status_code, .. }) => {
            assert_eq!(status_code, Some(500));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(session.phase(), PipelinePhase::StylizationFailed);
}
