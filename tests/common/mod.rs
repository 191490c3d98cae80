//! Shared fixtures: a fake upstream API and a configured app.
#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing;
use axum::{Json, Router};
use clap::Parser;
use http_body_util::{BodyExt, Full};
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use icongen::cli::CliOptions;
use icongen::config::AppConfig;
use icongen::web::AppState;

/// Completion the fake text API hands back
pub const ENHANCED_TEXT: &str = "  \"A bold minimalist blue circle on a clean white background\"  ";

struct UpstreamState {
    addr: SocketAddr,
    image_status: AtomicU16,
    image_requests: AtomicU32,
    completion_requests: AtomicU32,
    image_delay_ms: AtomicU64,
    stream_file: AtomicBool,
    file: Mutex<Vec<u8>>,
}

/// Image and text APIs on a random local port.
pub struct MockUpstream {
    state: Arc<UpstreamState>,
    handle: JoinHandle<()>,
}

fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 200, 255])
    });
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode sample png");
    bytes.into_inner()
}

async fn images_handler(State(state): State<Arc<UpstreamState>>) -> Response {
    state.image_requests.fetch_add(1, Ordering::Relaxed);
    let delay = state.image_delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let status = StatusCode::from_u16(state.image_status.load(Ordering::Relaxed))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !status.is_success() {
        return (
            status,
            Json(json!({"error": {"message": "upstream says no", "type": "test"}})),
        )
            .into_response();
    }
    Json(json!({
        "created": 1_700_000_000,
        "data": [{"url": format!("http://{}/files/image.png", state.addr)}],
    }))
    .into_response()
}

async fn file_handler(State(state): State<Arc<UpstreamState>>) -> Response {
    let bytes = Bytes::from(state.file.lock().expect("file lock").clone());
    if state.stream_file.load(Ordering::Relaxed) {
        // no exact size hint, so the body goes out chunked without Content-Length
        let body = Body::new(Full::new(bytes).map_frame(|frame| frame));
        return ([(CONTENT_TYPE, "image/png")], body).into_response();
    }
    ([(CONTENT_TYPE, "image/png")], bytes).into_response()
}

async fn completions_handler(State(state): State<Arc<UpstreamState>>) -> Json<Value> {
    state.completion_requests.fetch_add(1, Ordering::Relaxed);
    Json(json!({"choices": [{"text": ENHANCED_TEXT, "index": 0}]}))
}

impl MockUpstream {
    /// Starts the server; images succeed until told otherwise
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(UpstreamState {
            addr,
            image_status: AtomicU16::new(200),
            image_requests: AtomicU32::new(0),
            completion_requests: AtomicU32::new(0),
            image_delay_ms: AtomicU64::new(0),
            stream_file: AtomicBool::new(false),
            file: Mutex::new(sample_png(256, 256)),
        });
        let app = Router::new()
            .route("/v1/images/generations", routing::post(images_handler))
            .route("/v1/completions", routing::post(completions_handler))
            .route("/files/image.png", routing::get(file_handler))
            .with_state(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Self { state, handle }
    }

    /// Makes the image API answer with `status`
    pub fn fail_images_with(&self, status: u16) {
        self.state.image_status.store(status, Ordering::Relaxed);
    }

    /// Makes the image API wait before answering
    pub fn delay_images_by(&self, delay: Duration) {
        self.state
            .image_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Replaces the bytes served as the generated image
    pub fn serve_file(&self, bytes: Vec<u8>) {
        *self.state.file.lock().expect("file lock") = bytes;
    }

    /// Serves the generated image chunked, without a Content-Length
    pub fn stream_file_without_length(&self) {
        self.state.stream_file.store(true, Ordering::Relaxed);
    }

    /// Image generation endpoint
    pub fn images_url(&self) -> String {
        format!("http://{}/v1/images/generations", self.state.addr)
    }

    /// Text completion endpoint
    pub fn completions_url(&self) -> String {
        format!("http://{}/v1/completions", self.state.addr)
    }

    /// Image API calls so far
    pub fn image_requests(&self) -> u32 {
        self.state.image_requests.load(Ordering::Relaxed)
    }

    /// Completion API calls so far
    pub fn completion_requests(&self) -> u32 {
        self.state.completion_requests.load(Ordering::Relaxed)
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// App state pointed at the mock with everything under `root`.
pub fn app_state(upstream: &MockUpstream, root: &Path, db_logging: bool) -> AppState {
    app_state_with(upstream, root, db_logging, &[])
}

/// Like [`app_state`], with extra command line options appended.
pub fn app_state_with(
    upstream: &MockUpstream,
    root: &Path,
    db_logging: bool,
    extra: &[&str],
) -> AppState {
    let root = root.display().to_string();
    let mut args = vec![
        "icongen".to_string(),
        "--image-api-key".to_string(),
        "test-image-key".to_string(),
        "--image-api-url".to_string(),
        upstream.images_url(),
        "--text-api-key".to_string(),
        "test-text-key".to_string(),
        "--text-api-url".to_string(),
        upstream.completions_url(),
        "--output-dir".to_string(),
        format!("{root}/generated"),
        "--temp-dir".to_string(),
        format!("{root}/temp"),
        "--data-dir".to_string(),
        format!("{root}/data"),
    ];
    if db_logging {
        args.push("--enable-db-logging".to_string());
    }
    args.extend(extra.iter().map(|arg| arg.to_string()));
    let cli = CliOptions::try_parse_from(args).expect("parse args");
    let config = AppConfig::from_cli(cli).expect("valid config");
    AppState::new(config).expect("app state")
}

/// JSON POST
pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    let body = body.to_string();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, body.len())
        .header("user-agent", "integration-tests")
        .body(Body::from(body))
        .expect("request")
}

/// Regular files directly inside `dir`, zero when it doesn't exist
pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_file())
                .count()
        })
        .unwrap_or(0)
}

/// Plain GET
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

/// Reads a JSON response body
pub async fn read_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
