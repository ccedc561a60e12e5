//! Shared helpers for the HTTP integration tests.
//!
//! The app runs against in-memory stores and a temp-dir storage root, so no
//! database is needed.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;

use farmhub_api::{AppState, build_app};
use farmhub_core::config::{AppConfig, DatabaseConfig};
use farmhub_service::RevisionService;
use farmhub_service::store::memory::{MemoryCatalogStore, MemoryRevisionStore};
use farmhub_storage::LocalStorageProvider;

pub const API_KEY: &str = "test-key";
const BOUNDARY: &str = "farmhub-test-boundary";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Revision rows
    pub store: Arc<MemoryRevisionStore>,
    /// Storage root, removed on drop
    pub root: tempfile::TempDir,
}

/// Status and parsed JSON body of a response.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, Vec<u8>),
}

/// Request payload.
pub enum Payload<'a> {
    Empty,
    Json(Value),
    Form(Vec<Part<'a>>),
}

impl TestApp {
    /// Farm 1 with sector 10 (`plants` plants), and farm 2 with no sectors.
    pub async fn new(plants: i32) -> Self {
        let root = tempfile::tempdir().expect("temp dir");
        let storage = LocalStorageProvider::new(root.path())
            .await
            .expect("storage root");

        let catalog = Arc::new(MemoryCatalogStore::new());
        let farm = catalog.add_farm(1, "Finca Norte").await;
        catalog.add_sector(10, farm, plants).await;
        catalog.add_farm(2, "Finca Sur").await;
        let store = Arc::new(MemoryRevisionStore::new());

        let mut config = test_config();
        config.auth.api_key = API_KEY.to_string();
        config.intake.worker_threads = 2;

        let service = RevisionService::new(
            catalog,
            store.clone(),
            Arc::new(storage),
            &config.intake,
        );
        let router = build_app(AppState::new(config, service));

        Self {
            router,
            store,
            root,
        }
    }

    /// Send a request carrying the test API key.
    pub async fn request(&self, method: &str, path: &str, payload: Payload<'_>) -> TestResponse {
        self.request_with_key(method, path, payload, Some(API_KEY)).await
    }

    /// Send a request with an explicit (or no) API key.
    pub async fn request_with_key(
        &self,
        method: &str,
        path: &str,
        payload: Payload<'_>,
        key: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }

        let request = match payload {
            Payload::Empty => builder.body(Body::empty()),
            Payload::Json(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string())),
            Payload::Form(parts) => builder
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(&parts))),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Whether a storage key exists under the root.
    pub fn exists(&self, key: &str) -> bool {
        self.root.path().join(Path::new(key)).exists()
    }
}

/// Configuration with every default and a placeholder database URL.
pub fn test_config() -> AppConfig {
    AppConfig {
        server: Default::default(),
        database: DatabaseConfig {
            url: "postgres://unused".into(),
            max_connections: 1,
            min_connections: 0,
            connect_timeout_seconds: 1,
            idle_timeout_seconds: 1,
        },
        auth: Default::default(),
        storage: Default::default(),
        intake: Default::default(),
        logging: Default::default(),
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// A small solid-color JPEG.
pub fn jpeg(shade: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    RgbImage::from_pixel(8, 6, Rgb([shade, 120, 40]))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("encode");
    buf
}

/// A ZIP archive with the given members.
pub fn zip_of(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("zip entry");
        writer.write_all(data).expect("zip write");
    }
    writer.finish().expect("zip finish").into_inner()
}

/// A ZIP of `count` JPEGs named `IMG_000.jpg`, `IMG_001.jpg`, ...
pub fn photo_zip(count: u8) -> Vec<u8> {
    let entries: Vec<(String, Vec<u8>)> = (0..count)
        .map(|i| (format!("IMG_{i:03}.jpg"), jpeg(i.wrapping_mul(40))))
        .collect();
    let refs: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    zip_of(&refs)
}

/// The create-revision form for farm 1 / sector 10.
pub fn create_form(archive: Vec<u8>) -> Payload<'static> {
    Payload::Form(vec![
        Part::Text("farm_id", "1"),
        Part::Text("sector_id", "10"),
        Part::Text("date", "2025-03-14"),
        Part::Text("revision_type", "fitosanitaria"),
        Part::File("archive", "fotos.zip", archive),
    ])
}
