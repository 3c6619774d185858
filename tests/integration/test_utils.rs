//! Test utilities for integration tests.
//!
//! This module provides image generators, a multipart body builder, a small
//! ZIP reader, and a router wired to a temporary storage directory.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use http_body_util::BodyExt;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, LumaA, Rgb, RgbImage, Rgba, RgbaImage,
};
use tempfile::TempDir;

use pixpress::{
    create_router, ArtifactStore, CompressService, FsBlobStore, PipelineConfig, RouterConfig,
    StoreConfig,
};

// =============================================================================
// Image Generators
// =============================================================================

/// A gradient RGB image.
pub fn rgb_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
    }))
}

/// Encode an image in the given container format.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&rgb_image(width, height), ImageFormat::Png)
}

pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| Rgba([200, 10, 10, (x * 8) as u8]));
    encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

pub fn gray_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| image::Luma([((x + y) * 3) as u8]));
    encode(&DynamicImage::ImageLuma8(img), ImageFormat::Png)
}

pub fn gray_alpha_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = GrayAlphaImage::from_fn(width, height, |x, _| LumaA([90, (x * 8) as u8]));
    encode(&DynamicImage::ImageLumaA8(img), ImageFormat::Png)
}

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&rgb_image(width, height), ImageFormat::Bmp)
}

pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&rgb_image(width, height).to_rgba8().into(), ImageFormat::Gif)
}

/// Check that bytes are a decodable three-channel JPEG.
pub fn is_valid_rgb_jpeg(data: &[u8]) -> bool {
    if data.len() < 4 || data[..2] != [0xFF, 0xD8] || data[data.len() - 2..] != [0xFF, 0xD9] {
        return false;
    }
    match image::load_from_memory_with_format(data, ImageFormat::Jpeg) {
        Ok(img) => img.color() == image::ColorType::Rgb8,
        Err(_) => false,
    }
}

// =============================================================================
// Multipart Builder
// =============================================================================

const BOUNDARY: &str = "pixpress-test-boundary-7MA4YWxkTrZu0gW";

/// Builds a `multipart/form-data` request body.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file part.
    pub fn file(mut self, field: &str, filename: &str, data: &[u8]) -> Self {
        let content_type = match filename.rsplit_once('.').map(|(_, ext)| ext) {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            _ => "application/octet-stream",
        };
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, field, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Add an image to the `files` field.
    pub fn image(self, filename: &str, data: &[u8]) -> Self {
        self.file("files", filename, data)
    }

    /// Add a text part.
    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, field, value
            )
            .as_bytes(),
        );
        self
    }

    /// Finish the body and wrap it in a POST request.
    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

// =============================================================================
// ZIP Reader
// =============================================================================

/// Read every entry of a ZIP archive as `(name, contents)`, in central
/// directory order.
pub fn read_zip(zip: &[u8]) -> Vec<(String, Vec<u8>)> {
    assert!(zip.len() >= 22, "archive shorter than end record");
    let eocd = &zip[zip.len() - 22..];
    assert_eq!(&eocd[..4], b"PK\x05\x06");

    let mut c = Cursor::new(&eocd[10..]);
    let total = c.read_u16::<LittleEndian>().unwrap() as usize;
    let _cd_size = c.read_u32::<LittleEndian>().unwrap();
    let mut pos = c.read_u32::<LittleEndian>().unwrap() as usize;

    let mut entries = Vec::with_capacity(total);
    for _ in 0..total {
        let header = &zip[pos..];
        assert_eq!(&header[..4], b"PK\x01\x02");

        let mut c = Cursor::new(&header[10..]);
        let method = c.read_u16::<LittleEndian>().unwrap();
        assert_eq!(method, 8, "entries are deflated");
        let _time = c.read_u16::<LittleEndian>().unwrap();
        let _date = c.read_u16::<LittleEndian>().unwrap();
        let crc = c.read_u32::<LittleEndian>().unwrap();
        let compressed = c.read_u32::<LittleEndian>().unwrap() as usize;
        let uncompressed = c.read_u32::<LittleEndian>().unwrap() as usize;
        let name_len = c.read_u16::<LittleEndian>().unwrap() as usize;
        let extra_len = c.read_u16::<LittleEndian>().unwrap() as usize;
        let comment_len = c.read_u16::<LittleEndian>().unwrap() as usize;

        let mut c = Cursor::new(&header[42..]);
        let local_offset = c.read_u32::<LittleEndian>().unwrap() as usize;
        let name = String::from_utf8(header[46..46 + name_len].to_vec()).unwrap();

        let local = &zip[local_offset..];
        assert_eq!(&local[..4], b"PK\x03\x04");
        let mut c = Cursor::new(&local[26..]);
        let local_name_len = c.read_u16::<LittleEndian>().unwrap() as usize;
        let local_extra_len = c.read_u16::<LittleEndian>().unwrap() as usize;
        let start = local_offset + 30 + local_name_len + local_extra_len;

        let mut data = Vec::with_capacity(uncompressed);
        DeflateDecoder::new(&zip[start..start + compressed])
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data.len(), uncompressed);
        assert_eq!(crc32fast::hash(&data), crc, "crc mismatch for {}", name);

        entries.push((name, data));
        pos += 46 + name_len + extra_len + comment_len;
    }
    entries
}

pub fn entry_names(entries: &[(String, Vec<u8>)]) -> Vec<&str> {
    entries.iter().map(|(name, _)| name.as_str()).collect()
}

// =============================================================================
// Test Application
// =============================================================================

/// A router backed by a temporary storage directory.
pub struct TestApp {
    pub router: Router,
    pub service: Arc<CompressService<FsBlobStore>>,
    pub dir: TempDir,
}

impl TestApp {
    /// Default settings with a 60 s download retention.
    pub fn new() -> Self {
        Self::with_config(Duration::from_secs(60), RouterConfig::new().with_tracing(false))
    }

    /// Custom retention window and router settings. Starts the expiry worker,
    /// so this must be called inside a Tokio runtime.
    pub fn with_config(retention: Duration, router_config: RouterConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().to_path_buf();
        Self::build(dir, &storage, retention, router_config)
    }

    /// Storage pointed at a regular file, so every archive write fails.
    pub fn with_unwritable_storage() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("blocked");
        std::fs::write(&storage, b"").unwrap();
        Self::build(
            dir,
            &storage,
            Duration::from_secs(60),
            RouterConfig::new().with_tracing(false),
        )
    }

    fn build(
        dir: TempDir,
        storage: &Path,
        retention: Duration,
        router_config: RouterConfig,
    ) -> Self {
        let store_config = StoreConfig::new(storage)
            .with_download_retention(retention)
            .with_sweep_interval(Duration::from_millis(50));
        let store = Arc::new(ArtifactStore::new(FsBlobStore::new(storage), store_config));
        store.clone().spawn_expiry_worker();

        let pipeline = PipelineConfig {
            workers: 2,
            ..Default::default()
        };
        let service = Arc::new(CompressService::new(store, pipeline).unwrap());
        let router = create_router(service.clone(), router_config);

        Self {
            router,
            service,
            dir,
        }
    }

    /// Names of the files currently in the storage directory.
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }
}

/// Collect a response body.
pub async fn body_bytes(response: Response<Body>) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = body_bytes(response).await;
    serde_json::from_slice(&body).unwrap()
}

/// A GET request with an empty body.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
