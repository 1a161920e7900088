//! Image resolution for the pixel endpoint
//!
//! Serves a local file from the upload directory, proxies a remote URL, or
//! falls back to a transparent 1x1 GIF. Resolution never fails: any error on
//! the local or remote path degrades to the pixel, because image delivery
//! must proceed regardless of what else goes wrong.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Transparent 1x1 GIF served when no real image is requested or available
pub const TRACKING_PIXEL_GIF: [u8; 41] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // 1x1, global color table
    0xff, 0xff, 0xff, 0x00, 0xff, // palette
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // graphic control (transparent)
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, // image descriptor
    0x44, 0x00, 0x3b, // minimal data + trailer
];

const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// What the pixel endpoint ends up serving
#[derive(Debug)]
pub enum ServedImage {
    /// A file from the upload directory
    Local {
        bytes: Vec<u8>,
        content_type: String,
        filename: String,
    },
    /// Bytes proxied from a remote URL
    Remote {
        bytes: Vec<u8>,
        content_type: String,
        url: String,
    },
    /// The transparent 1x1 GIF
    Pixel,
}

pub struct ImageStore {
    upload_dir: PathBuf,
    http: reqwest::Client,
}

impl ImageStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            http: reqwest::Client::builder()
                .timeout(REMOTE_FETCH_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Resolve the `image` query parameter to something servable
    pub async fn resolve(&self, image_param: Option<&str>) -> ServedImage {
        let Some(param) = image_param.filter(|p| !p.is_empty()) else {
            return ServedImage::Pixel;
        };

        if param.starts_with("http://") || param.starts_with("https://") {
            return self.fetch_remote(param).await;
        }
        self.read_local(param).await
    }

    async fn read_local(&self, name: &str) -> ServedImage {
        // Only the final path component is honored, so "../../etc/passwd"
        // resolves inside the upload directory or not at all
        let Some(filename) = Path::new(name).file_name().and_then(|f| f.to_str()) else {
            return ServedImage::Pixel;
        };
        let path = self.upload_dir.join(filename);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let content_type = mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .to_string();
                ServedImage::Local {
                    bytes,
                    content_type,
                    filename: filename.to_string(),
                }
            }
            Err(err) => {
                debug!(filename = %filename, error = %err, "local image not served");
                ServedImage::Pixel
            }
        }
    }

    async fn fetch_remote(&self, url: &str) -> ServedImage {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %url, error = %err, "remote image fetch failed");
                return ServedImage::Pixel;
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        match response.bytes().await {
            Ok(bytes) => ServedImage::Remote {
                bytes: bytes.to_vec(),
                content_type,
                url: url.to_string(),
            },
            Err(err) => {
                warn!(url = %url, error = %err, "remote image body read failed");
                ServedImage::Pixel
            }
        }
    }
}
