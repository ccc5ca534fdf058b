//! Image download and local storage
//!
//! Ingestion is idempotent and content-addressed by a slug derived from the
//! owning product title. Every failure path degrades to `None` so callers
//! can fall back to the original remote reference; nothing here is fatal to
//! an item.

use crate::infrastructure::http_client::HttpClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const MAX_SLUG_LEN: usize = 50;

pub struct ImageStore {
    http: Arc<HttpClient>,
    storage_root: PathBuf,
}

impl ImageStore {
    pub fn new(http: Arc<HttpClient>, storage_root: PathBuf) -> Self {
        Self { http, storage_root }
    }

    /// Fetch, validate, and persist one remote image. Returns the stored
    /// public-style path, or `None` on any failure.
    pub async fn download_and_store(&self, image_url: &str, product_title: &str) -> Option<String> {
        let filename = generate_filename(product_title, image_url);
        let dir = self.storage_root.join("products");
        let full_path = dir.join(&filename);
        let public_path = format!("/storage/products/{filename}");

        if full_path.exists() {
            info!("Image already exists: {}", filename);
            return Some(public_path);
        }

        let response = match self.http.get_raw(image_url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Error downloading image {}: {:#}", image_url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "Failed to download image {} (status {}) for '{}'",
                image_url,
                response.status(),
                product_title
            );
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if !is_valid_image_type(content_type.as_deref()) {
            warn!(
                "Invalid image content type {:?} for {}",
                content_type, image_url
            );
            return None;
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Error reading image body from {}: {}", image_url, e);
                return None;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("Failed to create image directory {}: {}", dir.display(), e);
            return None;
        }
        if let Err(e) = tokio::fs::write(&full_path, &bytes).await {
            warn!("Failed to store image {}: {}", full_path.display(), e);
            return None;
        }

        info!(
            "Image downloaded and stored: {} ({} bytes) for '{}'",
            filename,
            bytes.len(),
            product_title
        );
        Some(public_path)
    }
}

/// Deterministic filename: lossy slug of the title plus an allow-listed
/// extension inferred from the URL path. Different remote assets slugging to
/// the same name collide; accepted limitation.
pub fn generate_filename(product_title: &str, image_url: &str) -> String {
    let slug = slugify(product_title, MAX_SLUG_LEN);
    let extension = extension_from_url(image_url);
    format!("{slug}.{extension}")
}

fn slugify(input: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_sep = true;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug.truncate(max_len);
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("image");
    }
    slug
}

fn extension_from_url(image_url: &str) -> String {
    let path = match url::Url::parse(image_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => image_url.to_string(),
    };
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => ext,
        _ => "jpg".to_string(),
    }
}

fn is_valid_image_type(content_type: Option<&str>) -> bool {
    matches!(content_type, Some(ct) if ct.starts_with("image/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::HttpClientConfig;
    use tempfile::tempdir;

    #[test]
    fn filenames_are_slugged_and_extension_checked() {
        assert_eq!(
            generate_filename("Mens Cotton Jacket", "https://cdn.example.com/img/81fPKd.jpg"),
            "mens_cotton_jacket.jpg"
        );
        assert_eq!(
            generate_filename("Jacket!!", "https://cdn.example.com/img/photo.PNG"),
            "jacket.png"
        );
        // Unknown or missing extensions default to jpg
        assert_eq!(
            generate_filename("Jacket", "https://cdn.example.com/img/photo.webp"),
            "jacket.jpg"
        );
        assert_eq!(generate_filename("Jacket", "https://cdn.example.com/img/photo"), "jacket.jpg");
    }

    #[test]
    fn slug_is_truncated_and_never_empty() {
        let long_title = "a".repeat(120);
        let name = generate_filename(&long_title, "https://x.test/a.jpg");
        assert_eq!(name.len(), MAX_SLUG_LEN + 4);

        assert_eq!(generate_filename("!!!", "https://x.test/a.jpg"), "image.jpg");
    }

    #[test]
    fn content_type_must_be_an_image() {
        assert!(is_valid_image_type(Some("image/jpeg")));
        assert!(is_valid_image_type(Some("image/png")));
        assert!(!is_valid_image_type(Some("text/html")));
        assert!(!is_valid_image_type(None));
    }

    #[tokio::test]
    async fn existing_file_short_circuits_without_fetching() {
        let dir = tempdir().unwrap();
        let products = dir.path().join("products");
        tokio::fs::create_dir_all(&products).await.unwrap();
        tokio::fs::write(products.join("widget.jpg"), b"cached").await.unwrap();

        let http = Arc::new(HttpClient::new(HttpClientConfig::default()).unwrap());
        let store = ImageStore::new(http, dir.path().to_path_buf());

        // The URL is unreachable; only the cache can satisfy this call.
        let result = store
            .download_and_store("http://127.0.0.1:1/widget.jpg", "Widget")
            .await;
        assert_eq!(result.as_deref(), Some("/storage/products/widget.jpg"));
    }

    fn serve_once(status_line: &'static str, headers_and_body: &'static str) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                use std::io::{Read, Write};
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(status_line.as_bytes());
                let _ = stream.write_all(headers_and_body.as_bytes());
            }
        });
        format!("http://{addr}/missing.jpg")
    }

    #[tokio::test]
    async fn http_404_degrades_to_none() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\n", "content-length: 0\r\n\r\n");

        let dir = tempdir().unwrap();
        let http = Arc::new(HttpClient::new(HttpClientConfig {
            timeout_seconds: 5,
            ..Default::default()
        })
        .unwrap());
        let store = ImageStore::new(http, dir.path().to_path_buf());

        assert!(store.download_and_store(&url, "Widget").await.is_none());
        assert!(!dir.path().join("products").join("widget.jpg").exists());
    }

    #[tokio::test]
    async fn unreachable_host_degrades_to_none() {
        let dir = tempdir().unwrap();
        let http = Arc::new(HttpClient::new(HttpClientConfig {
            timeout_seconds: 1,
            ..Default::default()
        })
        .unwrap());
        let store = ImageStore::new(http, dir.path().to_path_buf());

        let result = store
            .download_and_store("http://127.0.0.1:1/missing.jpg", "Widget")
            .await;
        assert!(result.is_none());
    }
}
