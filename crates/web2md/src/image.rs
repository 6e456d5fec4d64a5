//! Image localization: resolve, fetch, name, persist and deduplicate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use web2md_core::ConverterConfig;

use crate::error::ImageError;
use crate::fetch::get_with_retries;

/// Extension used when neither the content type nor the address names one.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Longest stem kept from a source file name
const MAX_STEM_LEN: usize = 50;

/// Map an image MIME type to a file extension.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" | "image/x-ms-bmp" => "bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "image/avif" => "avif",
        "image/tiff" => "tiff",
        _ => return None,
    };
    Some(ext)
}

/// Known image extension of the last path segment, normalized.
fn extension_for_path(path: &str) -> Option<&'static str> {
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => "jpg",
        "png" => "png",
        "gif" => "gif",
        "webp" => "webp",
        "svg" => "svg",
        "bmp" => "bmp",
        "ico" => "ico",
        "avif" => "avif",
        "tif" | "tiff" => "tiff",
        _ => return None,
    };
    Some(ext)
}

/// File stem of the last path segment reduced to `[A-Za-z0-9_-]`.
fn sanitized_stem(path: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or("");
    let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
    let mut out = String::new();
    for c in stem.chars() {
        if out.len() >= MAX_STEM_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn short_hash(address: &str) -> String {
    Sha256::digest(address.as_bytes())
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Reference to a local image as written into Markdown: forward slashes only.
pub fn local_target(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Where an image's bytes come from.
enum ImageSource {
    Remote(Url),
    Local(PathBuf),
    Inline { mime: String, payload: String },
}

/// Downloads images into a folder and remembers where each one went.
///
/// The cache outlives a single conversion: every `convert_*` call on the
/// owning converter reuses earlier downloads.
pub struct ImageHandler {
    client: Client,
    folder: PathBuf,
    max_size: u64,
    max_retries: u32,
    fallback_extension: String,
    cache: HashMap<String, PathBuf>,
    counter: u64,
}

impl ImageHandler {
    /// Create a handler sharing the converter's HTTP client.
    pub fn new(config: &ConverterConfig, client: Client) -> Self {
        Self {
            client,
            folder: config.image_folder.clone(),
            max_size: config.max_image_size,
            max_retries: config.max_retries,
            fallback_extension: DEFAULT_EXTENSION.to_string(),
            cache: HashMap::new(),
            counter: 0,
        }
    }

    /// Replace the extension used when nothing else identifies the format.
    pub fn with_fallback_extension(mut self, ext: &str) -> Self {
        self.fallback_extension = ext.trim_start_matches('.').to_string();
        self
    }

    /// Source address to local path for every image written so far
    pub fn cached_images(&self) -> &HashMap<String, PathBuf> {
        &self.cache
    }

    /// Localize one image and return its path.
    ///
    /// A previously localized address returns the cached path without any
    /// I/O. The cache entry is written only after the file is complete, so an
    /// abandoned call leaves no trace in it.
    pub async fn acquire(&mut self, src: &str, base: Option<&Url>) -> Result<PathBuf, ImageError> {
        let (key, source) = resolve(src.trim(), base)?;
        if let Some(path) = self.cache.get(&key) {
            debug!(%key, path = %path.display(), "image cache hit");
            return Ok(path.clone());
        }

        let (bytes, mime, path_hint) = match source {
            ImageSource::Remote(url) => {
                let (bytes, mime) = self.fetch_remote(&url).await?;
                (bytes, mime, url.path().to_string())
            }
            ImageSource::Local(path) => {
                let bytes = self.read_local(&path).await?;
                let hint = path.to_string_lossy().replace('\\', "/");
                (bytes, None, hint)
            }
            ImageSource::Inline { mime, payload } => {
                let bytes = decode_data_payload(&payload)?;
                self.check_size(bytes.len() as u64)?;
                (bytes, Some(mime), String::new())
            }
        };

        let ext = mime
            .as_deref()
            .and_then(extension_for_mime)
            .or_else(|| extension_for_path(&path_hint))
            .map(str::to_string)
            .unwrap_or_else(|| self.fallback_extension.clone());

        let name = self.file_name(&key, &path_hint, &ext);
        let path = self.folder.join(name);
        tokio::fs::create_dir_all(&self.folder)
            .await
            .map_err(|source| ImageError::Io {
                path: self.folder.clone(),
                source,
            })?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| ImageError::Io {
                path: path.clone(),
                source,
            })?;

        info!(%key, path = %path.display(), bytes = bytes.len(), "saved image");
        self.cache.insert(key, path.clone());
        Ok(path)
    }

    fn file_name(&mut self, key: &str, path_hint: &str, ext: &str) -> String {
        let hash = short_hash(key);
        let stem = sanitized_stem(path_hint);
        if stem.is_empty() {
            self.counter += 1;
            format!("image-{}-{}.{}", self.counter, hash, ext)
        } else {
            format!("{}-{}.{}", stem, hash, ext)
        }
    }

    fn check_size(&self, size: u64) -> Result<(), ImageError> {
        if self.max_size != 0 && size > self.max_size {
            return Err(ImageError::TooLarge {
                size,
                limit: self.max_size,
            });
        }
        Ok(())
    }

    async fn fetch_remote(&self, url: &Url) -> Result<(Vec<u8>, Option<String>), ImageError> {
        let mut response = get_with_retries(&self.client, url, self.max_retries).await?;

        if let Some(declared) = response.content_length() {
            self.check_size(declared)?;
        }
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            bytes.extend_from_slice(&chunk);
            self.check_size(bytes.len() as u64)?;
        }
        Ok((bytes, mime))
    }

    async fn read_local(&self, path: &Path) -> Result<Vec<u8>, ImageError> {
        let io_error = |source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        };
        let metadata = tokio::fs::metadata(path).await.map_err(io_error)?;
        self.check_size(metadata.len())?;
        tokio::fs::read(path).await.map_err(io_error)
    }
}

/// Resolve `src` to a cache key and a byte source.
fn resolve(src: &str, base: Option<&Url>) -> Result<(String, ImageSource), ImageError> {
    if src.is_empty() {
        return Err(ImageError::Address(src.to_string()));
    }
    if let Some(rest) = src.strip_prefix("data:") {
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| ImageError::DataUri("missing `,`".to_string()))?;
        let mut params = meta.split(';');
        let mime = params.next().unwrap_or("").trim().to_string();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ImageError::DataUri("only base64 payloads are supported".to_string()));
        }
        let source = ImageSource::Inline {
            mime,
            payload: payload.to_string(),
        };
        return Ok((src.to_string(), source));
    }

    let url = base
        .map_or_else(|| Url::parse(src), |base| base.join(src))
        .map_err(|_| ImageError::Address(src.to_string()))?;

    let source = match url.scheme() {
        "http" | "https" => ImageSource::Remote(url.clone()),
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| ImageError::Address(src.to_string()))?;
            ImageSource::Local(path)
        }
        other => return Err(ImageError::Scheme(other.to_string())),
    };
    Ok((url.to_string(), source))
}

fn decode_data_payload(payload: &str) -> Result<Vec<u8>, ImageError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|err| ImageError::DataUri(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::build_client;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn handler(dir: &TempDir) -> ImageHandler {
        let config = ConverterConfig {
            download_images: true,
            image_folder: dir.path().join("images"),
            max_retries: 1,
            timeout: 5,
            ..Default::default()
        };
        ImageHandler::new(&config, build_client(&config).unwrap())
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_mime("image/PNG; q=1"), Some("png"));
        assert_eq!(extension_for_mime("image/svg+xml"), Some("svg"));
        assert_eq!(extension_for_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_extension_for_path() {
        assert_eq!(extension_for_path("/a/b/photo.JPEG"), Some("jpg"));
        assert_eq!(extension_for_path("/a/b.d/photo"), None);
        assert_eq!(extension_for_path("/icon.ico"), Some("ico"));
        assert_eq!(extension_for_path("/archive.zip"), None);
    }

    #[test]
    fn test_sanitized_stem() {
        assert_eq!(sanitized_stem("/img/My Photo (1).png"), "My-Photo-1");
        assert_eq!(sanitized_stem("/img/"), "");
        assert_eq!(sanitized_stem(""), "");
        assert_eq!(sanitized_stem(&format!("/{}.png", "a".repeat(80))).len(), MAX_STEM_LEN);
    }

    #[test]
    fn test_local_target() {
        assert_eq!(local_target(Path::new("images/a.png")), "images/a.png");
        assert_eq!(local_target(Path::new("my images/a.png")), "my images/a.png");
    }

    #[tokio::test]
    async fn test_acquire_downloads_once() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/img/logo");
                then.status(200).header("content-type", "image/png").body(PNG);
            })
            .await;

        let mut images = handler(&dir);
        let base = Url::parse(&server.url("/page.html")).unwrap();
        let first = images.acquire("img/logo", Some(&base)).await.unwrap();
        let second = images.acquire(&server.url("/img/logo"), None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.extension().unwrap(), "png");
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("logo-"));
        assert_eq!(std::fs::read(&first).unwrap(), PNG);
        assert_eq!(images.cached_images().len(), 1);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_extension_from_path_then_fallback() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).header("content-type", "application/octet-stream").body(PNG);
            })
            .await;

        let mut images = handler(&dir);
        let gif = images.acquire(&server.url("/a/pic.gif"), None).await.unwrap();
        assert_eq!(gif.extension().unwrap(), "gif");

        let plain = images.acquire(&server.url("/a/pic"), None).await.unwrap();
        assert_eq!(plain.extension().unwrap(), "jpg");

        let mut images = handler(&dir).with_fallback_extension(".bin");
        let other = images.acquire(&server.url("/b/pic"), None).await.unwrap();
        assert_eq!(other.extension().unwrap(), "bin");
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/big.png");
                then.status(200).body(vec![0u8; 64]);
            })
            .await;

        let config = ConverterConfig {
            image_folder: dir.path().join("images"),
            max_image_size: 16,
            ..Default::default()
        };
        let mut images = ImageHandler::new(&config, build_client(&config).unwrap());
        let err = images.acquire(&server.url("/big.png"), None).await.unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { limit: 16, .. }));
        assert!(images.cached_images().is_empty());
        assert!(!dir.path().join("images").exists());
    }

    #[tokio::test]
    async fn test_not_found_is_an_error() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.png");
                then.status(404);
            })
            .await;

        let mut images = handler(&dir);
        let err = images.acquire(&server.url("/gone.png"), None).await.unwrap_err();
        assert!(matches!(err, ImageError::Network(_)));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_data_uri() {
        let dir = TempDir::new().unwrap();
        let mut images = handler(&dir);
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(PNG));

        let path = images.acquire(&uri, None).await.unwrap();
        assert_eq!(path.extension().unwrap(), "png");
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("image-1-"));
        assert_eq!(std::fs::read(&path).unwrap(), PNG);
        assert_eq!(images.acquire(&uri, None).await.unwrap(), path);

        let err = images.acquire("data:image/svg+xml,<svg/>", None).await.unwrap_err();
        assert!(matches!(err, ImageError::DataUri(_)));
    }

    #[tokio::test]
    async fn test_file_image_relative_to_local_document() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("site/pics")).unwrap();
        std::fs::write(dir.path().join("site/pics/cat.webp"), PNG).unwrap();

        let mut images = handler(&dir);
        let base = Url::from_file_path(dir.path().join("site/index.html")).unwrap();
        let path = images.acquire("pics/cat.webp", Some(&base)).await.unwrap();
        assert_eq!(path.extension().unwrap(), "webp");
        assert_eq!(std::fs::read(path).unwrap(), PNG);
    }

    #[tokio::test]
    async fn test_unresolvable_addresses() {
        let dir = TempDir::new().unwrap();
        let mut images = handler(&dir);
        assert!(matches!(
            images.acquire("relative.png", None).await,
            Err(ImageError::Address(_))
        ));
        assert!(matches!(
            images.acquire("ftp://host/x.png", None).await,
            Err(ImageError::Scheme(_))
        ));
    }
}
