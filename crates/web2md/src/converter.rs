//! The conversion entry point.

use std::path::Path;

use reqwest::{Client, Url};
use tracing::{info, info_span, Instrument};
use web2md_core::{normalize_blank_lines, ConverterConfig};

use crate::context::ConversionContext;
use crate::error::{Error, ImageFailure, Result};
use crate::fetch::{build_client, fetch_document};
use crate::handlers::HandlerRegistry;
use crate::html::{decode_html, extract_main_content};
use crate::image::ImageHandler;
use crate::node::Node;

/// Result of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// The Markdown document
    pub markdown: String,
    /// Images that could not be localized and kept their original reference
    pub failed_images: Vec<ImageFailure>,
}

/// Converts HTML documents to Markdown.
///
/// A converter owns one HTTP client, one handler registry and one
/// [`ImageHandler`]; images downloaded by one conversion are reused by later
/// conversions on the same converter. Independent documents can be converted
/// concurrently with one converter per task.
///
/// # Example
///
/// ```rust
/// use web2md::{Converter, ConverterConfig};
///
/// # tokio_test_block(async {
/// let mut converter = Converter::new(ConverterConfig::default()).unwrap();
/// let result = converter.convert_html("<h1>Hello</h1><p>World</p>", None).await;
/// assert_eq!(result.markdown, "# Hello\n\nWorld\n");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Converter {
    config: ConverterConfig,
    client: Client,
    images: ImageHandler,
    registry: HandlerRegistry,
}

impl Converter {
    /// Create a converter with the built-in handlers.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;
        let images = ImageHandler::new(&config, client.clone());
        Ok(Self {
            config,
            client,
            images,
            registry: HandlerRegistry::new(),
        })
    }

    /// Use `ext` for images whose format cannot be determined.
    pub fn with_fallback_extension(mut self, ext: &str) -> Self {
        self.images = self.images.with_fallback_extension(ext);
        self
    }

    /// The configuration this converter was built with
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Handler registry, for inspection
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Handler registry, for adding or replacing handlers
    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Image handler and its cache
    pub fn images(&self) -> &ImageHandler {
        &self.images
    }

    /// Fetch a web page and convert its main content.
    ///
    /// Relative links and images resolve against the final address after
    /// redirects.
    pub async fn convert_url(&mut self, url: &str) -> Result<Conversion> {
        let span = info_span!("convert_url", %url);
        async move {
            let document = fetch_document(&self.client, url, self.config.max_retries).await?;
            let html = decode_html(
                &document.body,
                document.content_type.as_deref(),
                document.url.as_str(),
            )?;
            let root = extract_main_content(&html);
            Ok(self.render(&root, Some(document.url)).await)
        }
        .instrument(span)
        .await
    }

    /// Read a local HTML file and convert its main content.
    pub async fn convert_file(&mut self, path: impl AsRef<Path>) -> Result<Conversion> {
        let path = path.as_ref();
        let span = info_span!("convert_file", path = %path.display());
        async move {
            let read_error = |source| Error::Read {
                path: path.to_path_buf(),
                source,
            };
            let bytes = tokio::fs::read(path).await.map_err(read_error)?;
            let html = decode_html(&bytes, None, &path.display().to_string())?;

            let canonical = tokio::fs::canonicalize(path).await.map_err(read_error)?;
            let base = Url::from_file_path(&canonical).ok();

            let root = extract_main_content(&html);
            Ok(self.render(&root, base).await)
        }
        .instrument(span)
        .await
    }

    /// Convert an HTML string. `base` resolves relative links and images.
    pub async fn convert_html(&mut self, html: &str, base: Option<&Url>) -> Conversion {
        let root = extract_main_content(html);
        self.render(&root, base.cloned())
            .instrument(info_span!("convert_html", bytes = html.len()))
            .await
    }

    /// Convert an already built tree as-is.
    pub async fn convert_node(&mut self, node: &Node, base: Option<&Url>) -> Conversion {
        self.render(node, base.cloned()).await
    }

    async fn render(&mut self, root: &Node, base: Option<Url>) -> Conversion {
        let mut ctx = ConversionContext::new(&self.config, &self.registry, &mut self.images, base);
        let body = ctx.dispatch(root).await;
        let failed_images = ctx.into_failed_images();

        let markdown = normalize_blank_lines(&body, self.config.preserve_empty_lines);
        info!(
            bytes = markdown.len(),
            failed_images = failed_images.len(),
            "conversion finished"
        );
        Conversion {
            markdown,
            failed_images,
        }
    }

    /// Write Markdown to `path`, creating parent directories.
    pub async fn save(&self, markdown: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let write_error = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        tokio::fs::write(path, markdown).await.map_err(write_error)?;
        info!(path = %path.display(), bytes = markdown.len(), "saved markdown");
        Ok(())
    }
}
