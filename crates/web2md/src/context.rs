//! Per-conversion mutable state threaded through the tree walk.

use std::ops::{Deref, DerefMut};

use reqwest::Url;
use tracing::warn;
use web2md_core::ConverterConfig;

use crate::error::ImageFailure;
use crate::handlers::HandlerRegistry;
use crate::image::{local_target, ImageHandler};
use crate::node::Node;

/// State for one conversion call.
///
/// Created by [`crate::Converter`] for each `convert_*` call and passed by
/// mutable reference to every handler; it is never cloned or shared between
/// conversions.
pub struct ConversionContext<'a> {
    config: &'a ConverterConfig,
    registry: &'a HandlerRegistry,
    images: &'a mut ImageHandler,
    base_url: Option<Url>,
    list_depth: usize,
    failed_images: Vec<ImageFailure>,
}

impl<'a> ConversionContext<'a> {
    /// Create a context for one conversion.
    pub fn new(
        config: &'a ConverterConfig,
        registry: &'a HandlerRegistry,
        images: &'a mut ImageHandler,
        base_url: Option<Url>,
    ) -> Self {
        Self {
            config,
            registry,
            images,
            base_url,
            list_depth: 0,
            failed_images: Vec::new(),
        }
    }

    /// Read-only configuration snapshot
    pub fn config(&self) -> &'a ConverterConfig {
        self.config
    }

    /// Handler registry driving this conversion
    pub fn registry(&self) -> &'a HandlerRegistry {
        self.registry
    }

    /// Resolved address of the source document
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Number of lists enclosing the node being rendered
    pub fn list_depth(&self) -> usize {
        self.list_depth
    }

    /// Render `node` through the first handler that claims it.
    pub async fn dispatch(&mut self, node: &Node) -> String {
        let registry = self.registry;
        registry.dispatch(node, self).await
    }

    /// Enter a nested list. The depth is restored when the scope is dropped,
    /// whether rendering finished, panicked or the future was cancelled.
    pub fn enter_list(&mut self) -> ListScope<'_, 'a> {
        self.list_depth += 1;
        ListScope { ctx: self }
    }

    /// The reference to emit for an image `src`.
    ///
    /// With downloads enabled this is the local copy; when acquisition fails
    /// the failure is recorded and the original `src` is returned unchanged.
    pub async fn image_target(&mut self, src: &str) -> String {
        if !self.config.download_images {
            return src.to_string();
        }
        if self.failed_images.iter().any(|f| f.source == src) {
            return src.to_string();
        }

        match self.images.acquire(src, self.base_url.as_ref()).await {
            Ok(path) => local_target(&path),
            Err(err) => {
                warn!(%src, error = %err, "keeping remote image reference");
                self.failed_images.push(ImageFailure {
                    source: src.to_string(),
                    reason: err.to_string(),
                });
                src.to_string()
            }
        }
    }

    /// Make a link target absolute against an http(s) base.
    pub fn resolve_link(&self, href: &str) -> String {
        if href.starts_with('#') {
            return href.to_string();
        }
        match &self.base_url {
            Some(base) if matches!(base.scheme(), "http" | "https") => base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_string()),
            _ => href.to_string(),
        }
    }

    /// Images that kept their remote reference, in document order
    pub fn into_failed_images(self) -> Vec<ImageFailure> {
        self.failed_images
    }
}

/// Scoped list nesting; see [`ConversionContext::enter_list`].
pub struct ListScope<'s, 'a> {
    ctx: &'s mut ConversionContext<'a>,
}

impl<'a> Deref for ListScope<'_, 'a> {
    type Target = ConversionContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<'a> DerefMut for ListScope<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ListScope<'_, '_> {
    fn drop(&mut self) {
        self.ctx.list_depth -= 1;
    }
}
