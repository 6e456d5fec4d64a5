//! # web2md
//!
//! Convert web pages and HTML files to Markdown.
//!
//! A [`Converter`] acquires a document (over HTTP, from disk or from a
//! string), parses it into a [`Node`] tree, and walks the tree with an ordered
//! [`HandlerRegistry`] of element handlers. Images can be downloaded into a
//! local folder on the way; an image that fails to download keeps its
//! original reference and is reported in [`Conversion::failed_images`].
//!
//! ## Design
//!
//! The handlers consume a parser-agnostic [`Node`] structure:
//!
//! - **Parser agnostic**: any HTML parser can build the tree; [`parse_html`]
//!   does it with `scraper`
//! - **Extensible**: handlers are trait objects registered by name, tried in
//!   order, with a transparent fallback for everything unclaimed
//! - **Isolated**: all mutable state of a conversion lives in one
//!   [`ConversionContext`]
//!
//! ## Example
//!
//! ```rust
//! use web2md::{Converter, ConverterConfig, Node};
//!
//! let runtime = tokio::runtime::Builder::new_current_thread()
//!     .enable_all()
//!     .build()
//!     .unwrap();
//!
//! let mut converter = Converter::new(ConverterConfig::default()).unwrap();
//!
//! let mut h1 = Node::element("h1");
//! h1.add_child(Node::text("Hello World"));
//!
//! let result = runtime.block_on(converter.convert_node(&h1, None));
//! assert_eq!(result.markdown, "# Hello World\n");
//! ```

mod context;
mod converter;
mod error;
mod fetch;
mod handlers;
pub mod html;
mod image;
pub mod node;
mod utilities;

pub use context::{ConversionContext, ListScope};
pub use converter::{Conversion, Converter};
pub use error::{Error, ImageError, ImageFailure, Result};
pub use fetch::{build_client, fetch_document, get_with_retries, FetchedDocument};
pub use handlers::{
    finish_paragraph, render_container, render_inline, render_inline_node, BlockquoteHandler,
    BoxFuture, CodeBlockHandler, ElementHandler, HandlerRegistry, HeadingHandler, HiddenHandler,
    HorizontalRuleHandler, ListHandler, ParagraphHandler, TableHandler,
};
pub use html::{decode_html, extract_main_content, parse_html};
pub use image::{extension_for_mime, local_target, ImageHandler, DEFAULT_EXTENSION};
pub use node::{Node, NodeType};
pub use utilities::{is_block, is_skipped, BLOCK_ELEMENTS, SKIPPED_ELEMENTS};

pub use web2md_core::{CodeBlockStyle, ConfigError, ConverterConfig, HeadingStyle};
