//! web2md-core - configuration and Markdown text utilities
//!
//! This crate holds the parts of web2md that do no network or DOM work: the
//! [`ConverterConfig`] value object with its JSON loading, and the pure text
//! functions the element handlers build on (whitespace normalization,
//! escaping, wrapping and fence selection).
//!
//! # Example
//!
//! ```rust
//! use web2md_core::{escape_markdown, wrap_text, ConverterConfig};
//!
//! let config = ConverterConfig::from_json_str(r#"{"line_width": 20}"#).unwrap();
//! let text = escape_markdown("*not emphasis* but a long enough sentence");
//! let wrapped = wrap_text(&text, config.line_width);
//! assert!(wrapped.lines().count() > 1);
//! ```

mod config;
mod text;

pub use config::{
    CodeBlockStyle, ConfigError, ConverterConfig, HeadingStyle, DEFAULT_MAX_IMAGE_SIZE,
    DEFAULT_USER_AGENT,
};
pub use text::{
    clean_text, code_fence, collapse_whitespace, display_width, escape_markdown,
    escape_table_cell, inline_code, longest_run, normalize_blank_lines, prefix_lines, wrap_text,
};
