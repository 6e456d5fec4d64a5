//! Error types.
//!
//! [`Error`] aborts a conversion. [`ImageError`] never does: it is recorded in
//! [`crate::Conversion::failed_images`] and the original image reference is kept.

use std::path::PathBuf;

use web2md_core::ConfigError;

/// Fatal errors surfaced by [`crate::Converter`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {origin} as HTML: {reason}")]
    Parse { origin: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single image could not be localized.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("cannot resolve image address `{0}`")]
    Address(String),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("malformed data URI: {0}")]
    DataUri(String),

    #[error("unsupported scheme `{0}`")]
    Scheme(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An image left pointing at its original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFailure {
    /// The `src` as written in the document
    pub source: String,
    /// Human readable reason
    pub reason: String,
}
