//! Converter configuration and its JSON loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default upper bound for a single downloaded image (10 MiB).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

/// Default `User-Agent` sent with document and image requests.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; web2md/1.0)";

/// Heading style options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingStyle {
    /// Use ATX-style headings (prefixed with #)
    #[default]
    Atx,
    /// Use setext-style headings (underlined with = or -)
    /// Only works for h1 and h2, falls back to ATX for h3-h6
    Setext,
}

/// Fence used for code blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodeBlockStyle {
    /// Fenced with backticks (```)
    #[default]
    #[serde(rename = "```", alias = "backticks", alias = "backtick")]
    Backtick,
    /// Fenced with tildes (~~~)
    #[serde(rename = "~~~", alias = "tildes", alias = "tilde")]
    Tilde,
}

impl CodeBlockStyle {
    /// The character the fence is built from.
    pub fn fence_char(self) -> char {
        match self {
            CodeBlockStyle::Backtick => '`',
            CodeBlockStyle::Tilde => '~',
        }
    }
}

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Options for a converter.
///
/// The value is treated as immutable once a converter has been built from it.
/// Missing JSON fields take the defaults below and unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Download images and rewrite their `src` to the local copy
    pub download_images: bool,

    /// Folder images are written to
    pub image_folder: PathBuf,

    /// Largest image accepted, in bytes (0 disables the limit)
    pub max_image_size: u64,

    /// Render `<a>` as Markdown links; when false only the anchor text is kept
    pub include_links: bool,

    /// Keep text nodes verbatim instead of collapsing whitespace runs
    pub preserve_whitespace: bool,

    /// Fence style for code blocks
    pub code_block_style: CodeBlockStyle,

    /// Heading style (atx or setext)
    pub heading_style: HeadingStyle,

    /// Per-request timeout in seconds
    pub timeout: u64,

    /// Extra attempts after a transient network failure
    pub max_retries: u32,

    /// `User-Agent` header for all requests
    pub user_agent: String,

    /// Paragraph wrap width (0 disables wrapping)
    pub line_width: usize,

    /// Keep runs of blank lines in the final document
    pub preserve_empty_lines: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            download_images: false,
            image_folder: PathBuf::from("images"),
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            include_links: true,
            preserve_whitespace: false,
            code_block_style: CodeBlockStyle::Backtick,
            heading_style: HeadingStyle::Atx,
            timeout: 30,
            max_retries: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            line_width: 0,
            preserve_empty_lines: false,
        }
    }
}

impl ConverterConfig {
    /// Parse a configuration from a JSON string and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::parse(json, "<inline>")
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json, &path.display().to_string())
    }

    fn parse(json: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values a converter cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image_folder.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("image_folder must not be empty".into()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".into()));
        }
        if self.timeout == 0 {
            return Err(ConfigError::Invalid("timeout must be at least one second".into()));
        }
        Ok(())
    }
}
