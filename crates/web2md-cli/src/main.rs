//! `web2md` command line tool.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use web2md::{Conversion, Converter};
use web2md_core::ConverterConfig;

#[derive(Parser, Debug)]
#[command(name = "web2md")]
#[command(about = "Convert a web page or local HTML file to Markdown")]
#[command(version)]
struct Cli {
    /// URL (http:// or https://) or path of an HTML file
    source: String,

    /// Write Markdown to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep remote image references even if the config enables downloads
    #[arg(long)]
    no_images: bool,

    /// Wrap paragraphs at this many columns (0 disables wrapping)
    #[arg(long)]
    width: Option<usize>,
}

impl Cli {
    fn is_url(&self) -> bool {
        let lower = self.source.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    fn load_config(&self) -> Result<ConverterConfig> {
        let mut config = match &self.config {
            Some(path) => ConverterConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ConverterConfig::default(),
        };
        if self.no_images {
            config.download_images = false;
        }
        if let Some(width) = self.width {
            config.line_width = width;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the Markdown, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    let mut converter = Converter::new(config).context("invalid configuration")?;

    let Conversion {
        markdown,
        failed_images,
    } = if cli.is_url() {
        converter
            .convert_url(&cli.source)
            .await
            .with_context(|| format!("converting {}", cli.source))?
    } else {
        converter
            .convert_file(&cli.source)
            .await
            .with_context(|| format!("converting {}", cli.source))?
    };

    for failure in &failed_images {
        warn!(src = %failure.source, reason = %failure.reason, "image not downloaded");
    }

    match &cli.output {
        Some(path) => converter
            .save(&markdown, path)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{}", markdown),
    }
    Ok(())
}
