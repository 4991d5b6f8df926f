//! Configuration for page rendering and the `page-raster` command line.
//!
//! [`RenderConfig`] is the library-facing configuration consumed by
//! [`Document`](crate::Document). The CLI types parse arguments with clap and
//! convert into a `RenderConfig`.
//!
//! # Environment Variables
//!
//! Shared render options can be set via environment variables with the
//! `PAGE_RASTER_` prefix:
//!
//! - `PAGE_RASTER_PASSWORD` - Password for protected documents
//! - `PAGE_RASTER_THUMBNAIL_SIZE` - Side of the square target box in points (default: 240)
//! - `PAGE_RASTER_DEVICE_SCALE` - Pixels per point (default: 1.0)
//! - `PAGE_RASTER_CACHE_BYTES` - Page cache budget in bytes (default: unbounded)
//! - `PAGE_RASTER_WORKERS` - Concurrent background renders (default: 4)
//! - `PAGE_RASTER_JPEG_QUALITY` - JPEG export quality (default: 80)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cache::{PageCache, Unbounded};
use crate::raster::{
    is_valid_quality, BoxSize, ExportFormat, Rasterizer, DEFAULT_DEVICE_SCALE,
    DEFAULT_JPEG_QUALITY, DEFAULT_THUMBNAIL_SIZE,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of concurrent background renders.
pub const DEFAULT_RENDER_WORKERS: usize = 4;

/// Largest accepted device scale.
pub const MAX_DEVICE_SCALE: f64 = 8.0;

// =============================================================================
// RenderConfig
// =============================================================================

/// Settings applied to every page of an open document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Target box the page is fitted into, in points.
    pub target: BoxSize,
    /// Output pixels per point.
    pub device_scale: f64,
    /// Byte budget of the page cache. `None` keeps every rendered page
    /// until [`Document::trim_cache`](crate::Document::trim_cache) is called.
    pub cache_bytes: Option<usize>,
    /// Maximum asynchronous renders running at once.
    pub render_workers: usize,
    /// Warm the cache in the background after opening.
    pub prefetch: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target: BoxSize::square(DEFAULT_THUMBNAIL_SIZE),
            device_scale: DEFAULT_DEVICE_SCALE,
            cache_bytes: None,
            render_workers: DEFAULT_RENDER_WORKERS,
            prefetch: true,
        }
    }
}

impl RenderConfig {
    pub fn with_target(mut self, target: BoxSize) -> Self {
        self.target = target;
        self
    }

    pub fn with_device_scale(mut self, device_scale: f64) -> Self {
        self.device_scale = device_scale;
        self
    }

    pub fn with_cache_bytes(mut self, cache_bytes: usize) -> Self {
        self.cache_bytes = Some(cache_bytes);
        self
    }

    pub fn with_render_workers(mut self, render_workers: usize) -> Self {
        self.render_workers = render_workers;
        self
    }

    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let BoxSize { width, height } = self.target;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(format!(
                "thumbnail size must be positive, got {}x{}",
                width, height
            ));
        }

        if !(self.device_scale.is_finite()
            && self.device_scale > 0.0
            && self.device_scale <= MAX_DEVICE_SCALE)
        {
            return Err(format!(
                "device_scale must be in (0, {}], got {}",
                MAX_DEVICE_SCALE, self.device_scale
            ));
        }

        if self.cache_bytes == Some(0) {
            return Err("cache_bytes must be greater than 0".to_string());
        }

        if self.render_workers == 0 {
            return Err("render_workers must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Page cache for one document under this configuration.
    pub fn page_cache(&self) -> PageCache {
        match self.cache_bytes {
            Some(max_bytes) => PageCache::with_capacity(max_bytes),
            None => PageCache::with_policy(Unbounded),
        }
    }

    /// Rasterizer for this configuration.
    pub fn rasterizer(&self) -> Rasterizer {
        Rasterizer::with_device_scale(self.target, self.device_scale)
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// page-raster - Render document pages into cached thumbnails.
#[derive(Parser, Debug, Clone)]
#[command(name = "page-raster")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the page count and page sizes of a document.
    Info(InfoConfig),
    /// Render every page and write the images to a directory.
    Export(ExportConfig),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Password for protected documents.
    #[arg(long, env = "PAGE_RASTER_PASSWORD")]
    pub password: Option<String>,

    /// Side of the square box pages are fitted into, in points.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE, env = "PAGE_RASTER_THUMBNAIL_SIZE")]
    pub thumbnail_size: f64,

    /// Output pixels per point.
    #[arg(long, default_value_t = DEFAULT_DEVICE_SCALE, env = "PAGE_RASTER_DEVICE_SCALE")]
    pub device_scale: f64,

    /// Page cache budget in bytes. Unbounded if not set.
    #[arg(long, env = "PAGE_RASTER_CACHE_BYTES")]
    pub cache_bytes: Option<usize>,

    /// Maximum concurrent background renders.
    #[arg(long, default_value_t = DEFAULT_RENDER_WORKERS, env = "PAGE_RASTER_WORKERS")]
    pub workers: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Build the render configuration. Prefetch stays enabled.
    pub fn render_config(&self) -> RenderConfig {
        let mut config = RenderConfig::default()
            .with_target(BoxSize::square(self.thumbnail_size))
            .with_device_scale(self.device_scale)
            .with_render_workers(self.workers);
        config.cache_bytes = self.cache_bytes;
        config
    }
}

/// Arguments of `page-raster info`.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Path to the document manifest.
    pub manifest: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub render: RenderArgs,
}

impl InfoConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.render.render_config().validate()
    }
}

/// Image format accepted by `--format`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormatArg {
    #[default]
    Png,
    #[value(alias = "jpeg")]
    Jpg,
}

/// Arguments of `page-raster export`.
#[derive(Args, Debug, Clone)]
pub struct ExportConfig {
    /// Path to the document manifest.
    pub manifest: PathBuf,

    /// Directory the page images are written to.
    #[arg(short, long)]
    pub out: PathBuf,

    /// Output image format.
    #[arg(long, value_enum, default_value_t = ImageFormatArg::Png)]
    pub format: ImageFormatArg,

    /// JPEG quality (1-100). Ignored for PNG.
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "PAGE_RASTER_JPEG_QUALITY")]
    pub quality: u8,

    #[command(flatten)]
    pub render: RenderArgs,
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.render.render_config().validate()?;

        if self.format == ImageFormatArg::Jpg && !is_valid_quality(self.quality) {
            return Err("quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    pub fn export_format(&self) -> ExportFormat {
        match self.format {
            ImageFormatArg::Png => ExportFormat::Png,
            ImageFormatArg::Jpg => ExportFormat::Jpeg {
                quality: self.quality,
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
