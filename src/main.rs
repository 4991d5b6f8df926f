//! page-raster - Render document pages into cached thumbnails.
//!
//! This binary opens shape manifests and either describes them or exports
//! every rendered page as an image file.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use page_raster::{
    config::{Cli, Command, ExportConfig, InfoConfig},
    Document, ExportFormat, ManifestOpener, OpenError, PageEncoder, PageIndex, RenderConfig,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Info(config) => run_info(config).await,
        Command::Export(config) => run_export(config).await,
    }
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.render.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    // Sizes come straight from the source; no need to render anything.
    let render_config = config.render.render_config().with_prefetch(false);
    let document = match open_document(
        &config.manifest,
        config.render.password.as_deref(),
        render_config,
    )
    .await
    {
        Ok(document) => document,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let sizes: Vec<_> = PageIndex::all(document.page_count())
        .map(|index| (index, document.page_size(index)))
        .collect();

    if config.json {
        let pages: Vec<_> = sizes
            .iter()
            .map(|(index, size)| match size {
                Ok(size) => serde_json::json!({
                    "index": index.get(),
                    "width": size.width,
                    "height": size.height,
                }),
                Err(e) => serde_json::json!({
                    "index": index.get(),
                    "error": e.to_string(),
                }),
            })
            .collect();

        let output = serde_json::json!({
            "file_name": document.file_name(),
            "page_count": document.page_count(),
            "pages": pages,
        });

        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize output: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("File:  {}", document.file_name());
        println!("Pages: {}", document.page_count());
        for (index, size) in &sizes {
            match size {
                Ok(size) => println!("  {:>4}  {} x {} pt", index.get(), size.width, size.height),
                Err(e) => println!("  {:>4}  error: {}", index.get(), e),
            }
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Export Command
// =============================================================================

async fn run_export(config: ExportConfig) -> ExitCode {
    init_logging(config.render.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.out).await {
        error!(
            "Failed to create output directory {}: {}",
            config.out.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let document = match open_document(
        &config.manifest,
        config.render.password.as_deref(),
        config.render.render_config(),
    )
    .await
    {
        Ok(document) => Arc::new(document),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(report) = document.wait_for_prefetch().await {
        info!(
            "Prefetch warmed {} page(s), {} failed",
            report.warmed, report.failed
        );
    }

    let format = config.export_format();
    let out = config.out.clone();
    let export = {
        let document = Arc::clone(&document);
        tokio::task::spawn_blocking(move || export_pages(&document, format, &out))
    };

    match export.await {
        Ok((written, failed)) => {
            println!(
                "Exported {} of {} page(s) to {}",
                written,
                document.page_count(),
                config.out.display()
            );
            if failed > 0 {
                warn!("{} page(s) could not be exported", failed);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Export task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Render, encode and write every page. Returns `(written, failed)`.
fn export_pages(document: &Document, format: ExportFormat, out: &Path) -> (usize, usize) {
    let encoder = PageEncoder::new();
    let mut written = 0;
    let mut failed = 0;

    for index in PageIndex::all(document.page_count()) {
        let image = match document.get_page(index) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping page {}: {}", index, e);
                failed += 1;
                continue;
            }
        };

        let path = out.join(format!("page-{:04}.{}", index.get(), format.extension()));
        let written_ok = encoder
            .encode(&image, format)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(&path, &bytes).map_err(|e| e.to_string()));

        match written_ok {
            Ok(()) => written += 1,
            Err(e) => {
                warn!("Failed to write {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    (written, failed)
}

// =============================================================================
// Helpers
// =============================================================================

async fn open_document(
    manifest: &Path,
    password: Option<&str>,
    config: RenderConfig,
) -> Result<Document, OpenError> {
    let location = manifest.to_string_lossy();
    Document::open(&ManifestOpener::new(), &location, password, config).await
}

/// Initialize the tracing subscriber.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "page_raster=debug"
    } else {
        "page_raster=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
