//! Site build command.

use std::path::PathBuf;

use anyhow::Result;
use barcony_static::SiteBuilder;

use crate::config::ConfigFile;

/// Run the build command.
pub async fn run(file: &ConfigFile, output: Option<PathBuf>, minify: Option<bool>) -> Result<()> {
    tracing::info!("Building site...");

    let mut config = file.site_config();
    if let Some(output) = output {
        config.output_dir = output;
    }
    if let Some(minify) = minify {
        config.minify_css = minify;
    }

    let result = SiteBuilder::new(config).build().await?;

    tracing::info!("Built {} pages in {}ms", result.pages, result.duration_ms);
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
