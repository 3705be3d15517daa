//! Inline script cleanup command.

use std::path::PathBuf;

use anyhow::Result;
use barcony_static::clean_file;

use crate::config::ConfigFile;

/// Run the clean command over `files`, or every configured page.
pub fn run(file: &ConfigFile, files: Vec<PathBuf>) -> Result<()> {
    let files = if files.is_empty() {
        let site = file.site_config();
        site.pages.iter().map(|page| site.site_dir.join(page)).collect()
    } else {
        files
    };

    let mut cleaned = 0;
    for path in &files {
        if !path.exists() {
            tracing::warn!("Skipping missing file: {}", path.display());
            continue;
        }
        if clean_file(path)? {
            cleaned += 1;
        }
    }

    tracing::info!("Cleaned {} of {} files", cleaned, files.len());
    Ok(())
}
