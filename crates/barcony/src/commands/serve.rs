//! Site server command.

use std::path::PathBuf;

use anyhow::Result;
use barcony_server::SiteServer;

use crate::config::ConfigFile;

/// Run the serve command.
pub async fn run(
    file: &ConfigFile,
    port: Option<u16>,
    dir: Option<PathBuf>,
    open: bool,
) -> Result<()> {
    let mut config = file.server_config();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = dir {
        config.site_dir = dir;
    }
    config.open = open;

    if !config.site_dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'barcony build' first.",
            config.site_dir.display()
        );
    }

    SiteServer::new(config).start().await?;

    Ok(())
}
