//! Development server command.

use anyhow::Result;
use barcony_server::DevServer;

use crate::config::ConfigFile;

/// Run the dev server.
pub async fn run(file: &ConfigFile, port: u16) -> Result<()> {
    tracing::info!("Starting development server on port {}", port);

    let mut server = file.server_config();
    server.port = port;

    DevServer::new(server, file.site_config()).start().await?;

    Ok(())
}
