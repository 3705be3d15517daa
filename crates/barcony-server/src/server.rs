//! Site server: static files plus the contact API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::post, Router};
use tower_http::services::ServeDir;

use barcony_static::{SiteBuilder, SiteConfig};

use crate::contact::{self, ContactNotifier, LogNotifier};
use crate::watcher::{FileWatcher, WatchEvent};

/// Configuration for the site server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory served as the site root
    pub site_dir: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            site_dir: PathBuf::from("site"),
            port: 4000,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Site directory not found: {0}")]
    MissingSiteDir(String),
}

/// Shared request state.
pub struct AppState {
    pub notifier: Arc<dyn ContactNotifier>,
}

/// Build the application router.
pub fn router(site_dir: PathBuf, notifier: Arc<dyn ContactNotifier>) -> Router {
    let state = Arc::new(AppState { notifier });

    Router::new()
        .route(
            "/api/contact",
            post(contact::submit).fallback(contact::method_not_allowed),
        )
        .fallback_service(ServeDir::new(site_dir))
        .with_state(state)
}

/// Serves the built site and the contact endpoint.
pub struct SiteServer {
    config: ServerConfig,
    notifier: Arc<dyn ContactNotifier>,
}

impl SiteServer {
    /// Create a server that logs contact submissions.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    /// Create a server delivering contact submissions to `notifier`.
    pub fn with_notifier(config: ServerConfig, notifier: Arc<dyn ContactNotifier>) -> Self {
        Self { config, notifier }
    }

    fn addr(&self) -> Result<SocketAddr, ServerError> {
        let raw = format!("{}:{}", self.config.host, self.config.port);
        raw.parse()
            .map_err(|_| ServerError::InvalidAddress(raw.clone()))
    }

    /// Start serving until the process exits.
    pub async fn start(self) -> Result<(), ServerError> {
        if !self.config.site_dir.exists() {
            return Err(ServerError::MissingSiteDir(
                self.config.site_dir.display().to_string(),
            ));
        }

        let addr = self.addr()?;
        let app = router(self.config.site_dir.clone(), Arc::clone(&self.notifier));

        tracing::info!(
            "Serving {} at http://{}",
            self.config.site_dir.display(),
            addr
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Site server that rebuilds pages when shared components change.
pub struct DevServer {
    server: ServerConfig,
    site: SiteConfig,
}

impl DevServer {
    pub fn new(server: ServerConfig, site: SiteConfig) -> Self {
        Self { server, site }
    }

    /// Build once, then serve and rebuild on component changes.
    pub async fn start(self) -> Result<(), ServerError> {
        rebuild(&self.site).await;

        let (watcher, mut rx) = FileWatcher::new(&[self.site.components_dir.clone()])
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let site = self.site.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&site, event).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        SiteServer::new(self.server).start().await
    }
}

async fn handle_watch_event(site: &SiteConfig, event: WatchEvent) {
    match event {
        WatchEvent::ComponentModified(path) | WatchEvent::StylesheetModified(path) => {
            tracing::info!("Component modified: {}", path.display());
            rebuild(site).await;
        }
        WatchEvent::Created(path) | WatchEvent::Deleted(path) => {
            tracing::info!("Components changed: {}", path.display());
            rebuild(site).await;
        }
    }
}

async fn rebuild(site: &SiteConfig) {
    match SiteBuilder::new(site.clone()).build().await {
        Ok(result) => {
            tracing::info!("Rebuilt {} pages in {}ms", result.pages, result.duration_ms)
        }
        Err(e) => tracing::warn!("Rebuild failed: {}", e),
    }
}
