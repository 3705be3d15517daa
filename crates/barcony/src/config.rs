//! `barcony.toml` loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use barcony_server::ServerConfig;
use barcony_static::SiteConfig;
use serde::Deserialize;

/// Configuration file structure (barcony.toml).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub analytics: AnalyticsSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub dir: String,
    pub components: Option<String>,
    pub output: Option<String>,
    pub base_url: String,
    pub pages: Option<Vec<String>>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            dir: "site".to_string(),
            components: None,
            output: None,
            base_url: "https://barcony.nl/".to_string(),
            pages: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub minify: bool,
    pub consent_defaults: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            minify: true,
            consent_defaults: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AnalyticsSection {
    /// GA4 measurement id; empty disables tracking
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = parse(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

fn parse(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

impl ConfigFile {
    /// Site build settings derived from the file.
    pub fn site_config(&self) -> SiteConfig {
        let defaults = SiteConfig::default();
        let site_dir = PathBuf::from(&self.site.dir);

        SiteConfig {
            components_dir: self
                .site
                .components
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| site_dir.join("components")),
            output_dir: self
                .site
                .output
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| site_dir.clone()),
            pages: self.site.pages.clone().unwrap_or(defaults.pages),
            minify_css: self.build.minify,
            base_url: self.site.base_url.clone(),
            analytics_id: self
                .analytics
                .id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            consent_defaults: self.build.consent_defaults,
            site_dir,
        }
    }

    /// Server settings derived from the file.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            site_dir: self.site_config().output_dir,
            port: self.server.port,
            host: self.server.host.clone(),
            open: true,
        }
    }
}
