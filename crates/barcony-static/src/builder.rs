//! Component-based site builder.
//!
//! Every page is rewritten so that it carries exactly one copy of the shared
//! header, footer and stylesheet, with its own navigation link marked active.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use rayon::prelude::*;
use regex::Regex;
use walkdir::WalkDir;

use barcony_consent::default_signal_script;

use crate::assets::AssetPipeline;
use crate::templates::{ComponentTemplates, PageContext};

const HEADER_COMPONENT: &str = "header.html";
const FOOTER_COMPONENT: &str = "footer.html";
const VARIABLES_CSS: &str = "variables.css";
const COMPONENTS_CSS: &str = "components.css";

const ACTIVE_LINK_CLASS: &str = r#"class="navbar__link navbar__link--active""#;
const LINK_CLASS: &str = r#"class="navbar__link""#;
const CONSENT_DEFAULTS_MARKER: &str = "data-consent-defaults";

/// Configuration for building the site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Directory holding the page sources
    pub site_dir: PathBuf,

    /// Directory holding header/footer components and shared CSS
    pub components_dir: PathBuf,

    /// Output directory (may equal `site_dir` for an in-place build)
    pub output_dir: PathBuf,

    /// Pages to process, relative to `site_dir`. Empty means every HTML file.
    pub pages: Vec<String>,

    /// Minify the shared stylesheet
    pub minify_css: bool,

    /// Public base URL of the site
    pub base_url: String,

    /// GA4 measurement id passed to components
    pub analytics_id: Option<String>,

    /// Pre-render the Consent Mode default signal into every page
    pub consent_defaults: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_dir: PathBuf::from("site"),
            components_dir: PathBuf::from("site/components"),
            output_dir: PathBuf::from("site"),
            pages: vec![
                "index.html".to_string(),
                "gallerij/index.html".to_string(),
                "modellen-prijzen/index.html".to_string(),
            ],
            minify_css: false,
            base_url: "https://barcony.nl/".to_string(),
            analytics_id: None,
            consent_defaults: true,
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages processed
    pub pages: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Missing component: {0}")]
    MissingComponent(String),

    #[error("Failed to render component: {0}")]
    TemplateError(String),

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// Shared assets loaded once per build.
struct Components {
    templates: ComponentTemplates,
    style_block: String,
}

/// Static site builder.
pub struct SiteBuilder {
    config: SiteConfig,
}

impl SiteBuilder {
    /// Create a new site builder.
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    /// Build the site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        tracing::info!("Building Barcony website...");

        let components = self.load_components()?;
        let pages = self.discover_pages()?;

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let results: Vec<Result<(), BuildError>> = pages
            .par_iter()
            .map(|page| self.process_page(page, &components))
            .collect();

        for result in results {
            result?;
        }

        self.generate_sitemap(&pages)?;

        let duration = start.elapsed();
        tracing::info!("Build completed successfully!");

        Ok(BuildResult {
            pages: pages.len(),
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Load header/footer templates and the combined stylesheet.
    fn load_components(&self) -> Result<Components, BuildError> {
        let dir = &self.config.components_dir;
        let templates = ComponentTemplates::from_dir(dir);

        for name in [HEADER_COMPONENT, FOOTER_COMPONENT] {
            if !templates.contains(name) {
                return Err(BuildError::MissingComponent(
                    dir.join(name).display().to_string(),
                ));
            }
        }

        let variables = read_file(&dir.join(VARIABLES_CSS))?;
        let shared = read_file(&dir.join(COMPONENTS_CSS))?;
        let css = AssetPipeline::combine_css(&variables, &shared);

        let css = if self.config.minify_css {
            AssetPipeline::minify_css(&css).unwrap_or_else(|e| {
                tracing::warn!("Failed to minify shared CSS: {}", e);
                css
            })
        } else {
            css
        };

        Ok(Components {
            templates,
            style_block: AssetPipeline::style_block(&css),
        })
    }

    /// Pages to process, relative to the site directory.
    fn discover_pages(&self) -> Result<Vec<String>, BuildError> {
        if !self.config.pages.is_empty() {
            return Ok(self.config.pages.clone());
        }

        if !self.config.site_dir.exists() {
            return Err(BuildError::ReadError {
                path: self.config.site_dir.display().to_string(),
                message: "Site directory not found".to_string(),
            });
        }

        let mut pages = Vec::new();
        for entry in WalkDir::new(&self.config.site_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.starts_with(&self.config.components_dir) {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.config.site_dir) {
                pages.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }

        pages.sort();
        Ok(pages)
    }

    /// Rewrite a single page.
    fn process_page(&self, page: &str, components: &Components) -> Result<(), BuildError> {
        let source = self.config.site_dir.join(page);
        let content = read_file(&source)?;

        let context = PageContext {
            page: page.to_string(),
            active_href: nav_href(page),
            base_url: self.config.base_url.clone(),
            analytics_id: self.config.analytics_id.clone(),
        };

        let header = components
            .templates
            .render(HEADER_COMPONENT, &context)
            .map_err(|e| BuildError::TemplateError(e.to_string()))?;
        let footer = components
            .templates
            .render(FOOTER_COMPONENT, &context)
            .map_err(|e| BuildError::TemplateError(e.to_string()))?;

        let mut content = replace_css(&content, &components.style_block);
        content = replace_components(&content, &header, &footer);
        content = mark_active_nav(&content, &context.active_href);
        if self.config.consent_defaults {
            content = inject_consent_defaults(&content);
        }

        let output = self.config.output_dir.join(page);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
        }
        fs::write(&output, content).map_err(|e| BuildError::WriteError(e.to_string()))?;

        tracing::info!("Processed {}", page);
        Ok(())
    }

    /// Generate sitemap.xml and robots.txt.
    fn generate_sitemap(&self, pages: &[String]) -> Result<(), BuildError> {
        let base = self.config.base_url.trim_end_matches('/');
        let urls: Vec<String> = pages
            .iter()
            .map(|page| {
                let href = nav_href(page);
                let href = if href == "/" { href } else { format!("{}/", href) };
                format!("  <url>\n    <loc>{}{}</loc>\n  </url>", base, href)
            })
            .collect();

        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}
</urlset>"#,
            urls.join("\n")
        );

        fs::write(self.config.output_dir.join("sitemap.xml"), sitemap)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let robots = format!("User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml", base);
        fs::write(self.config.output_dir.join("robots.txt"), robots)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String, BuildError> {
    fs::read_to_string(path).map_err(|e| BuildError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("invalid built-in pattern"))
}

/// Navigation href for a page path: "index.html" is "/", "gallerij/index.html" is "/gallerij".
pub fn nav_href(page: &str) -> String {
    let trimmed = page
        .trim_start_matches('/')
        .trim_end_matches("index.html")
        .trim_end_matches(".html")
        .trim_end_matches('/');
    format!("/{}", trimmed)
}

/// Drop every inline `<style>` block and insert the shared one before `</head>`.
pub fn replace_css(content: &str, style_block: &str) -> String {
    static STYLE: OnceLock<Regex> = OnceLock::new();
    let stripped = regex(&STYLE, r"(?s)\s*<style>.*?</style>").replace_all(content, "");
    stripped.replacen("</head>", &format!("{}\n</head>", style_block), 1)
}

/// Swap the page's navigation, headers and footer for the shared components.
pub fn replace_components(content: &str, header: &str, footer: &str) -> String {
    static NAV: OnceLock<Regex> = OnceLock::new();
    static MOBILE: OnceLock<Regex> = OnceLock::new();
    static DESKTOP: OnceLock<Regex> = OnceLock::new();
    static FOOTER: OnceLock<Regex> = OnceLock::new();

    let content = regex(&NAV, r"(?s)\s*<!-- Modern Navigation -->.*?</nav>").replace(content, "");
    let content = regex(&MOBILE, r"(?s)\s*<!-- Mobile Header -->.*?</div>").replace(&content, "");
    let content = regex(&DESKTOP, r"(?s)\s*<!-- Desktop Header -->.*?</div>").replace(&content, "");
    let content = regex(&FOOTER, r"(?s)\s*<!-- Footer -->.*?</footer>").replace(&content, "");

    content
        .replacen("<body>", &format!("<body>\n    {}", header), 1)
        .replacen("</body>", &format!("    {}\n</body>", footer), 1)
}

/// Mark the navigation link for `href` as active.
///
/// The home page falls back to the first navigation link.
pub fn mark_active_nav(content: &str, href: &str) -> String {
    let link = format!(r#"<a href="{}" {}>"#, href, LINK_CLASS);
    if content.contains(&link) {
        let active = format!(r#"<a href="{}" {}>"#, href, ACTIVE_LINK_CLASS);
        return content.replacen(&link, &active, 1);
    }

    if href == "/" {
        return content.replacen(LINK_CLASS, ACTIVE_LINK_CLASS, 1);
    }

    content.to_string()
}

/// Insert the Consent Mode default signal as the first script in `<head>`.
pub fn inject_consent_defaults(content: &str) -> String {
    static HEAD: OnceLock<Regex> = OnceLock::new();

    if content.contains(CONSENT_DEFAULTS_MARKER) {
        return content.to_string();
    }

    let script = format!(
        "\n    <script {}>\n{}</script>",
        CONSENT_DEFAULTS_MARKER,
        default_signal_script()
    );
    regex(&HEAD, r"<head[^>]*>")
        .replace(content, |caps: &regex::Captures| format!("{}{}", &caps[0], script))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="nl">
<head>
    <title>Barcony</title>
    <style>.old { color: red; }</style>
</head>
<body>
    <!-- Modern Navigation -->
    <nav class="old-nav"><a href="/">Home</a></nav>
    <main>Balkons</main>
    <!-- Footer -->
    <footer>old footer</footer>
</body>
</html>"#;

    const HEADER: &str = r#"<!-- Modern Navigation -->
<nav class="navbar"><a href="/" class="navbar__link">Home</a><a href="/gallerij" class="navbar__link">Gallerij</a></nav>"#;

    const FOOTER: &str = "<!-- Footer -->\n<footer class=\"footer\">Barcony Amsterdam</footer>";

    fn site() -> (tempfile::TempDir, SiteConfig) {
        let temp = tempdir().unwrap();
        let site_dir = temp.path().join("site");
        let components = site_dir.join("components");
        fs::create_dir_all(site_dir.join("gallerij")).unwrap();
        fs::create_dir_all(&components).unwrap();

        fs::write(site_dir.join("index.html"), PAGE).unwrap();
        fs::write(site_dir.join("gallerij/index.html"), PAGE).unwrap();
        fs::write(components.join("header.html"), HEADER).unwrap();
        fs::write(components.join("footer.html"), FOOTER).unwrap();
        fs::write(components.join("variables.css"), ":root { --wood: #8b5a2b; }").unwrap();
        fs::write(components.join("components.css"), ".navbar { color: var(--wood); }").unwrap();

        let config = SiteConfig {
            site_dir: site_dir.clone(),
            components_dir: components,
            output_dir: site_dir,
            pages: vec![],
            ..Default::default()
        };
        (temp, config)
    }

    #[test]
    fn derives_nav_hrefs() {
        assert_eq!(nav_href("index.html"), "/");
        assert_eq!(nav_href("gallerij/index.html"), "/gallerij");
        assert_eq!(nav_href("modellen-prijzen/index.html"), "/modellen-prijzen");
        assert_eq!(nav_href("contact.html"), "/contact");
    }

    #[test]
    fn replaces_all_style_blocks_with_one() {
        let html = "<head><style>a{}</style>\n<style>\nb{}\n</style></head>";

        let result = replace_css(html, "<style>\nshared\n</style>");

        assert_eq!(result.matches("<style>").count(), 1);
        assert!(result.contains("shared"));
        assert!(!result.contains("a{}"));
    }

    #[test]
    fn marks_matching_link_active() {
        let html = mark_active_nav(HEADER, "/gallerij");

        assert!(html.contains(r#"<a href="/gallerij" class="navbar__link navbar__link--active">"#));
        assert!(html.contains(r#"<a href="/" class="navbar__link">"#));
    }

    #[test]
    fn unknown_page_leaves_navigation_alone() {
        assert_eq!(mark_active_nav(HEADER, "/contact"), HEADER);
    }

    #[test]
    fn injects_consent_defaults_once() {
        let once = inject_consent_defaults(PAGE);
        let twice = inject_consent_defaults(&once);

        assert_eq!(once, twice);
        let head = once.find("<head>").unwrap();
        let script = once.find("<script data-consent-defaults>").unwrap();
        let title = once.find("<title>").unwrap();
        assert!(head < script && script < title);
    }

    #[tokio::test]
    async fn builds_pages_with_shared_components() {
        let (_temp, config) = site();
        let site_dir = config.site_dir.clone();

        let result = SiteBuilder::new(config).build().await.unwrap();

        assert_eq!(result.pages, 2);

        let gallery = fs::read_to_string(site_dir.join("gallerij/index.html")).unwrap();
        assert_eq!(gallery.matches("<!-- Modern Navigation -->").count(), 1);
        assert_eq!(gallery.matches("<footer").count(), 1);
        assert!(!gallery.contains("old-nav"));
        assert!(!gallery.contains(".old"));
        assert!(gallery.contains("--wood"));
        assert!(gallery.contains("navbar__link--active\">Gallerij"));
        assert!(gallery.contains("data-consent-defaults"));

        let home = fs::read_to_string(site_dir.join("index.html")).unwrap();
        assert!(home.contains(r#"<a href="/" class="navbar__link navbar__link--active">"#));
    }

    #[tokio::test]
    async fn rebuild_is_stable() {
        let (_temp, config) = site();
        let site_dir = config.site_dir.clone();
        let builder = SiteBuilder::new(config);

        builder.build().await.unwrap();
        let first = fs::read_to_string(site_dir.join("index.html")).unwrap();
        builder.build().await.unwrap();
        let second = fs::read_to_string(site_dir.join("index.html")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn writes_sitemap_and_robots() {
        let (_temp, config) = site();
        let out = config.output_dir.clone();

        SiteBuilder::new(config).build().await.unwrap();

        let sitemap = fs::read_to_string(out.join("sitemap.xml")).unwrap();
        assert!(sitemap.contains("<loc>https://barcony.nl/</loc>"));
        assert!(sitemap.contains("<loc>https://barcony.nl/gallerij/</loc>"));
        let robots = fs::read_to_string(out.join("robots.txt")).unwrap();
        assert!(robots.ends_with("Sitemap: https://barcony.nl/sitemap.xml"));
    }

    #[tokio::test]
    async fn fails_without_header_component() {
        let (_temp, config) = site();
        fs::remove_file(config.components_dir.join("header.html")).unwrap();

        let result = SiteBuilder::new(config).build().await;

        assert!(matches!(result, Err(BuildError::MissingComponent(_))));
    }

    #[tokio::test]
    async fn fails_on_missing_page() {
        let (_temp, mut config) = site();
        config.pages = vec!["missing/index.html".to_string()];

        let result = SiteBuilder::new(config).build().await;

        assert!(matches!(result, Err(BuildError::ReadError { .. })));
    }
}
