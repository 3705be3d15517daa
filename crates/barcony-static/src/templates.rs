//! Shared header/footer components rendered with minijinja.

use std::path::Path;

use minijinja::{context, path_loader, Environment};

/// Per-page values available inside components.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageContext {
    /// Page path relative to the site directory (e.g. "gallerij/index.html")
    pub page: String,
    /// Navigation href of the page (e.g. "/gallerij")
    pub active_href: String,
    /// Public base URL of the site
    pub base_url: String,
    /// GA4 measurement id, if tracking is configured
    pub analytics_id: Option<String>,
}

/// Template environment over the components directory.
pub struct ComponentTemplates {
    env: Environment<'static>,
}

impl ComponentTemplates {
    /// Load components lazily from `dir`.
    pub fn from_dir(dir: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(dir.to_path_buf()));
        Self { env }
    }

    /// Whether a component with this file name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Render a component for a page.
    pub fn render(&self, name: &str, page: &PageContext) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(name)?;

        tmpl.render(context! {
            page => &page.page,
            active_href => &page.active_href,
            base_url => &page.base_url,
            analytics_id => &page.analytics_id,
        })
    }
}
