//! Shared stylesheet assembly.

/// Stylesheet utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Combine the design-token variables and component styles.
    pub fn combine_css(variables: &str, components: &str) -> String {
        format!("{}\n{}", variables, components)
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// The `<style>` block injected into every page.
    pub fn style_block(css: &str) -> String {
        format!("<style>\n{}\n</style>", css)
    }
}
