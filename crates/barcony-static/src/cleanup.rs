//! Cleanup of legacy inline scripts in hand-edited pages.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

const MAIN_SCRIPT_PRELOAD: &str = r#"preload href="/js/main.js""#;
const MAIN_SCRIPT_SRC: &str = r#"src="/js/main.js""#;

/// Errors that can occur while cleaning a file.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

fn nav_script() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"<script>\s*document\.addEventListener\('DOMContentLoaded', function\(\) \{\s*// Set active navigation link based on current URL(?s:.*?)\}\);\s*</script>\s*",
        )
        .expect("invalid built-in pattern")
    })
}

fn enhanced_script() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<!-- Enhanced JavaScript for Modern Interactions -->\s*<script>(?s:.*?)</script>\s*")
            .expect("invalid built-in pattern")
    })
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n\s*\n\s*\n+").expect("invalid built-in pattern"))
}

fn logo_preload() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(<link rel="preload" href="/media/logo\.png" as="image">)"#)
            .expect("invalid built-in pattern")
    })
}

/// Clean one page's HTML.
///
/// Keeps only the first copy of the active-navigation script, drops the
/// legacy "Enhanced JavaScript" block and makes sure `/js/main.js` is
/// preloaded and included.
pub fn cleanup_html(content: &str) -> String {
    let mut content = dedupe_nav_scripts(content);

    content = enhanced_script().replace_all(&content, "").into_owned();

    if !content.contains(MAIN_SCRIPT_PRELOAD) {
        content = logo_preload()
            .replace(
                &content,
                "$1\n    <link rel=\"preload\" href=\"/js/main.js\" as=\"script\">",
            )
            .into_owned();
    }

    if !content.contains(MAIN_SCRIPT_SRC) {
        content = content.replacen(
            "</body>",
            "    <script src=\"/js/main.js\" defer></script>\n</body>",
            1,
        );
    }

    content
}

fn dedupe_nav_scripts(content: &str) -> String {
    let matches: Vec<_> = nav_script().find_iter(content).collect();
    if matches.len() <= 1 {
        return content.to_string();
    }

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for m in &matches[1..] {
        result.push_str(&content[last..m.start()]);
        last = m.end();
    }
    result.push_str(&content[last..]);

    blank_lines().replace_all(&result, "\n\n").into_owned()
}

/// Clean a file in place. Returns `true` when the file changed.
pub fn clean_file(path: &Path) -> Result<bool, CleanupError> {
    let content = fs::read_to_string(path).map_err(|source| CleanupError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let cleaned = cleanup_html(&content);
    if cleaned == content {
        tracing::debug!("Already clean: {}", path.display());
        return Ok(false);
    }

    fs::write(path, cleaned).map_err(|source| CleanupError::Write {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!("Cleaned: {}", path.display());
    Ok(true)
}
