//! Static site build for the Barcony website.
//!
//! Assembles the shared header, footer and stylesheet into every page and
//! cleans up legacy inline scripts.

pub mod assets;
pub mod builder;
pub mod cleanup;
pub mod templates;

pub use builder::{BuildError, BuildResult, SiteBuilder, SiteConfig};
pub use cleanup::{clean_file, cleanup_html, CleanupError};
