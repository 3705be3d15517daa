//! Preview server and contact endpoint for the Barcony website.
//!
//! Serves the built pages, accepts contact form submissions on
//! `/api/contact` and, in development, rebuilds pages when shared
//! components change.

pub mod contact;
pub mod server;
pub mod watcher;

pub use contact::{ContactError, ContactMessage, ContactNotifier, ContactRequest, LogNotifier};
pub use server::{router, AppState, DevServer, ServerConfig, ServerError, SiteServer};
pub use watcher::{FileWatcher, WatchEvent};
