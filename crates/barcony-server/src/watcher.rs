//! Watches shared components for changes.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Header, footer or another HTML component changed
    ComponentModified(PathBuf),

    /// A stylesheet changed
    StylesheetModified(PathBuf),

    Created(PathBuf),

    Deleted(PathBuf),
}

/// Keeps a notify watcher alive while events are forwarded.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `paths` recursively.
    ///
    /// Paths that do not exist are skipped.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            } else {
                tracing::warn!("Not watching missing path {}", path.display());
            }
        }

        std::thread::spawn(move || {
            let mut last: Option<Instant> = None;

            while let Ok(event) = sync_rx.recv() {
                let now = Instant::now();
                if last.is_some_and(|t| now.duration_since(t) < DEBOUNCE) {
                    continue;
                }

                let classified: Vec<_> = event
                    .paths
                    .iter()
                    .filter_map(|path| classify_event(path, &event.kind))
                    .collect();
                if classified.is_empty() {
                    continue;
                }
                last = Some(now);

                for e in classified {
                    if async_tx.blocking_send(e).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Map a notify event on `path` to a watch event.
///
/// Only HTML and CSS files are relevant to a rebuild.
fn classify_event(path: &Path, kind: &EventKind) -> Option<WatchEvent> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext != "html" && ext != "css" {
        return None;
    }

    let path = path.to_path_buf();
    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path)),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path)),
        EventKind::Modify(_) if ext == "css" => Some(WatchEvent::StylesheetModified(path)),
        EventKind::Modify(_) => Some(WatchEvent::ComponentModified(path)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classifies_component_changes() {
        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Content));

        assert_eq!(
            classify_event(Path::new("components/header.html"), &modify),
            Some(WatchEvent::ComponentModified(PathBuf::from(
                "components/header.html"
            )))
        );
        assert_eq!(
            classify_event(Path::new("components/header-styles.css"), &modify),
            Some(WatchEvent::StylesheetModified(PathBuf::from(
                "components/header-styles.css"
            )))
        );
        assert_eq!(
            classify_event(
                Path::new("components/footer.html"),
                &EventKind::Remove(RemoveKind::File)
            ),
            Some(WatchEvent::Deleted(PathBuf::from("components/footer.html")))
        );
    }

    #[test]
    fn ignores_unrelated_files() {
        assert_eq!(
            classify_event(
                Path::new("components/.header.html.swp"),
                &EventKind::Create(CreateKind::File)
            ),
            None
        );
        assert_eq!(
            classify_event(Path::new("components/header.html"), &EventKind::Any),
            None
        );
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let component = temp.path().join("header.html");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&component, "<header></header>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(event.unwrap().is_some(), "channel should not be closed");
    }
}
