//! Hot reload of the config file.

use crate::config::Config;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Re-reads the config file whenever it changes and sends every version that
/// loads and validates.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Config>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Config>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        (ConfigWatcher { path, update_tx }, update_rx)
    }

    /// Starts watching. Updates stop when the returned watcher is dropped.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors which save by replacing the file are still picked up.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, update_tx } = self;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let target = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event.paths.iter().any(|p| p == &target);
                    if !relevant {
                        return;
                    }
                    match Config::from_file(&target) {
                        Ok(config) => {
                            tracing::info!(path = %target.display(), "config file changed");
                            let _ = update_tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(path = %target.display(), error = %e, "ignoring invalid config update");
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "config watch error"),
            },
            notify::Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "watching config file");
        Ok(watcher)
    }
}
