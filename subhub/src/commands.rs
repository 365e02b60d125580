use crate::config::Config;
use crate::watcher::ConfigWatcher;
use profile::{Profile, synthesize_snapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subscription::config::partition_valid;
use subscription::{
    AggregateSnapshot, AggregateStore, Coordinator, DocumentSource, FetchError, HttpSource,
    fetch_once,
};
use tokio::task::JoinSet;
use tokio::time::{Duration, MissedTickBehavior};

// Editors tend to emit several change events per save.
const RELOAD_SETTLE: Duration = Duration::from_millis(250);

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("could not create HTTP client: {0}")]
    Client(#[from] FetchError),
    #[error("could not serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not write profile to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// Fetches every upstream once, concurrently, and writes the synthesized
/// profile to `output` or stdout.
pub async fn render(config: &Config, output: Option<&Path>) -> Result<(), CommandError> {
    let source: Arc<dyn DocumentSource> = Arc::new(HttpSource::new()?);
    let store = fetch_all(config, source).await;
    let profile = synthesize_snapshot(&store.snapshot(), &config.selectors);
    write_profile(&profile, output).await
}

async fn fetch_all(config: &Config, source: Arc<dyn DocumentSource>) -> AggregateStore {
    let (valid, rejected) = partition_valid(config.upstreams.clone());
    for (url, e) in &rejected {
        tracing::warn!(url = %url, error = %e, "skipping upstream");
    }

    let mut tasks = JoinSet::new();
    for (index, upstream) in valid.into_iter().enumerate() {
        let source = source.clone();
        tasks.spawn(async move {
            let result = fetch_once(&upstream, source.as_ref()).await;
            (index, upstream.url, result)
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!(error = %e, "fetch task failed"),
        }
    }
    // Keep the configured upstream order regardless of completion order.
    results.sort_by_key(|(index, _, _)| *index);

    let store = AggregateStore::new();
    for (_, url, result) in results {
        match result {
            Ok((format, outbounds)) => {
                tracing::info!(url = %url, format = %format, outbounds = outbounds.len(), "upstream fetched");
                store.update_upstream(&url, outbounds);
            }
            Err(e) => tracing::warn!(error = %e, "upstream fetch failed"),
        }
    }
    store
}

/// Polls upstreams continuously, keeping `output.path` up to date and
/// reloading on config file changes until Ctrl-C.
pub async fn run(config_path: &Path, mut config: Config) -> Result<(), CommandError> {
    let store = Arc::new(AggregateStore::new());
    let coordinator = Coordinator::new(store.clone(), Arc::new(HttpSource::new()?));
    coordinator.setup(config.upstreams.clone());

    let (watcher, mut updates) = ConfigWatcher::new(config_path);
    let _watcher = watcher.run()?;

    if config.output.path.is_none() {
        tracing::warn!("no output.path configured, profiles will not be written");
    }

    let mut ticker = tokio::time::interval(config.output.render_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rendered: Option<Arc<AggregateSnapshot>> = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "could not listen for Ctrl-C");
                }
                tracing::info!("shutting down");
                break;
            }
            Some(mut update) = updates.recv() => {
                tokio::time::sleep(RELOAD_SETTLE).await;
                while let Ok(newer) = updates.try_recv() {
                    update = newer;
                }

                if update.upstreams != config.upstreams {
                    let summary = coordinator.reload(update.upstreams.clone());
                    tracing::info!(
                        started = summary.started.len(),
                        rejected = summary.rejected.len(),
                        "upstreams reloaded"
                    );
                }
                if update.output.render_interval() != config.output.render_interval() {
                    ticker = tokio::time::interval(update.output.render_interval());
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                }
                config = update;
                // Selectors or the output path may have changed.
                rendered = None;
            }
            _ = ticker.tick() => {
                if let Some(path) = &config.output.path {
                    let snapshot = store.snapshot();
                    let unchanged = rendered
                        .as_ref()
                        .is_some_and(|previous| Arc::ptr_eq(previous, &snapshot));
                    if !unchanged {
                        let profile = synthesize_snapshot(&snapshot, &config.selectors);
                        match write_profile(&profile, Some(path)).await {
                            Ok(()) => {
                                tracing::info!(path = %path.display(), outbounds = profile.outbounds.len(), "profile written");
                                rendered = Some(snapshot);
                            }
                            Err(e) => tracing::error!(error = %e, "could not write profile"),
                        }
                    }
                }
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}

async fn write_profile(profile: &Profile, output: Option<&Path>) -> Result<(), CommandError> {
    let mut json = profile.to_json_pretty()?;
    json.push('\n');

    match output {
        Some(path) => {
            // Write next to the target and rename so readers never see a
            // partial document.
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, &json)
                .await
                .map_err(|source| CommandError::Write {
                    path: tmp.clone(),
                    source,
                })?;
            tokio::fs::rename(&tmp, path)
                .await
                .map_err(|source| CommandError::Write {
                    path: path.to_path_buf(),
                    source,
                })
        }
        None => {
            print!("{json}");
            Ok(())
        }
    }
}
