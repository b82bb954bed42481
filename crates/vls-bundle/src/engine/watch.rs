use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::WatchContext;
use super::rolldown::RolldownEngine;
use crate::config::BuildConfiguration;
use crate::watcher::{DEFAULT_DEBOUNCE_MS, FileChange, FileWatcher};
use crate::{Error, Result};

enum State {
    Idle,
    Watching {
        _watcher: FileWatcher,
        task: JoinHandle<()>,
    },
    Disposed,
}

/// Persistent Rolldown rebuild loop over the entry's directory.
///
/// `watch()` builds once, then rebuilds on every relevant change until
/// `dispose()`. Rebuild failures are logged and the loop keeps running.
pub struct RolldownWatchContext {
    engine: Arc<RolldownEngine>,
    config: Arc<BuildConfiguration>,
    root: PathBuf,
    debounce_ms: u64,
    state: Mutex<State>,
}

impl RolldownWatchContext {
    pub fn new(engine: Arc<RolldownEngine>, config: BuildConfiguration) -> Self {
        let root = config
            .entry
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| engine.resolve(p))
            .unwrap_or_else(|| engine.resolve(std::path::Path::new(".")));

        Self {
            engine,
            config: Arc::new(config),
            root,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            state: Mutex::new(State::Idle),
        }
    }

    pub fn with_debounce(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Directory whose changes trigger a rebuild.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub async fn is_watching(&self) -> bool {
        matches!(*self.state.lock().await, State::Watching { .. })
    }
}

impl std::fmt::Debug for RolldownWatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolldownWatchContext")
            .field("entry", &self.config.entry)
            .field("root", &self.root)
            .field("debounce_ms", &self.debounce_ms)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WatchContext for RolldownWatchContext {
    async fn watch(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        match &*state {
            State::Disposed => return Err(Error::WatchContextDisposed),
            State::Watching { .. } => return Ok(()),
            State::Idle => {}
        }

        self.engine.bundle(&self.config).await?;

        let (watcher, changes) = FileWatcher::with_defaults(self.root.clone(), self.debounce_ms)?;
        let task = tokio::spawn(rebuild_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.config),
            changes,
            Duration::from_millis(self.debounce_ms),
        ));

        tracing::info!(root = %self.root.display(), "watching for changes");
        *state = State::Watching {
            _watcher: watcher,
            task,
        };
        Ok(())
    }

    async fn dispose(&self) {
        let mut state = self.state.lock().await;
        if let State::Watching { task, .. } = std::mem::replace(&mut *state, State::Disposed) {
            task.abort();
            tracing::debug!(root = %self.root.display(), "watch context disposed");
        }
    }
}

async fn rebuild_loop(
    engine: Arc<RolldownEngine>,
    config: Arc<BuildConfiguration>,
    mut changes: mpsc::Receiver<FileChange>,
    settle: Duration,
) {
    while let Some(change) = changes.recv().await {
        // let an editor's save burst settle, then fold it into one rebuild
        tokio::time::sleep(settle).await;
        let mut batched = 1;
        while changes.try_recv().is_ok() {
            batched += 1;
        }

        tracing::info!(path = %change.path().display(), batched, "rebuilding");
        match engine.bundle(&config).await {
            Ok(_) => tracing::info!("✨ rebuilt {}", config.outfile.display()),
            Err(e) => tracing::warn!(error = %e, "rebuild failed"),
        }
    }
}
