use indexmap::IndexSet;
use parking_lot::Mutex;
use std::path::PathBuf;

/// Paths the host watches for rebuilds, in first-registration order.
///
/// Registering a path that is already present has no observable effect.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    paths: Mutex<IndexSet<PathBuf>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path`; returns `false` if it was already registered.
    pub fn register(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let added = self.paths.lock().insert(path.clone());
        if added {
            tracing::debug!(path = %path.display(), "watch path registered");
        }
        added
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().iter().cloned().collect()
    }

    pub fn contains(&self, path: &std::path::Path) -> bool {
        self.paths.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }
}
