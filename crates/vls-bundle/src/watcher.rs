//! Recursive source watcher.
//!
//! Raw notify events are narrowed to content changes, filtered through
//! [`IgnoreRules`] and collapsed per path inside a short window before they
//! reach async consumers over a channel.

use crate::{Error, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Patterns ignored unless the caller passes its own list.
///
/// `dist` and `typings` are written by the build itself; watching them would
/// turn every rebuild into the trigger for the next one.
pub const DEFAULT_IGNORES: [&str; 4] = ["node_modules", "dist", "typings", "*.tsbuildinfo"];

/// Default window in which repeated events for one path count once.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

const CHANNEL_CAPACITY: usize = 100;

/// A content change under the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    /// Classify a notify event for `path`.
    ///
    /// Opens, reads and closes (`EventKind::Access`) are not changes and map
    /// to `None`, as do the catch-all kinds.
    pub fn from_event(kind: &EventKind, path: PathBuf) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Parsed ignore patterns.
///
/// `*.ext` patterns match the end of the relative path; any other pattern
/// names a path component (`dist` ignores `dist/vls.js` but not
/// `distance.ts`). Hidden components are always ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRules {
    components: Vec<String>,
    suffixes: Vec<String>,
}

impl IgnoreRules {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Self::default();
        for pattern in patterns {
            match pattern.as_ref().strip_prefix('*') {
                Some(suffix) => rules.suffixes.push(suffix.to_string()),
                None => rules.components.push(pattern.as_ref().to_string()),
            }
        }
        rules
    }

    /// Whether a path relative to the watch root is ignored.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let text = relative.to_string_lossy();
        if self.suffixes.iter().any(|s| text.ends_with(s.as_str())) {
            return true;
        }

        relative.components().any(|component| match component {
            Component::Normal(name) => name.to_str().is_some_and(|name| {
                name.starts_with('.') || self.components.iter().any(|c| c == name)
            }),
            _ => false,
        })
    }
}

/// Lets the first event for a path through and drops repeats inside `window`.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    seen: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    fn admit(&mut self, path: &Path, now: Instant) -> bool {
        let window = self.window;
        self.seen
            .retain(|_, at| now.saturating_duration_since(*at) < window);
        if self.seen.contains_key(path) {
            return false;
        }
        self.seen.insert(path.to_path_buf(), now);
        true
    }
}

/// Recursive watcher over one root.
///
/// Dropping it stops the OS watch and closes the change channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    rules: IgnoreRules,
}

impl FileWatcher {
    /// Watch `root` with [`DEFAULT_IGNORES`].
    pub fn with_defaults(
        root: impl Into<PathBuf>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        Self::new(root.into(), IgnoreRules::new(DEFAULT_IGNORES), debounce_ms)
    }

    /// Start watching `root`.
    ///
    /// # Errors
    ///
    /// Fails when `root` does not exist or the OS watch cannot be installed.
    pub fn new(
        root: PathBuf,
        rules: IgnoreRules,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(Error::InvalidConfig(format!(
                "watch root '{}' does not exist",
                root.display()
            )));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut debouncer = Debouncer::new(Duration::from_millis(debounce_ms));
        let filter = rules.clone();
        let watch_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "file watcher error");
                    return;
                }
            };

            for path in event.paths {
                let Some(change) = FileChange::from_event(&event.kind, path) else {
                    continue;
                };
                let Ok(relative) = change.path().strip_prefix(&watch_root) else {
                    continue;
                };
                if filter.is_ignored(relative) || !debouncer.admit(change.path(), Instant::now())
                {
                    continue;
                }

                tracing::trace!(?change, "file change");
                if tx.blocking_send(change).is_err() {
                    // receiver dropped, the watcher is being torn down
                    return;
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "watching");

        Ok((
            Self {
                _watcher: watcher,
                root,
                rules,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("root", &self.root)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
