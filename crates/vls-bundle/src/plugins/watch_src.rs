//! Registers the server source tree with the host's watcher.

use crate::plugins::{BuildPlugin, PluginContext, PluginPhase};
use crate::Result;
use async_trait::async_trait;
use std::borrow::Cow;
use std::path::PathBuf;

/// Adds a whole directory to the host's watch set on every build start.
///
/// The bundle entry does not import every file that matters for a rebuild
/// (type-only modules, files read at runtime), so the subtree is watched as a
/// whole rather than relying on the module graph.
#[derive(Debug, Clone)]
pub struct WatchSourcePlugin {
    dir: PathBuf,
}

impl WatchSourcePlugin {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

#[async_trait]
impl BuildPlugin for WatchSourcePlugin {
    fn name(&self) -> Cow<'static, str> {
        "watch-vls-change".into()
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Watch
    }

    async fn build_start(&self, ctx: &PluginContext) -> Result<()> {
        ctx.add_watch_file(self.dir.clone());
        Ok(())
    }
}
