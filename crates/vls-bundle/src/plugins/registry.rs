//! Build-phase participant interface and the registry that dispatches to it.
//!
//! Participants are ordered by [`PluginPhase`] so resolution overrides and
//! watch registration happen before typings are generated, and typings are
//! generated before the bundle is built.

use crate::config::BuildMode;
use crate::host::WatchRegistry;
use crate::Result;
use async_trait::async_trait;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

/// Plugin execution phases
///
/// `build_start` runs in phase order (lower numbers first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginPhase {
    /// Module resolution overrides
    Resolve = 0,

    /// Watch registration with the host
    Watch = 10,

    /// Declaration generation (external type checker)
    Typings = 20,

    /// Bundling through the bundler engine
    Bundle = 30,
}

/// Result of a resolution override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    /// Module id the import is rewritten to.
    pub id: String,
    /// Leave the module out of the bundle and load it at runtime.
    pub external: bool,
}

impl ResolvedId {
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: true,
        }
    }
}

/// Host handle passed to lifecycle hooks.
#[derive(Debug, Clone)]
pub struct PluginContext {
    mode: BuildMode,
    watch_files: Arc<WatchRegistry>,
}

impl PluginContext {
    pub fn new(mode: BuildMode, watch_files: Arc<WatchRegistry>) -> Self {
        Self { mode, watch_files }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Ask the host to rebuild when anything under `path` changes.
    pub fn add_watch_file(&self, path: impl Into<PathBuf>) {
        self.watch_files.register(path);
    }
}

/// A build-phase participant. Every hook is optional.
#[async_trait]
pub trait BuildPlugin: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    /// Return the execution phase for this plugin
    ///
    /// Defaults to `Bundle`.
    fn phase(&self) -> PluginPhase {
        PluginPhase::Bundle
    }

    /// Resolve a module id, or `None` to defer to default resolution.
    fn resolve_id(&self, _specifier: &str, _importer: Option<&str>) -> Option<ResolvedId> {
        None
    }

    async fn build_start(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn build_end(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }
}

/// Plugin registry that maintains participants in phase order
pub struct PluginRegistry {
    plugins: Vec<(PluginPhase, Arc<dyn BuildPlugin>)>,
}

impl PluginRegistry {
    /// Create a new empty plugin registry
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Add a plugin, keeping registration order within a phase.
    pub fn add<P: BuildPlugin + 'static>(&mut self, plugin: P) {
        self.add_shared(Arc::new(plugin));
    }

    /// Add a plugin that is shared with the caller.
    pub fn add_shared(&mut self, plugin: Arc<dyn BuildPlugin>) {
        let phase = plugin.phase();
        let at = self
            .plugins
            .iter()
            .position(|(existing, _)| *existing > phase)
            .unwrap_or(self.plugins.len());
        self.plugins.insert(at, (phase, plugin));
    }

    /// Ask each participant in order; the first answer wins.
    pub fn resolve_id(&self, specifier: &str, importer: Option<&str>) -> Option<ResolvedId> {
        self.plugins.iter().find_map(|(_, plugin)| {
            let resolved = plugin.resolve_id(specifier, importer);
            if let Some(ref r) = resolved {
                tracing::debug!(
                    plugin = %plugin.name(),
                    specifier,
                    id = %r.id,
                    external = r.external,
                    "resolved"
                );
            }
            resolved
        })
    }

    /// Run every `build_start` hook in phase order, stopping at the first error.
    pub async fn build_start(&self, ctx: &PluginContext) -> Result<()> {
        for (phase, plugin) in &self.plugins {
            tracing::debug!(plugin = %plugin.name(), ?phase, "build_start");
            plugin.build_start(ctx).await?;
        }
        Ok(())
    }

    /// Run every `build_end` hook; the first error is returned once all have run.
    pub async fn build_end(&self, ctx: &PluginContext) -> Result<()> {
        let mut first_error = None;
        for (_, plugin) in &self.plugins {
            tracing::debug!(plugin = %plugin.name(), "build_end");
            if let Err(e) = plugin.build_end(ctx).await {
                tracing::warn!(plugin = %plugin.name(), error = %e, "build_end failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Plugin names in dispatch order.
    pub fn names(&self) -> Vec<Cow<'static, str>> {
        self.plugins.iter().map(|(_, p)| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}
