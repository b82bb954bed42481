//! The build host: owns the participants and drives their lifecycle.
//!
//! A [`BuildHost`] runs the `build_start` phase for each build trigger, the
//! `build_end` phase once at shutdown, and records the paths participants
//! asked it to watch. It can also bundle a consumer entry with the
//! participants' resolution overrides applied (see [`BuildHost::bundle_entry`]).

mod resolve_bridge;
mod watch_registry;

pub use resolve_bridge::RegistryResolvePlugin;
pub use watch_registry::WatchRegistry;

use crate::config::{BuildConfiguration, BuildMode, ServerLayout};
use crate::engine::{BundlerEngine, RolldownEngine};
use crate::plugins::{
    BundleVlsPlugin, GenerateTypingsPlugin, LinkVlsPlugin, PluginContext, PluginRegistry,
    TscInvocation, WatchSourcePlugin,
};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub struct BuildHost {
    registry: Arc<PluginRegistry>,
    watch_files: Arc<WatchRegistry>,
    mode: BuildMode,
}

impl BuildHost {
    pub fn new(registry: PluginRegistry, mode: BuildMode) -> Self {
        Self {
            registry: Arc::new(registry),
            watch_files: Arc::new(WatchRegistry::new()),
            mode,
        }
    }

    /// The server pipeline: link override, source watch, typings, bundle.
    pub fn vls(layout: &ServerLayout, mode: BuildMode, engine: Arc<dyn BundlerEngine>) -> Self {
        let typings = GenerateTypingsPlugin::new(TscInvocation::for_layout(layout));
        Self::vls_with_typings(layout, mode, engine, typings)
    }

    /// Like [`BuildHost::vls`] with a caller-provided declaration generator.
    pub fn vls_with_typings(
        layout: &ServerLayout,
        mode: BuildMode,
        engine: Arc<dyn BundlerEngine>,
        typings: GenerateTypingsPlugin,
    ) -> Self {
        let mut registry = PluginRegistry::new();
        registry.add(LinkVlsPlugin::new());
        registry.add(WatchSourcePlugin::new(layout.src_dir()));
        registry.add(typings);
        registry.add(BundleVlsPlugin::new(engine, layout, mode));

        Self::new(registry, mode)
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Handle passed to every hook.
    pub fn context(&self) -> PluginContext {
        PluginContext::new(self.mode, Arc::clone(&self.watch_files))
    }

    /// Run the `build_start` phase. Stops at the first failing participant.
    pub async fn start(&self) -> Result<()> {
        let start = Instant::now();
        tracing::info!(mode = %self.mode, plugins = self.registry.len(), "build start");

        self.registry.build_start(&self.context()).await?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "build phase complete"
        );
        Ok(())
    }

    /// Run the `build_end` phase.
    pub async fn end(&self) -> Result<()> {
        tracing::debug!("build end");
        self.registry.build_end(&self.context()).await
    }

    /// Paths registered through [`PluginContext::add_watch_file`].
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watch_files.paths()
    }

    pub fn resolve_plugin(&self) -> RegistryResolvePlugin {
        RegistryResolvePlugin::new(Arc::clone(&self.registry))
    }

    /// Bundle a consumer entry with every participant's resolution override
    /// applied, so `./services/vls` stays an external `./vls.js`.
    pub async fn bundle_entry(
        &self,
        engine: RolldownEngine,
        config: &BuildConfiguration,
    ) -> Result<()> {
        tracing::info!(entry = %config.entry.display(), "bundling host entry");
        let engine = engine.with_plugins([
            Arc::new(self.resolve_plugin()) as rolldown_plugin::__inner::SharedPluginable
        ]);
        engine.build(config).await
    }
}

impl std::fmt::Debug for BuildHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildHost")
            .field("registry", &self.registry)
            .field("watch_files", &self.watch_files)
            .field("mode", &self.mode)
            .finish()
    }
}
