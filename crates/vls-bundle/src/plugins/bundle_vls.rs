//! Bundles the language server through a [`BundlerEngine`].
//!
//! One-shot mode builds once per `build_start` and holds nothing afterwards.
//! Watch mode creates a single watch context on the first `build_start`,
//! reuses it on later ones, and disposes it in `build_end`. Rebuilds after a
//! file change happen inside the context and never come back through this
//! plugin.

use crate::config::{BuildConfiguration, BuildMode, ServerLayout};
use crate::engine::{BundlerEngine, WatchContext};
use crate::plugins::{BuildPlugin, PluginContext, PluginPhase};
use crate::{Error, Result};
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

enum ContextSlot {
    Empty,
    Active(Box<dyn WatchContext>),
    Disposed,
}

/// The bundle driver participant.
pub struct BundleVlsPlugin {
    engine: Arc<dyn BundlerEngine>,
    config: BuildConfiguration,
    mode: BuildMode,
    context: Mutex<ContextSlot>,
}

impl BundleVlsPlugin {
    /// Bundle the server package at `layout` with its standard configuration.
    pub fn new(engine: Arc<dyn BundlerEngine>, layout: &ServerLayout, mode: BuildMode) -> Self {
        Self::with_config(engine, BuildConfiguration::vls(layout, mode), mode)
    }

    /// Bundle an explicit configuration. Minification always follows `mode`.
    pub fn with_config(
        engine: Arc<dyn BundlerEngine>,
        config: BuildConfiguration,
        mode: BuildMode,
    ) -> Self {
        let config = BuildConfiguration {
            minify: mode.minify(),
            ..config
        };
        Self {
            engine,
            config,
            mode,
            context: Mutex::new(ContextSlot::Empty),
        }
    }

    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Whether a watch context is currently held.
    pub async fn has_watch_context(&self) -> bool {
        matches!(*self.context.lock().await, ContextSlot::Active(_))
    }

    async fn watch(&self) -> Result<()> {
        let mut slot = self.context.lock().await;

        match &*slot {
            ContextSlot::Disposed => return Err(Error::WatchContextDisposed),
            ContextSlot::Empty => {
                tracing::debug!(entry = %self.config.entry.display(), "creating watch context");
                let context = self.engine.create_watch_context(&self.config).await?;
                *slot = ContextSlot::Active(context);
            }
            ContextSlot::Active(_) => {
                tracing::debug!("reusing watch context");
            }
        }

        if let ContextSlot::Active(context) = &*slot {
            context.watch().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BundleVlsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleVlsPlugin")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BuildPlugin for BundleVlsPlugin {
    fn name(&self) -> Cow<'static, str> {
        "bundle-vls-with-rolldown".into()
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Bundle
    }

    async fn build_start(&self, _ctx: &PluginContext) -> Result<()> {
        let start = Instant::now();
        tracing::info!("bundles {} with rolldown", self.config.entry.display());

        match self.mode {
            BuildMode::OneShot => self.engine.build(&self.config).await?,
            BuildMode::Watch => self.watch().await?,
        }

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "✨ success with rolldown"
        );
        Ok(())
    }

    async fn build_end(&self, _ctx: &PluginContext) -> Result<()> {
        let mut slot = self.context.lock().await;
        match std::mem::replace(&mut *slot, ContextSlot::Disposed) {
            ContextSlot::Active(context) => {
                tracing::debug!("disposing watch context");
                context.dispose().await;
            }
            // nothing was ever created; stay empty
            ContextSlot::Empty => *slot = ContextSlot::Empty,
            ContextSlot::Disposed => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::WatchRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        builds: AtomicUsize,
        minified_builds: AtomicUsize,
        contexts: AtomicUsize,
        minified_contexts: AtomicUsize,
        watches: AtomicUsize,
        disposals: AtomicUsize,
    }

    #[derive(Default)]
    struct FakeEngine {
        counters: Arc<Counters>,
        fail: bool,
    }

    struct FakeContext {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl BundlerEngine for FakeEngine {
        async fn build(&self, config: &BuildConfiguration) -> Result<()> {
            if self.fail {
                return Err(Error::Bundle("Could not resolve entry".to_string()));
            }
            self.counters.builds.fetch_add(1, Ordering::SeqCst);
            if config.minify {
                self.counters.minified_builds.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn create_watch_context(
            &self,
            config: &BuildConfiguration,
        ) -> Result<Box<dyn WatchContext>> {
            if self.fail {
                return Err(Error::Bundle("Could not resolve entry".to_string()));
            }
            self.counters.contexts.fetch_add(1, Ordering::SeqCst);
            if config.minify {
                self.counters.minified_contexts.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Box::new(FakeContext {
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    #[async_trait]
    impl WatchContext for FakeContext {
        async fn watch(&self) -> Result<()> {
            self.counters.watches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn dispose(&self) {
            self.counters.disposals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn plugin(mode: BuildMode) -> (BundleVlsPlugin, Arc<Counters>) {
        let engine = FakeEngine::default();
        let counters = Arc::clone(&engine.counters);
        let plugin = BundleVlsPlugin::new(Arc::new(engine), &ServerLayout::new("server"), mode);
        (plugin, counters)
    }

    fn ctx(mode: BuildMode) -> PluginContext {
        PluginContext::new(mode, Arc::new(WatchRegistry::new()))
    }

    #[tokio::test]
    async fn test_one_shot_builds_once_per_start() {
        let (plugin, counters) = plugin(BuildMode::OneShot);
        let ctx = ctx(BuildMode::OneShot);

        plugin.build_start(&ctx).await.unwrap();
        assert_eq!(counters.builds.load(Ordering::SeqCst), 1);
        assert_eq!(counters.minified_builds.load(Ordering::SeqCst), 1);

        plugin.build_start(&ctx).await.unwrap();
        assert_eq!(counters.builds.load(Ordering::SeqCst), 2);

        plugin.build_end(&ctx).await.unwrap();
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 0);
        assert_eq!(counters.disposals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_watch_reuses_single_context() {
        let (plugin, counters) = plugin(BuildMode::Watch);
        let ctx = ctx(BuildMode::Watch);

        plugin.build_start(&ctx).await.unwrap();
        plugin.build_start(&ctx).await.unwrap();

        assert_eq!(counters.contexts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.watches.load(Ordering::SeqCst), 2);
        assert_eq!(counters.builds.load(Ordering::SeqCst), 0);
        assert_eq!(counters.minified_contexts.load(Ordering::SeqCst), 0);
        assert!(plugin.has_watch_context().await);
    }

    #[tokio::test]
    async fn test_watch_disposes_exactly_once() {
        let (plugin, counters) = plugin(BuildMode::Watch);
        let ctx = ctx(BuildMode::Watch);

        plugin.build_start(&ctx).await.unwrap();
        plugin.build_end(&ctx).await.unwrap();
        plugin.build_end(&ctx).await.unwrap();
        plugin.build_end(&ctx).await.unwrap();

        assert_eq!(counters.disposals.load(Ordering::SeqCst), 1);
        assert!(!plugin.has_watch_context().await);
    }

    #[tokio::test]
    async fn test_build_end_without_context_is_noop() {
        let (plugin, counters) = plugin(BuildMode::Watch);
        let ctx = ctx(BuildMode::Watch);

        plugin.build_end(&ctx).await.unwrap();
        assert_eq!(counters.disposals.load(Ordering::SeqCst), 0);

        // a context can still be created later
        plugin.build_start(&ctx).await.unwrap();
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_after_dispose_fails() {
        let (plugin, counters) = plugin(BuildMode::Watch);
        let ctx = ctx(BuildMode::Watch);

        plugin.build_start(&ctx).await.unwrap();
        plugin.build_end(&ctx).await.unwrap();
        let err = plugin.build_start(&ctx).await.unwrap_err();

        assert!(matches!(err, Error::WatchContextDisposed));
        assert_eq!(counters.contexts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let engine = FakeEngine {
            fail: true,
            ..Default::default()
        };
        let plugin = BundleVlsPlugin::new(
            Arc::new(engine),
            &ServerLayout::new("server"),
            BuildMode::OneShot,
        );

        let err = plugin.build_start(&ctx(BuildMode::OneShot)).await.unwrap_err();
        assert!(matches!(err, Error::Bundle(ref msg) if msg.contains("entry")));
    }

    #[tokio::test]
    async fn test_failed_context_creation_leaves_slot_empty() {
        let engine = FakeEngine {
            fail: true,
            ..Default::default()
        };
        let plugin =
            BundleVlsPlugin::new(Arc::new(engine), &ServerLayout::new("server"), BuildMode::Watch);
        let ctx = ctx(BuildMode::Watch);

        assert!(plugin.build_start(&ctx).await.is_err());
        assert!(!plugin.has_watch_context().await);
        plugin.build_end(&ctx).await.unwrap();
    }

    #[test]
    fn test_minify_follows_mode() {
        let config = BuildConfiguration::vls(&ServerLayout::new("server"), BuildMode::OneShot);
        let plugin = BundleVlsPlugin::with_config(
            Arc::new(FakeEngine::default()),
            config,
            BuildMode::Watch,
        );
        assert!(!plugin.config().minify);
        assert_eq!(plugin.mode(), BuildMode::Watch);
    }
}
