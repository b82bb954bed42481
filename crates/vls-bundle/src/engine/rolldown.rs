use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rolldown::{
    BundlerBuilder, BundlerOptions, InputItem, IsExternal, OutputFormat, Platform,
    RawMinifyOptions, ResolveOptions, SourceMapType, TsConfig,
};
use rolldown_plugin::__inner::SharedPluginable;

use super::externals::ExternalDependencies;
use super::watch::RolldownWatchContext;
use super::{BundlerEngine, WatchContext, writer};
use crate::config::BuildConfiguration;
use crate::watcher::DEFAULT_DEBOUNCE_MS;
use crate::{Error, Result};

/// [`BundlerEngine`] backed by Rolldown.
///
/// Output is CommonJS for Node. Extra Rolldown plugins (for example the
/// host's resolution bridge) are passed to every build.
#[derive(Clone)]
pub struct RolldownEngine {
    plugins: Vec<SharedPluginable>,
    cwd: Option<PathBuf>,
    debounce_ms: u64,
}

impl Default for RolldownEngine {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            cwd: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl RolldownEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debounce window of the watch contexts this engine creates.
    pub fn with_debounce(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Add Rolldown plugins to every build.
    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = SharedPluginable>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Resolve relative entries against `cwd` instead of the process directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Run one bundle and write it to the configuration's output directory.
    pub(crate) async fn bundle(&self, config: &BuildConfiguration) -> Result<Vec<PathBuf>> {
        config.validate()?;

        let mut options = bundler_options(config);
        if self.cwd.is_some() {
            options.cwd = self.cwd.clone();
        }

        let mut plugins = self.plugins.clone();
        if !config.external.is_empty() {
            plugins.push(Arc::new(ExternalDependencies::new(config.external.clone())));
        }

        let mut bundler = BundlerBuilder::default()
            .with_options(options)
            .with_plugins(plugins)
            .build()
            .map_err(|e| Error::from_rolldown_batch(&e))?;

        let output = bundler
            .generate()
            .await
            .map_err(|e| Error::from_rolldown_batch(&e))?;

        for warning in &output.warnings {
            tracing::warn!("{:?}", warning);
        }

        writer::write_bundle_to(&output, &self.resolve(&config.out_dir()))
    }

    /// Resolve a configuration path against the engine's working directory.
    pub(crate) fn resolve(&self, path: &Path) -> PathBuf {
        match &self.cwd {
            Some(cwd) if path.is_relative() => cwd.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl std::fmt::Debug for RolldownEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolldownEngine")
            .field("plugins", &self.plugins.len())
            .field("cwd", &self.cwd)
            .field("debounce_ms", &self.debounce_ms)
            .finish()
    }
}

#[async_trait]
impl BundlerEngine for RolldownEngine {
    async fn build(&self, config: &BuildConfiguration) -> Result<()> {
        let written = self.bundle(config).await?;
        tracing::debug!(files = written.len(), "build finished");
        Ok(())
    }

    async fn create_watch_context(
        &self,
        config: &BuildConfiguration,
    ) -> Result<Box<dyn WatchContext>> {
        config.validate()?;
        Ok(Box::new(
            RolldownWatchContext::new(Arc::new(self.clone()), config.clone())
                .with_debounce(self.debounce_ms),
        ))
    }
}

/// Translate a [`BuildConfiguration`] into Rolldown options.
///
/// Rolldown has no down-levelling target; `config.target` is only logged.
/// `external` here matches whole specifiers; [`RolldownEngine`] adds a
/// resolver that extends it to subpaths.
pub fn bundler_options(config: &BuildConfiguration) -> BundlerOptions {
    if !config.target.is_empty() {
        tracing::debug!(target = ?config.target, "runtime target");
    }

    BundlerOptions {
        input: Some(vec![InputItem {
            name: Some(config.output_name()),
            import: config.entry.to_string_lossy().into_owned(),
        }]),
        format: Some(OutputFormat::Cjs),
        platform: Some(Platform::Node),
        sourcemap: config.sourcemap.then_some(SourceMapType::File),
        minify: Some(RawMinifyOptions::from(config.minify)),
        keep_names: Some(config.keep_names),
        external: Some(IsExternal::from(config.external.clone())),
        define: (!config.define.is_empty()).then(|| {
            config
                .define
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        }),
        resolve: Some(ResolveOptions {
            main_fields: Some(config.main_fields.clone()),
            ..Default::default()
        }),
        tsconfig: config.tsconfig.clone().map(TsConfig::Manual),
        ..Default::default()
    }
}
