//! Build configuration records.
//!
//! [`BuildConfiguration`] is created once per process from a [`ServerLayout`]
//! and a [`BuildMode`] and never mutated afterwards. The mode itself is decided
//! once at startup by the caller; nothing in this crate reads the environment.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Dependencies that are never bundled.
///
/// - `eslint-plugin-vue`: eslint config resolves it with `require.resolve`
/// - `eslint`: the server crashes when it is bundled
/// - `prettier`: prettier-eslint and prettier-tslint load it themselves
/// - `tslint`: prettier-tslint loads it
/// - `typescript`: tslint loads it
pub const EXTERNAL_DEPENDENCIES: [&str; 5] =
    ["eslint-plugin-vue", "eslint", "prettier", "tslint", "typescript"];

/// Node version shipped with the oldest supported VS Code (1.47).
pub const NODE_TARGET: &str = "node12.8.1";

/// Module id rewritten by [`crate::LinkVlsPlugin`].
pub const VLS_SERVICE_ID: &str = "./services/vls";

/// Module the rewritten id points at, relative to the consumer bundle.
pub const VLS_ARTIFACT_ID: &str = "./vls.js";

/// Whether the process performs a single build or keeps a watch context alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Build once and exit (release builds).
    #[default]
    OneShot,
    /// Keep a persistent watch context and rebuild on change.
    Watch,
}

impl BuildMode {
    /// Map the watch flag read at startup to a mode.
    pub fn from_flag(watch: bool) -> Self {
        if watch { Self::Watch } else { Self::OneShot }
    }

    pub fn is_watch(self) -> bool {
        matches!(self, Self::Watch)
    }

    /// Minified output breaks breakpoints and stack traces while iterating,
    /// so only release builds minify.
    pub fn minify(self) -> bool {
        !self.is_watch()
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildMode::OneShot => write!(f, "one-shot"),
            BuildMode::Watch => write!(f, "watch"),
        }
    }
}

/// Paths of the language server package, all derived from its root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLayout {
    root: PathBuf,
}

impl ServerLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the server root.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn entry(&self) -> PathBuf {
        self.path("src/index.ts")
    }

    pub fn outfile(&self) -> PathBuf {
        self.path("dist/vls.js")
    }

    pub fn tsconfig(&self) -> PathBuf {
        self.path("tsconfig.json")
    }

    /// Source tree the host watches for rebuilds.
    pub fn src_dir(&self) -> PathBuf {
        self.path("src/")
    }

    /// The package-local compiler shim (`tsc.cmd` on Windows).
    pub fn tsc_binary(&self) -> PathBuf {
        let name = if cfg!(windows) { "tsc.cmd" } else { "tsc" };
        self.path(Path::new("node_modules").join(".bin").join(name))
    }
}

/// Immutable description of one bundling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// Entry point of the module graph.
    pub entry: PathBuf,
    /// Output artifact; its directory receives every emitted file.
    pub outfile: PathBuf,
    /// Target runtime identifiers (e.g. `node12.8.1`).
    pub target: Vec<String>,
    pub minify: bool,
    pub sourcemap: bool,
    /// Keep function and class names through minification.
    pub keep_names: bool,
    /// package.json fields consulted when resolving bare imports.
    pub main_fields: Vec<String>,
    /// Compile-time constant substitutions: expression -> replacement literal.
    pub define: IndexMap<String, String>,
    /// Dependencies resolved at load time instead of being bundled.
    pub external: Vec<String>,
    /// Project configuration handed to the bundler's TypeScript transform.
    /// `None` lets the bundler use its defaults.
    pub tsconfig: Option<PathBuf>,
}

impl BuildConfiguration {
    /// The server bundle configuration for the given mode.
    pub fn vls(layout: &ServerLayout, mode: BuildMode) -> Self {
        let mut define = IndexMap::new();
        // stylus picks `./lib-cov/stylus` when this is truthy
        define.insert("process.env.STYLUS_COV".to_string(), "false".to_string());

        Self {
            entry: layout.entry(),
            outfile: layout.outfile(),
            target: vec![NODE_TARGET.to_string()],
            minify: mode.minify(),
            sourcemap: true,
            keep_names: true,
            main_fields: vec!["module".to_string(), "main".to_string()],
            define,
            external: EXTERNAL_DEPENDENCIES.iter().map(|s| s.to_string()).collect(),
            tsconfig: Some(layout.tsconfig()),
        }
    }

    /// Configuration for a consumer bundle (e.g. the CLI that links the server).
    ///
    /// Dependencies are left to the resolution hooks; no externals, constants
    /// or tsconfig.
    pub fn consumer(
        entry: impl Into<PathBuf>,
        outfile: impl Into<PathBuf>,
        mode: BuildMode,
    ) -> Self {
        Self {
            entry: entry.into(),
            outfile: outfile.into(),
            target: vec![NODE_TARGET.to_string()],
            minify: mode.minify(),
            sourcemap: true,
            keep_names: true,
            main_fields: vec!["module".to_string(), "main".to_string()],
            define: IndexMap::new(),
            external: Vec::new(),
            tsconfig: None,
        }
    }

    /// Directory every output file is written into.
    pub fn out_dir(&self) -> PathBuf {
        match self.outfile.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Output name without extension (`dist/vls.js` -> `vls`).
    pub fn output_name(&self) -> String {
        self.outfile
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("index")
            .to_string()
    }

    /// Whether `specifier` is one of the external dependencies or a subpath
    /// of one (`typescript/lib/tsserverlibrary`).
    pub fn is_external(&self, specifier: &str) -> bool {
        matches_dependency(&self.external, specifier)
    }

    /// Reject configurations the engine cannot act on.
    pub fn validate(&self) -> crate::Result<()> {
        if self.entry.as_os_str().is_empty() {
            return Err(crate::Error::InvalidConfig(
                "entry point must not be empty".to_string(),
            ));
        }
        if self.outfile.file_name().is_none() {
            return Err(crate::Error::InvalidConfig(format!(
                "output '{}' must name a file",
                self.outfile.display()
            )));
        }
        Ok(())
    }
}

/// `specifier` is `dep` or `dep/...` for one of `dependencies`.
pub(crate) fn matches_dependency(dependencies: &[String], specifier: &str) -> bool {
    dependencies.iter().any(|dep| {
        specifier
            .strip_prefix(dep.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}
