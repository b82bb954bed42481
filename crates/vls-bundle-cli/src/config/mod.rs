//! Orchestrator configuration.
//!
//! Sources, lowest to highest priority: built-in defaults, `vls-bundle.json`
//! in the working directory, then `VLS_*` environment variables
//! (`VLS_SERVER_ROOT` sets `server_root`). Everything is read once at
//! startup; the resulting [`OrchestratorConfig`] is never re-read.

mod loading;

pub use loading::CONFIG_FILE;

use crate::error::{CliError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use vls_bundle::{BuildConfiguration, BuildMode, ServerLayout, TscInvocation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Keep a watch context alive instead of building once.
    #[serde(default, deserialize_with = "flag")]
    pub watch: bool,

    /// Root of the language server package.
    #[serde(default = "default_server_root")]
    pub server_root: PathBuf,

    /// Type checker binary; defaults to the package-local `tsc`.
    #[serde(default)]
    pub tsc: Option<PathBuf>,

    /// Consumer entry bundled with `./services/vls` kept external.
    #[serde(default)]
    pub host_entry: Option<PathBuf>,

    /// Output file of the consumer bundle.
    #[serde(default)]
    pub host_outfile: Option<PathBuf>,

    /// Debounce window for the host's source watcher.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default, deserialize_with = "flag")]
    pub verbose: bool,

    #[serde(default, deserialize_with = "flag")]
    pub quiet: bool,

    #[serde(default, deserialize_with = "flag")]
    pub no_color: bool,
}

fn default_server_root() -> PathBuf {
    PathBuf::from("server")
}

fn default_debounce_ms() -> u64 {
    vls_bundle::watcher::DEFAULT_DEBOUNCE_MS
}

/// Accept `true`/`false`, numbers, and shell-style strings (`""`, `0`,
/// `false`, `no`, `off` are false).
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
        Flag::Str(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "no" | "off"
        ),
    })
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            watch: false,
            server_root: default_server_root(),
            tsc: None,
            host_entry: None,
            host_outfile: None,
            debounce_ms: default_debounce_ms(),
            verbose: false,
            quiet: false,
            no_color: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn mode(&self) -> BuildMode {
        BuildMode::from_flag(self.watch)
    }

    pub fn layout(&self) -> ServerLayout {
        ServerLayout::new(&self.server_root)
    }

    pub fn tsc_invocation(&self) -> TscInvocation {
        let invocation = TscInvocation::for_layout(&self.layout());
        match &self.tsc {
            Some(program) => invocation.with_program(program),
            None => invocation,
        }
    }

    /// The consumer bundle, when both host paths are configured.
    pub fn host_bundle(&self) -> Option<BuildConfiguration> {
        match (&self.host_entry, &self.host_outfile) {
            (Some(entry), Some(outfile)) => Some(BuildConfiguration::consumer(
                entry,
                outfile,
                self.mode(),
            )),
            _ => None,
        }
    }

    /// Check consistency and make every path absolute against `base`.
    pub fn resolve(mut self, base: &Path) -> Result<Self> {
        let root = absolute(base, &self.server_root);
        if !root.is_dir() {
            return Err(CliError::config_with_hint(
                format!("server root '{}' does not exist", root.display()),
                "Set VLS_SERVER_ROOT or server_root in vls-bundle.json",
            ));
        }
        self.server_root = root.canonicalize()?;

        match (&self.host_entry, &self.host_outfile) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(CliError::config_with_hint(
                    "host_entry and host_outfile must be set together",
                    "Set both VLS_HOST_ENTRY and VLS_HOST_OUTFILE, or neither",
                ));
            }
            _ => {}
        }

        if self.debounce_ms == 0 {
            return Err(CliError::config("debounce_ms must be greater than zero"));
        }

        self.tsc = self.tsc.map(|p| absolute(base, &p));
        self.host_entry = self.host_entry.map(|p| absolute(base, &p));
        self.host_outfile = self.host_outfile.map(|p| absolute(base, &p));
        Ok(self)
    }
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
