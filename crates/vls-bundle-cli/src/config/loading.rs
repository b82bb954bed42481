use super::OrchestratorConfig;
use crate::error::Result;
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use std::path::Path;

/// Optional configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "vls-bundle.json";

impl OrchestratorConfig {
    /// Load from the process working directory.
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::load_from(&cwd)
    }

    /// Load with `dir` as the working directory: defaults, then
    /// `dir/vls-bundle.json` if present, then `VLS_*` variables. Relative
    /// paths are resolved against `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let config: Self = Self::figment(dir).extract()?;
        config.resolve(dir)
    }

    fn figment(dir: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let file = dir.join(CONFIG_FILE);
        if file.exists() {
            tracing::debug!(path = %file.display(), "loading config file");
            figment = figment.merge(Json::file(file));
        }

        figment.merge(Env::prefixed("VLS_"))
    }
}
