//! Keeps the prebuilt server out of consumer bundles.

use crate::config::{VLS_ARTIFACT_ID, VLS_SERVICE_ID};
use crate::plugins::{BuildPlugin, PluginPhase, ResolvedId};
use async_trait::async_trait;
use std::borrow::Cow;

/// Rewrites one exact import id to an external module.
///
/// Consumers import the server as `./services/vls`; the published package
/// ships it as the sibling `./vls.js`, so the import must stay a runtime
/// `require` instead of pulling the server sources in a second time.
#[derive(Debug, Clone)]
pub struct LinkVlsPlugin {
    source: String,
    target: String,
}

impl LinkVlsPlugin {
    pub fn new() -> Self {
        Self::with_ids(VLS_SERVICE_ID, VLS_ARTIFACT_ID)
    }

    pub fn with_ids(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl Default for LinkVlsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildPlugin for LinkVlsPlugin {
    fn name(&self) -> Cow<'static, str> {
        "link-vls-in-cli".into()
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Resolve
    }

    fn resolve_id(&self, specifier: &str, _importer: Option<&str>) -> Option<ResolvedId> {
        (specifier == self.source).then(|| ResolvedId::external(self.target.clone()))
    }
}
