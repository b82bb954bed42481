//! Rolldown plugin that routes module resolution through a [`PluginRegistry`].

use crate::plugins::PluginRegistry;
use rolldown_common::ResolvedExternal;
use rolldown_plugin::{
    HookResolveIdArgs, HookResolveIdOutput, HookResolveIdReturn, HookUsage, Plugin,
    PluginContext as RolldownContext,
};
use std::borrow::Cow;
use std::sync::Arc;

/// Bridges Rolldown's `resolve_id` hook to the participants' resolution
/// overrides. Specifiers no participant claims fall through to Rolldown's
/// default resolver.
#[derive(Debug, Clone)]
pub struct RegistryResolvePlugin {
    registry: Arc<PluginRegistry>,
}

impl RegistryResolvePlugin {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    fn output(&self, specifier: &str, importer: Option<&str>) -> Option<HookResolveIdOutput> {
        self.registry
            .resolve_id(specifier, importer)
            .map(|resolved| HookResolveIdOutput {
                id: resolved.id.into(),
                external: Some(ResolvedExternal::Bool(resolved.external)),
                ..Default::default()
            })
    }
}

impl Plugin for RegistryResolvePlugin {
    fn name(&self) -> Cow<'static, str> {
        "vls-registry-resolve".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId
    }

    fn resolve_id(
        &self,
        _ctx: &RolldownContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let importer = args.importer.as_ref().map(|i| i.to_string());
        let output = self.output(args.specifier, importer.as_deref());

        async move { Ok(output) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::LinkVlsPlugin;

    fn bridge() -> RegistryResolvePlugin {
        let mut registry = PluginRegistry::new();
        registry.add(LinkVlsPlugin::new());
        RegistryResolvePlugin::new(Arc::new(registry))
    }

    #[test]
    fn test_override_becomes_external_output() {
        let output = bridge().output("./services/vls", Some("src/cli.ts")).unwrap();

        assert_eq!(output.id.as_str(), "./vls.js");
        assert!(matches!(output.external, Some(ResolvedExternal::Bool(true))));
    }

    #[test]
    fn test_unclaimed_specifier_passes_through() {
        assert!(bridge().output("./services/vls.ts", None).is_none());
        assert!(bridge().output("typescript", None).is_none());
    }

    #[test]
    fn test_plugin_name() {
        assert_eq!(bridge().name(), "vls-registry-resolve");
    }
}
