//! Keeps external dependencies and their subpaths out of the bundle.

use crate::config::matches_dependency;
use rolldown_common::ResolvedExternal;
use rolldown_plugin::{
    HookResolveIdArgs, HookResolveIdOutput, HookResolveIdReturn, HookUsage, Plugin,
    PluginContext as RolldownContext,
};
use std::borrow::Cow;

/// Marks `dep` and every `dep/...` import external.
///
/// Rolldown's `external` option only matches whole specifiers, so a deep
/// import such as `typescript/lib/tsserverlibrary` would otherwise be inlined.
#[derive(Debug, Clone)]
pub(crate) struct ExternalDependencies {
    dependencies: Vec<String>,
}

impl ExternalDependencies {
    pub(crate) fn new(dependencies: Vec<String>) -> Self {
        Self { dependencies }
    }

    fn output(&self, specifier: &str) -> Option<HookResolveIdOutput> {
        matches_dependency(&self.dependencies, specifier).then(|| HookResolveIdOutput {
            id: specifier.to_string().into(),
            external: Some(ResolvedExternal::Bool(true)),
            ..Default::default()
        })
    }
}

impl Plugin for ExternalDependencies {
    fn name(&self) -> Cow<'static, str> {
        "vls-external-dependencies".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId
    }

    fn resolve_id(
        &self,
        _ctx: &RolldownContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let output = self.output(args.specifier);
        if output.is_some() {
            tracing::trace!(specifier = args.specifier, "external dependency");
        }

        async move { Ok(output) }
    }
}
