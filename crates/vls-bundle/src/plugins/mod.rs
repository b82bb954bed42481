//! Build-phase participants.
//!
//! This module provides the participant interface and the four participants
//! of the server build:
//! - [`LinkVlsPlugin`] - resolution override for the prebuilt server
//! - [`WatchSourcePlugin`] - source tree watch registration
//! - [`GenerateTypingsPlugin`] - declaration generation with `tsc`
//! - [`BundleVlsPlugin`] - one-shot build or persistent watch context

mod bundle_vls;
mod link_vls;
pub mod registry;
mod typings;
mod watch_src;

pub use bundle_vls::BundleVlsPlugin;
pub use link_vls::LinkVlsPlugin;
pub use registry::{BuildPlugin, PluginContext, PluginPhase, PluginRegistry, ResolvedId};
pub use typings::{
    GenerateTypingsPlugin, OutputSink, StdStream, StdioSink, SubprocessResult, TscInvocation,
};
pub use watch_src::WatchSourcePlugin;
