//! Bundler engine seam.
//!
//! The bundle driver only needs three capabilities from a bundler: build
//! once, create a persistent watch context, and dispose that context.
//! [`RolldownEngine`] provides them with Rolldown; tests substitute
//! recording engines.

mod externals;
mod rolldown;
mod watch;
pub mod writer;

use crate::config::BuildConfiguration;
use crate::Result;
use async_trait::async_trait;

pub use self::rolldown::{RolldownEngine, bundler_options};
pub use self::watch::RolldownWatchContext;

/// A bundler that can build a [`BuildConfiguration`] once or keep watching it.
#[async_trait]
pub trait BundlerEngine: Send + Sync {
    /// Build the configured entry into the configured output.
    async fn build(&self, config: &BuildConfiguration) -> Result<()>;

    /// Create (but do not start) a persistent watch context.
    async fn create_watch_context(
        &self,
        config: &BuildConfiguration,
    ) -> Result<Box<dyn WatchContext>>;
}

/// A persistent, file-change-triggered rebuild loop.
#[async_trait]
pub trait WatchContext: Send + Sync {
    /// Start watching. Calling it again while already watching is a no-op.
    async fn watch(&self) -> Result<()>;

    /// Release watchers and background tasks. Safe to call repeatedly.
    async fn dispose(&self);
}
