//! Shared test utilities for vls-bundle integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use vls_bundle::{
    BuildConfiguration, BundlerEngine, OutputSink, Result, ServerLayout, StdStream, TscInvocation,
    WatchContext,
};

/// One call observed by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Build { minify: bool, external: Vec<String> },
    CreateWatchContext { minify: bool },
    Watch,
    Dispose,
}

/// In-memory bundler that records every call instead of bundling.
#[derive(Debug, Default, Clone)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Simulate a file change handled inside the watch context.
    pub fn internal_rebuild(&self) {
        self.calls.lock().push(EngineCall::Build {
            minify: false,
            external: Vec::new(),
        });
    }
}

struct RecordingContext {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

#[async_trait]
impl BundlerEngine for RecordingEngine {
    async fn build(&self, config: &BuildConfiguration) -> Result<()> {
        self.calls.lock().push(EngineCall::Build {
            minify: config.minify,
            external: config.external.clone(),
        });
        Ok(())
    }

    async fn create_watch_context(
        &self,
        config: &BuildConfiguration,
    ) -> Result<Box<dyn WatchContext>> {
        self.calls.lock().push(EngineCall::CreateWatchContext {
            minify: config.minify,
        });
        Ok(Box::new(RecordingContext {
            calls: Arc::clone(&self.calls),
        }))
    }
}

#[async_trait]
impl WatchContext for RecordingContext {
    async fn watch(&self) -> Result<()> {
        self.calls.lock().push(EngineCall::Watch);
        Ok(())
    }

    async fn dispose(&self) {
        self.calls.lock().push(EngineCall::Dispose);
    }
}

/// Sink that keeps forwarded subprocess output per stream.
#[derive(Debug, Default)]
pub struct CapturingSink {
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
}

impl CapturingSink {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout.lock()).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr.lock()).into_owned()
    }
}

impl OutputSink for CapturingSink {
    fn write(&self, stream: StdStream, chunk: &[u8]) {
        match stream {
            StdStream::Stdout => self.stdout.lock().extend_from_slice(chunk),
            StdStream::Stderr => self.stderr.lock().extend_from_slice(chunk),
        }
    }
}

/// A throwaway server package with `src/index.ts` and `tsconfig.json`.
pub fn server_package() -> (TempDir, ServerLayout) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("server");
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src").join("index.ts"), "export const ready: boolean = true;\n").unwrap();
    fs::write(root.join("tsconfig.json"), "{}\n").unwrap();
    (temp, ServerLayout::new(root))
}

/// Write an executable shell script standing in for `tsc`.
#[cfg(unix)]
pub fn tsc_stub(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("tsc-stub.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// The standard invocation with the compiler replaced by `program`.
pub fn stub_invocation(layout: &ServerLayout, program: PathBuf) -> TscInvocation {
    TscInvocation::for_layout(layout).with_program(program)
}
