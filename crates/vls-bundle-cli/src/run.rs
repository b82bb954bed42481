//! Drives the build host for one process lifetime.
//!
//! One-shot mode runs a single build phase and then the end phase. Watch mode
//! runs a build phase, then re-runs it whenever a registered watch path
//! changes, until Ctrl+C; the end phase runs once on the way out.

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::ui;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::mpsc;
use vls_bundle::{
    BuildConfiguration, BuildHost, BuildMode, FileChange, FileWatcher, GenerateTypingsPlugin,
    RolldownEngine,
};

/// Build the server pipeline described by `config` and run it.
pub async fn run(config: OrchestratorConfig) -> Result<()> {
    let mode = config.mode();
    let layout = config.layout();
    tracing::debug!(?config, "resolved configuration");

    let typings = GenerateTypingsPlugin::new(config.tsc_invocation());
    let engine = RolldownEngine::new().with_debounce(config.debounce_ms);
    let host = BuildHost::vls_with_typings(&layout, mode, Arc::new(engine), typings);
    let host_bundle = config.host_bundle();

    ui::info(&format!(
        "Building {} ({})",
        layout.entry().display(),
        mode
    ));

    match mode {
        BuildMode::OneShot => {
            let built = build_phase(&host, host_bundle.as_ref()).await;
            let ended = host.end().await;
            built?;
            ended?;
            Ok(())
        }
        BuildMode::Watch => watch(&host, host_bundle.as_ref(), config.debounce_ms).await,
    }
}

/// One build phase plus the optional consumer bundle.
async fn build_phase(host: &BuildHost, host_bundle: Option<&BuildConfiguration>) -> Result<()> {
    let start = Instant::now();

    host.start().await?;
    if let Some(bundle) = host_bundle {
        host.bundle_entry(RolldownEngine::new(), bundle).await?;
        ui::success(&format!("Bundled {}", bundle.outfile.display()));
    }

    ui::success(&format!(
        "Build finished in {}",
        ui::format_duration(start.elapsed())
    ));
    Ok(())
}

async fn watch(
    host: &BuildHost,
    host_bundle: Option<&BuildConfiguration>,
    debounce_ms: u64,
) -> Result<()> {
    // the first phase may fail; the watcher still starts so a fix triggers a rebuild
    if !rebuild(host, host_bundle).await {
        return shutdown(host, Vec::new()).await;
    }

    let (tx, mut changes) = mpsc::channel::<FileChange>(100);
    let mut watchers = Vec::new();
    for path in host.watched_paths() {
        let (watcher, mut rx) = FileWatcher::with_defaults(path, debounce_ms)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                if tx.send(change).await.is_err() {
                    break;
                }
            }
        });
        ui::info(&format!("Watching {}", watcher.root().display()));
        watchers.push(watcher);
    }
    drop(tx);

    if watchers.is_empty() {
        ui::warning("No paths registered for watching; only Ctrl+C ends this run");
    }
    ui::info("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                while changes.try_recv().is_ok() {}
                ui::info(&format!("{} changed, rebuilding", change.path().display()));
                if !rebuild(host, host_bundle).await {
                    break;
                }
            }

            _ = signal::ctrl_c() => break,
        }
    }

    shutdown(host, watchers).await
}

/// Run one build phase, reporting failures. Returns `false` when Ctrl+C
/// arrived first; the phase is then dropped, which kills a running `tsc`.
async fn rebuild(host: &BuildHost, host_bundle: Option<&BuildConfiguration>) -> bool {
    match unless_interrupted(build_phase(host, host_bundle), signal::ctrl_c()).await {
        Some(Ok(())) => true,
        Some(Err(e)) => {
            ui::error(&e.to_string());
            true
        }
        None => false,
    }
}

async fn shutdown(host: &BuildHost, watchers: Vec<FileWatcher>) -> Result<()> {
    ui::info("Shutting down...");
    drop(watchers);
    host.end().await?;
    Ok(())
}

/// Drive `work` to completion unless `interrupt` resolves first.
async fn unless_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future,
) -> Option<T> {
    tokio::select! {
        output = work => Some(output),
        _ = interrupt => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_work_finishes_without_interrupt() {
        let output = unless_interrupted(async { 7 }, std::future::pending::<()>()).await;
        assert_eq!(output, Some(7));
    }

    #[tokio::test]
    async fn test_interrupt_cancels_long_work() {
        let work = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            7
        };
        let interrupt = tokio::time::sleep(Duration::from_millis(10));

        let output = tokio::time::timeout(
            Duration::from_secs(5),
            unless_interrupted(work, interrupt),
        )
        .await
        .expect("interrupt was not observed while work was running");
        assert_eq!(output, None);
    }
}
