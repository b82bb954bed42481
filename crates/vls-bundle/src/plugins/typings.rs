//! Declaration generation through the external TypeScript compiler.
//!
//! `tsc` runs in declaration-only, incremental mode with the server package as
//! its working directory. Its stdout and stderr are forwarded live while it
//! runs; a non-zero exit fails the build phase with [`Error::TypeCheck`].
//!
//! ```text
//! tsc stdout ──► reader task ─┐
//!                             ├─► channel ──► forwarder ──► OutputSink
//! tsc stderr ──► reader task ─┘
//! ```
//!
//! Chunks keep their order within each stream. All three tasks are joined
//! before the exit status is looked at, so a failing phase has already
//! printed every diagnostic by the time the error surfaces.

use crate::config::ServerLayout;
use crate::plugins::{BuildPlugin, PluginContext, PluginPhase};
use crate::{Error, Result};
use async_trait::async_trait;
use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

const READ_CHUNK: usize = 8 * 1024;

/// Which of the subprocess streams a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

/// Destination for forwarded subprocess output.
pub trait OutputSink: Send + Sync {
    fn write(&self, stream: StdStream, chunk: &[u8]);
}

/// Writes to this process's own stdout/stderr, flushing each chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn write(&self, stream: StdStream, chunk: &[u8]) {
        use std::io::Write;

        let result = match stream {
            StdStream::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(chunk).and_then(|_| out.flush())
            }
            StdStream::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(chunk).and_then(|_| err.flush())
            }
        };

        if let Err(e) = result {
            tracing::debug!(?stream, error = %e, "dropped type checker output");
        }
    }
}

/// Outcome of one type checker run. Output has already been forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubprocessResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl SubprocessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// How to launch the type checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TscInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory; relative paths in tsconfig.json resolve from here.
    pub cwd: PathBuf,
}

impl TscInvocation {
    /// Declaration-only, incremental compile into `./typings`.
    pub const DECLARATION_ARGS: [&'static str; 8] = [
        "-p",
        "tsconfig.json",
        "--declaration",
        "--declarationDir",
        "./typings",
        "--emitDeclarationOnly",
        "--pretty",
        "--incremental",
    ];

    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }

    /// The locally installed `tsc` of the server package.
    ///
    /// The program path is made absolute against the current directory, since
    /// a relative one would be looked up again from inside `cwd`.
    pub fn for_layout(layout: &ServerLayout) -> Self {
        let program = layout.tsc_binary();
        Self::new(
            std::path::absolute(&program).unwrap_or(program),
            Self::DECLARATION_ARGS.iter().map(|s| s.to_string()).collect(),
            layout.root(),
        )
    }

    /// Replace the compiler binary, keeping arguments and working directory.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Spawn the process, forward its output into `sink` and wait for it to exit.
    ///
    /// There is no timeout: a hung compiler blocks the caller. Dropping the
    /// returned future kills the child.
    pub async fn run(&self, sink: Arc<dyn OutputSink>) -> Result<SubprocessResult> {
        tracing::debug!(
            program = %self.program.display(),
            args = ?self.args,
            cwd = %self.cwd.display(),
            "spawning type checker"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<(StdStream, Vec<u8>)>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, StdStream::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, StdStream::Stderr, tx.clone())));
        }
        // the forwarder ends once both readers drop their senders
        drop(tx);

        let forwarder = tokio::spawn(async move {
            while let Some((stream, chunk)) = rx.recv().await {
                sink.write(stream, &chunk);
            }
        });

        let status = child.wait().await?;

        for reader in readers {
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "failed reading type checker output"),
                Err(e) => tracing::warn!(error = %e, "type checker output reader panicked"),
            }
        }
        if let Err(e) = forwarder.await {
            tracing::warn!(error = %e, "type checker output forwarder panicked");
        }

        Ok(SubprocessResult {
            exit_code: status.code(),
        })
    }
}

/// Read `reader` to EOF, sending every chunk tagged with its stream.
async fn pump<R>(
    mut reader: R,
    stream: StdStream,
    tx: mpsc::UnboundedSender<(StdStream, Vec<u8>)>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if tx.send((stream, buf[..n].to_vec())).is_err() {
            return Ok(());
        }
    }
}

/// Runs `tsc` at build start and fails the phase when it reports errors.
pub struct GenerateTypingsPlugin {
    invocation: TscInvocation,
    sink: Arc<dyn OutputSink>,
}

impl GenerateTypingsPlugin {
    pub fn new(invocation: TscInvocation) -> Self {
        Self::with_sink(invocation, Arc::new(StdioSink))
    }

    pub fn with_sink(invocation: TscInvocation, sink: Arc<dyn OutputSink>) -> Self {
        Self { invocation, sink }
    }

    pub fn invocation(&self) -> &TscInvocation {
        &self.invocation
    }
}

impl std::fmt::Debug for GenerateTypingsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateTypingsPlugin")
            .field("invocation", &self.invocation)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BuildPlugin for GenerateTypingsPlugin {
    fn name(&self) -> Cow<'static, str> {
        "generate-typings-vls".into()
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Typings
    }

    async fn build_start(&self, _ctx: &PluginContext) -> Result<()> {
        let start = Instant::now();
        let result = self.invocation.run(Arc::clone(&self.sink)).await?;

        if !result.success() {
            tracing::error!(exit_code = ?result.exit_code, "type checker failed");
            return Err(Error::TypeCheck {
                exit_code: result.exit_code,
            });
        }

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "typings generated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        chunks: Mutex<Vec<(StdStream, Vec<u8>)>>,
    }

    impl CapturingSink {
        fn text(&self, stream: StdStream) -> String {
            let bytes: Vec<u8> = self
                .chunks
                .lock()
                .iter()
                .filter(|(s, _)| *s == stream)
                .flat_map(|(_, c)| c.iter().copied())
                .collect();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl OutputSink for CapturingSink {
        fn write(&self, stream: StdStream, chunk: &[u8]) {
            self.chunks.lock().push((stream, chunk.to_vec()));
        }
    }

    #[test]
    fn test_declaration_args() {
        let invocation = TscInvocation::for_layout(&ServerLayout::new("/repo/server"));
        assert_eq!(
            invocation.args,
            vec![
                "-p",
                "tsconfig.json",
                "--declaration",
                "--declarationDir",
                "./typings",
                "--emitDeclarationOnly",
                "--pretty",
                "--incremental",
            ]
        );
        assert_eq!(invocation.cwd, PathBuf::from("/repo/server"));
    }

    #[test]
    fn test_with_program_keeps_args() {
        let invocation =
            TscInvocation::for_layout(&ServerLayout::new("server")).with_program("/usr/bin/tsc");
        assert_eq!(invocation.program, PathBuf::from("/usr/bin/tsc"));
        assert_eq!(invocation.args.len(), 8);
    }

    #[test]
    fn test_relative_layout_program_is_absolute() {
        let invocation = TscInvocation::for_layout(&ServerLayout::new("server"));

        assert!(invocation.program.is_absolute());
        #[cfg(unix)]
        assert!(invocation.program.ends_with("server/node_modules/.bin/tsc"));
        assert_eq!(invocation.cwd, PathBuf::from("server"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_layout_spawns_package_tsc() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir_in(".").unwrap();
        let bin = dir.path().join("node_modules").join(".bin");
        std::fs::create_dir_all(&bin).unwrap();
        let tsc = bin.join("tsc");
        std::fs::write(&tsc, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&tsc, std::fs::Permissions::from_mode(0o755)).unwrap();

        let relative = PathBuf::from(dir.path().file_name().unwrap());
        let invocation = TscInvocation::for_layout(&ServerLayout::new(relative));

        let result = invocation.run(Arc::new(StdioSink)).await.unwrap();
        assert!(result.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropping_run_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let invocation = shell("sleep 0.5; touch finished", dir.path());

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            invocation.run(Arc::new(StdioSink)),
        )
        .await;
        assert!(outcome.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(900)).await;
        assert!(!marker.exists());
    }

    #[test]
    fn test_subprocess_result_success() {
        assert!(SubprocessResult { exit_code: Some(0) }.success());
        assert!(!SubprocessResult { exit_code: Some(1) }.success());
        assert!(!SubprocessResult { exit_code: None }.success());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let invocation = TscInvocation::new(
            "/definitely/not/here/tsc",
            vec![],
            std::env::temp_dir(),
        );
        let err = invocation.run(Arc::new(StdioSink)).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { ref program, .. } if program.contains("tsc")));
    }

    #[cfg(unix)]
    fn shell(script: &str, cwd: impl Into<PathBuf>) -> TscInvocation {
        TscInvocation::new("sh", vec!["-c".to_string(), script.to_string()], cwd)
    }

    #[cfg(unix)]
    fn ctx() -> PluginContext {
        PluginContext::new(
            crate::config::BuildMode::OneShot,
            Arc::new(crate::host::WatchRegistry::new()),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let sink = Arc::new(CapturingSink::default());
        let plugin =
            GenerateTypingsPlugin::with_sink(shell("exit 0", std::env::temp_dir()), sink.clone());

        plugin.build_start(&ctx()).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_type_check_error() {
        let sink = Arc::new(CapturingSink::default());
        let plugin =
            GenerateTypingsPlugin::with_sink(shell("exit 1", std::env::temp_dir()), sink.clone());

        let err = plugin.build_start(&ctx()).await.unwrap_err();
        assert!(matches!(err, Error::TypeCheck { exit_code: Some(1) }));
        assert_eq!(err.to_string(), "type-check error.");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_forwarded_in_order_per_stream() {
        let sink = Arc::new(CapturingSink::default());
        let script = "printf 'one '; printf 'warn ' >&2; printf 'two '; \
                      printf 'error TS1234' >&2; printf 'three'; exit 3";
        let plugin =
            GenerateTypingsPlugin::with_sink(shell(script, std::env::temp_dir()), sink.clone());

        let err = plugin.build_start(&ctx()).await.unwrap_err();

        assert!(matches!(err, Error::TypeCheck { exit_code: Some(3) }));
        assert_eq!(sink.text(StdStream::Stdout), "one two three");
        assert_eq!(sink.text(StdStream::Stderr), "warn error TS1234");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_does_not_block() {
        let sink = Arc::new(CapturingSink::default());
        let script = "i=0; while [ $i -lt 2000 ]; do \
                      echo \"src/file$i.ts(1,1): error TS2304: Cannot find name 'x'.\"; \
                      echo \"stderr line $i\" >&2; i=$((i+1)); done; exit 0";
        let invocation = shell(script, std::env::temp_dir());

        let result = invocation.run(sink.clone()).await.unwrap();

        assert!(result.success());
        assert_eq!(sink.text(StdStream::Stdout).lines().count(), 2000);
        assert_eq!(sink.text(StdStream::Stderr).lines().count(), 2000);
        assert!(
            sink.text(StdStream::Stderr)
                .lines()
                .last()
                .is_some_and(|l| l == "stderr line 1999")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CapturingSink::default());

        let result = shell("pwd -P", dir.path()).run(sink.clone()).await.unwrap();

        assert!(result.success());
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            PathBuf::from(sink.text(StdStream::Stdout).trim()),
            expected
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_termination_is_type_check_error() {
        let sink = Arc::new(CapturingSink::default());
        let plugin = GenerateTypingsPlugin::with_sink(
            shell("kill -9 $$", std::env::temp_dir()),
            sink.clone(),
        );

        let err = plugin.build_start(&ctx()).await.unwrap_err();
        assert!(matches!(err, Error::TypeCheck { exit_code: None }));
    }
}
