//! Lazily-initialized, serialized access to one pipeline over one
//! transport.
//!
//! Ported from `runner/local/runner.go`'s init-on-first-use pattern: a
//! `Session` holds a transport kind until the first `run`, at which point
//! it spawns the shell/connects and bootstraps `cwd`/`system_paths` with
//! synthetic `cd`/`export PATH` commands -- the same two commands the
//! upstream local runner issues from `init`.

use crate::error::ShellError;
use crate::options::{EffectiveOptions, Options};
use crate::pipeline::Pipeline;
use crate::proctrack::ProcTracker;
use crate::transport::local::LocalTransport;
use crate::transport::replay::ReplayFixture;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// How a `Session` obtains its transport on first use. Credential loading
/// for SSH is entirely the caller's responsibility -- this crate only
/// ever receives an already-authenticated client.
pub enum TransportFactory {
    Local,
    Ssh(async_ssh2_tokio::Client),
    Replay(Vec<ReplayFixture>),
}

enum State {
    Created(TransportFactory),
    Ready {
        transport: Box<dyn Transport>,
        pipeline: Pipeline,
        pid: i32,
    },
    Closed,
}

/// The result of one [`Session::run`] call.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub output: String,
    pub exit_code: i32,
    pub stderr: Option<String>,
}

/// A persistent shell, serializing commands through one transport.
pub struct Session {
    state: Mutex<State>,
    options: EffectiveOptions,
    proctrack: Option<Arc<ProcTracker>>,
}

impl Session {
    #[must_use]
    pub fn new(factory: TransportFactory, options: Options) -> Self {
        Session {
            state: Mutex::new(State::Created(factory)),
            options: options.resolve(),
            proctrack: None,
        }
    }

    /// Attach a process tracker so `close` can wait for the whole process
    /// group (local transport only -- remote and replay sessions have no
    /// local process group to track).
    #[must_use]
    pub fn with_proctrack(mut self, tracker: Arc<ProcTracker>) -> Self {
        self.proctrack = Some(tracker);
        self
    }

    /// Run `command`, blocking other callers of this session until it
    /// completes. Lazily spawns the transport and runs the `cd`/`PATH`
    /// bootstrap on first use.
    pub async fn run(&self, command: &str, patch: Option<&Options>) -> Result<CommandResult, ShellError> {
        self.run_cancellable(command, patch, &CancellationToken::new()).await
    }

    /// Run `command` the same way as `run`, but honor `cancel`: if it fires
    /// before the command completes, the in-flight read stops immediately
    /// and this returns `Err(ShellError::Cancelled)`.
    pub async fn run_cancellable(
        &self,
        command: &str,
        patch: Option<&Options>,
        cancel: &CancellationToken,
    ) -> Result<CommandResult, ShellError> {
        let mut guard = self.state.lock().await;
        self.ensure_ready(&mut guard).await?;
        self.run_locked(&mut guard, command, patch, cancel).await
    }

    /// Write raw bytes to the transport's stdin without command framing --
    /// for interactive programs (`vim`, `ssh`, a REPL) the caller is
    /// driving directly rather than treating as a one-shot command.
    pub async fn send(&self, raw: &str) -> Result<usize, ShellError> {
        let mut guard = self.state.lock().await;
        self.ensure_ready(&mut guard).await?;
        let State::Ready { transport, .. } = &mut *guard else {
            unreachable!("ensure_ready guarantees Ready")
        };
        transport
            .stdin()
            .write_all(raw.as_bytes())
            .await
            .map_err(|e| ShellError::WriteFailure(e.to_string()))?;
        Ok(raw.len())
    }

    /// The underlying process (group) id, or `0` before first use / for
    /// transports with no meaningful pid.
    pub async fn pid(&self) -> i32 {
        match &*self.state.lock().await {
            State::Ready { pid, .. } => *pid,
            _ => 0,
        }
    }

    /// Idempotent teardown. Safe to call more than once and safe to call
    /// on a session that was never used.
    pub async fn close(&self) -> Result<(), ShellError> {
        let mut guard = self.state.lock().await;
        match std::mem::replace(&mut *guard, State::Closed) {
            State::Ready {
                mut transport,
                mut pipeline,
                ..
            } => {
                pipeline.close();
                transport.close().await
            }
            _ => Ok(()),
        }
    }

    /// Spawn the transport and pipeline if not already done, then run the
    /// `cd`/`export PATH` bootstrap commands. A no-op once `State::Ready`.
    async fn ensure_ready(&self, guard: &mut State) -> Result<(), ShellError> {
        if matches!(guard, State::Ready { .. }) {
            return Ok(());
        }
        let State::Created(factory) = std::mem::replace(guard, State::Closed) else {
            return Err(ShellError::TransportInit("session already closed".into()));
        };

        let transport: Box<dyn Transport> = match factory {
            TransportFactory::Local => Box::new(LocalTransport::spawn(&self.options).await?),
            TransportFactory::Ssh(client) => {
                Box::new(crate::transport::ssh::SshTransport::connect(client, &self.options).await?)
            }
            TransportFactory::Replay(fixtures) => Box::new(crate::transport::replay::ReplayTransport::new(fixtures)),
        };

        let pid = transport.pid();
        if let Some(tracker) = &self.proctrack {
            if pid > 0 {
                let _ = tracker.register_group(pid);
            }
        }

        let (pipeline, transport) = Pipeline::new(transport, self.options.clone()).await?;
        *guard = State::Ready { transport, pipeline, pid };

        let bootstrap_cancel = CancellationToken::new();
        if let Some(cwd) = self.options.cwd.clone() {
            self.run_locked(guard, &format!("cd {cwd}"), None, &bootstrap_cancel).await?;
        }
        if !self.options.system_paths.is_empty() {
            let export = format!("export PATH=$PATH:{}", self.options.system_paths.join(":"));
            self.run_locked(guard, &export, None, &bootstrap_cancel).await?;
        }
        Ok(())
    }

    /// Run one framed command against an already-`Ready` state, recording
    /// it into history if configured. Shared by `run` and the bootstrap
    /// commands `ensure_ready` issues on first use.
    async fn run_locked(
        &self,
        guard: &mut State,
        command: &str,
        patch: Option<&Options>,
        cancel: &CancellationToken,
    ) -> Result<CommandResult, ShellError> {
        let State::Ready { transport, pipeline, .. } = guard else {
            return Err(ShellError::TransportInit("session is not ready".into()));
        };

        if !pipeline.running() {
            return Err(pipeline
                .err()
                .unwrap_or_else(|| ShellError::ReadFailure("pipeline is no longer running".into())));
        }

        pipeline.drain().await;
        let framed = Pipeline::format_cmd(command);
        transport
            .stdin()
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| ShellError::WriteFailure(e.to_string()))?;

        let effective = match patch {
            Some(p) => self.options.overlay(p),
            None => self.options.clone(),
        };
        let outcome = pipeline.read_with(&effective, cancel).await;

        if let Some(err) = pipeline.err() {
            return Err(err);
        }
        if outcome.cancelled {
            return Err(ShellError::Cancelled);
        }

        if let Some(history) = &self.options.history {
            history.record(command.to_string(), &outcome.output, outcome.stderr.as_deref());
        }
        if let Some(stderr) = &outcome.stderr {
            tracing::debug!(command, stderr, "command wrote to stderr");
        }

        Ok(CommandResult {
            output: outcome.output,
            exit_code: outcome.exit_code,
            stderr: outcome.stderr,
        })
    }
}
