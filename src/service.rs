//! Thin façade over a single [`Session`].
//!
//! Ported from `service.go`'s `Run`/`PID` delegation, with the OS/hardware
//! detection (`detectSystem`, `uname`/`lsb_release` probing) left out: this
//! crate is a shell-session primitive, not a system-inventory tool, and
//! callers that need that information can run `uname` themselves through
//! `run`.

use crate::error::ShellError;
use crate::options::Options;
use crate::session::{CommandResult, Session, TransportFactory};
use std::sync::Arc;

/// A ready-to-use shell: constructs its `Session` and exposes the minimal
/// surface most callers need.
pub struct Service {
    session: Arc<Session>,
}

impl Service {
    /// A shell on the local machine.
    #[must_use]
    pub fn local(options: Options) -> Self {
        Service {
            session: Arc::new(Session::new(TransportFactory::Local, options)),
        }
    }

    /// A shell on the local machine whose process group is watched by
    /// `tracker` so its exit can be awaited independently of `close`.
    #[must_use]
    pub fn local_tracked(options: Options, tracker: Arc<crate::proctrack::ProcTracker>) -> Self {
        Service {
            session: Arc::new(Session::new(TransportFactory::Local, options).with_proctrack(tracker)),
        }
    }

    /// A shell over an already-authenticated SSH connection.
    #[must_use]
    pub fn ssh(client: async_ssh2_tokio::Client, options: Options) -> Self {
        Service {
            session: Arc::new(Session::new(TransportFactory::Ssh(client), options)),
        }
    }

    /// A deterministic fixture-backed shell for tests.
    #[must_use]
    pub fn replay(fixtures: Vec<crate::transport::replay::ReplayFixture>, options: Options) -> Self {
        Service {
            session: Arc::new(Session::new(TransportFactory::Replay(fixtures), options)),
        }
    }

    /// Run `command` to completion and return its output, exit code, and
    /// any stderr text.
    pub async fn run(&self, command: &str) -> Result<CommandResult, ShellError> {
        self.session.run(command, None).await
    }

    /// Run `command` with a one-off options overlay (timeout, terminators,
    /// listener, …) applied only to this call.
    pub async fn run_with(&self, command: &str, patch: &Options) -> Result<CommandResult, ShellError> {
        self.session.run(command, Some(patch)).await
    }

    /// Run `command`, aborting with `ShellError::Cancelled` if `cancel`
    /// fires before the command completes.
    pub async fn run_cancellable(
        &self,
        command: &str,
        patch: Option<&Options>,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<CommandResult, ShellError> {
        self.session.run_cancellable(command, patch, cancel).await
    }

    /// Raw stdin passthrough for interactive/pipelined use, bypassing
    /// command framing entirely.
    pub async fn send(&self, raw: &str) -> Result<usize, ShellError> {
        self.session.send(raw).await
    }

    /// The underlying shell process (group) id, or `0` before first use.
    pub async fn pid(&self) -> i32 {
        self.session.pid().await
    }

    /// Idempotent teardown of the underlying transport.
    pub async fn close(&self) -> Result<(), ShellError> {
        self.session.close().await
    }
}
