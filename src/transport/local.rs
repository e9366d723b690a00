//! Local shell subprocess transport: plain piped stdio, no PTY.
//!
//! Ported from `runner/local/runner.go` in the upstream Go implementation,
//! which spawns the configured shell via `os/exec` with three pipes and no
//! pseudo-terminal. The process is placed in its own process group (Unix)
//! so [`crate::proctrack::ProcTracker`] can wait on the whole subtree.

use crate::error::ShellError;
use crate::options::EffectiveOptions;
use crate::transport::Transport;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// A forked local shell (`/bin/sh`, `cmd.exe`, or whatever `options.shell`
/// names), connected via plain OS pipes.
pub struct LocalTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    pgid: i32,
    closed: bool,
}

impl LocalTransport {
    /// Fork `options.shell`, overlaying `options.env` onto the inherited
    /// process environment and appending `options.system_paths` to `PATH`.
    /// Working directory is intentionally *not* set here -- per the
    /// bootstrap design, `Session` sends `cd <cwd>` as a first command so
    /// local and remote transports bootstrap state the same way.
    pub async fn spawn(options: &EffectiveOptions) -> Result<Self, ShellError> {
        let mut cmd = Command::new(&options.shell);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        if !options.system_paths.is_empty() {
            cmd.env("PATH", compute_path(options));
        }

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::other)?;
                Ok(())
            });
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ShellError::TransportInit(format!("failed to spawn {}: {e}", options.shell)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShellError::TransportInit("child stdin was not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellError::TransportInit("child stdout was not piped".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShellError::TransportInit("child stderr was not piped".into()))?;

        // setsid() makes the child its own session/group leader, so pgid == pid.
        let pgid = child.id().unwrap_or(0) as i32;

        Ok(LocalTransport {
            child,
            stdin,
            stdout: Some(stdout),
            stderr: Some(stderr),
            pgid,
            closed: false,
        })
    }

    /// The process group id registered with [`crate::proctrack::ProcTracker`].
    #[must_use]
    pub fn pgid(&self) -> i32 {
        self.pgid
    }
}

fn compute_path(options: &EffectiveOptions) -> String {
    let sep = if cfg!(windows) { ';' } else { ':' };
    let base = options
        .env
        .get("PATH")
        .cloned()
        .or_else(|| std::env::var("PATH").ok())
        .unwrap_or_default();
    let appended = options.system_paths.join(&sep.to_string());
    if base.is_empty() {
        appended
    } else {
        format!("{base}{sep}{appended}")
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn stdin(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send) {
        &mut self.stdin
    }

    fn take_stdout(&mut self) -> Box<dyn AsyncRead + Unpin + Send> {
        Box::new(self.stdout.take().expect("stdout already taken"))
    }

    fn take_stderr(&mut self) -> Box<dyn AsyncRead + Unpin + Send> {
        Box::new(self.stderr.take().expect("stderr already taken"))
    }

    fn pid(&self) -> i32 {
        self.pgid
    }

    async fn close(&mut self) -> Result<(), ShellError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    #[tokio::test]
    async fn spawn_and_close_is_idempotent() {
        let opts = Options::default().resolve();
        let mut transport = LocalTransport::spawn(&opts).await.unwrap();
        assert!(transport.pid() > 0);
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[test]
    fn compute_path_appends_with_platform_separator() {
        let opts = Options {
            env: Some(std::collections::HashMap::from([(
                "PATH".to_string(),
                "/usr/bin".to_string(),
            )])),
            system_paths: Some(vec!["/opt/tools".to_string()]),
            ..Default::default()
        }
        .resolve();
        let sep = if cfg!(windows) { ';' } else { ':' };
        assert_eq!(compute_path(&opts), format!("/usr/bin{sep}/opt/tools"));
    }
}
