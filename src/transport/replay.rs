//! Deterministic replay transport: a test double that returns stored
//! output for matching stdin strings, ported from
//! `runner/replay/runner.go`. Unlike a live shell, a replay has no process
//! to own -- the "transport" is just a fixture list plus the plumbing that
//! makes it speak the same byte-stream protocol a real shell would.

use crate::error::ShellError;
use crate::transport::bridge::ChannelReader;
use crate::transport::Transport;
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// One canned response: when the exact raw command text (the command as
/// passed to `Run`, before status-sentinel framing) matches `command`,
/// the transport emits `output`/`error` and reports `exit_code`.
#[derive(Debug, Clone)]
pub struct ReplayFixture {
    pub command: String,
    pub output: String,
    pub error: Option<String>,
    pub exit_code: i32,
}

impl ReplayFixture {
    #[must_use]
    pub fn new(command: impl Into<String>, output: impl Into<String>, exit_code: i32) -> Self {
        ReplayFixture {
            command: command.into(),
            output: output.into(),
            error: None,
            exit_code,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

struct Shared {
    fixtures: Mutex<Vec<ReplayFixture>>,
    stdout_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    stderr_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    miss: Arc<AtomicBool>,
}

/// Matches consumed stdin against `fixtures`; on a miss, closes the output
/// channels so pending/future reads surface [`ShellError::ReplayMiss`].
struct ReplayWriter {
    shared: Arc<Shared>,
}

impl AsyncWrite for ReplayWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let text = String::from_utf8_lossy(buf).to_string();
        let raw = strip_status_echo(&text);

        let matched = {
            let mut fixtures = self.shared.fixtures.lock().expect("fixtures mutex poisoned");
            fixtures
                .iter()
                .position(|f| f.command == raw)
                .map(|pos| fixtures.remove(pos))
        };

        match matched {
            Some(fixture) => {
                let mut out = fixture.output.clone();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!("status:{}\n", fixture.exit_code));
                if let Some(tx) = self.shared.stdout_tx.lock().expect("mutex poisoned").as_ref() {
                    let _ = tx.send(out.into_bytes());
                }
                if let Some(err_text) = &fixture.error {
                    if let Some(tx) = self.shared.stderr_tx.lock().expect("mutex poisoned").as_ref() {
                        let _ = tx.send(err_text.clone().into_bytes());
                    }
                }
            }
            None => {
                self.shared.miss.store(true, Ordering::SeqCst);
                self.shared.stdout_tx.lock().expect("mutex poisoned").take();
                self.shared.stderr_tx.lock().expect("mutex poisoned").take();
            }
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Strip the trailing `echo 'status:'$?` line [`crate::pipeline::Pipeline::format_cmd`]
/// appends, recovering the raw command a fixture was recorded against.
fn strip_status_echo(framed: &str) -> String {
    match framed.strip_suffix("echo 'status:'$?\n") {
        Some(rest) => rest.strip_suffix('\n').unwrap_or(rest).to_string(),
        None => framed.strip_suffix('\n').unwrap_or(framed).to_string(),
    }
}

pub struct ReplayTransport {
    shared: Arc<Shared>,
    writer: ReplayWriter,
    stdout_rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    stderr_rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: bool,
}

impl ReplayTransport {
    #[must_use]
    pub fn new(fixtures: Vec<ReplayFixture>) -> Self {
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            fixtures: Mutex::new(fixtures),
            stdout_tx: Mutex::new(Some(stdout_tx)),
            stderr_tx: Mutex::new(Some(stderr_tx)),
            miss: Arc::new(AtomicBool::new(false)),
        });
        ReplayTransport {
            writer: ReplayWriter { shared: shared.clone() },
            shared,
            stdout_rx: Some(stdout_rx),
            stderr_rx: Some(stderr_rx),
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    fn stdin(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send) {
        &mut self.writer
    }

    fn take_stdout(&mut self) -> Box<dyn AsyncRead + Unpin + Send> {
        let rx = self.stdout_rx.take().expect("stdout already taken");
        Box::new(ChannelReader::with_miss_flag(rx, self.shared.miss.clone()))
    }

    fn take_stderr(&mut self) -> Box<dyn AsyncRead + Unpin + Send> {
        let rx = self.stderr_rx.take().expect("stderr already taken");
        Box::new(ChannelReader::with_miss_flag(rx, self.shared.miss.clone()))
    }

    fn pid(&self) -> i32 {
        0
    }

    async fn close(&mut self) -> Result<(), ShellError> {
        self.closed = true;
        self.shared.stdout_tx.lock().expect("mutex poisoned").take();
        self.shared.stderr_tx.lock().expect("mutex poisoned").take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn matched_fixture_emits_output_and_status() {
        let mut transport = ReplayTransport::new(vec![ReplayFixture::new("echo hi", "hi", 0)]);
        let mut stdout = transport.take_stdout();
        transport
            .stdin()
            .write_all(b"echo hi\necho 'status:'$?\n")
            .await
            .unwrap();

        let mut buf = [0u8; 256];
        use tokio::io::AsyncReadExt;
        let n = stdout.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert_eq!(text, "hi\nstatus:0\n");
    }

    #[tokio::test]
    async fn unmatched_fixture_surfaces_not_found() {
        let mut transport = ReplayTransport::new(vec![]);
        let mut stdout = transport.take_stdout();
        transport
            .stdin()
            .write_all(b"nope\necho 'status:'$?\n")
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        use tokio::io::AsyncReadExt;
        let err = stdout.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
