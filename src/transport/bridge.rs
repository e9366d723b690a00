//! `mpsc`-channel-backed `AsyncRead`/`AsyncWrite` adapters shared by the SSH
//! and replay transports, which both speak to their backing store (a
//! remote shell session, a fixture list) through plain byte channels
//! rather than a file descriptor.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// Forwards writes onto a bounded sender, for transports (like `execute_io`'s
/// stdin channel) whose receiver requires real backpressure. Wraps a
/// [`PollSender`] so a full channel properly parks the task instead of
/// busy-polling.
pub(crate) struct BoundedChannelWriter(PollSender<Vec<u8>>);

impl BoundedChannelWriter {
    pub(crate) fn new(sender: mpsc::Sender<Vec<u8>>) -> Self {
        BoundedChannelWriter(PollSender::new(sender))
    }
}

impl AsyncWrite for BoundedChannelWriter {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.0.poll_reserve(cx) {
            Poll::Ready(Ok(())) => match self.0.send_item(buf.to_vec()) {
                Ok(()) => Poll::Ready(Ok(buf.len())),
                Err(_) => Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"))),
            },
            Poll::Ready(Err(_)) => Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Reads byte runs off an unbounded receiver. When the channel closes, the
/// reader normally reports a clean EOF; if `not_found_on_close` is set and
/// true at close time, it reports an `ErrorKind::NotFound` error instead --
/// the signal the pipeline's pumps use to recognize a replay miss.
pub(crate) struct ChannelReader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    leftover: Vec<u8>,
    not_found_on_close: Option<Arc<AtomicBool>>,
}

impl ChannelReader {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        ChannelReader {
            rx,
            leftover: Vec::new(),
            not_found_on_close: None,
        }
    }

    pub(crate) fn with_miss_flag(rx: mpsc::UnboundedReceiver<Vec<u8>>, flag: Arc<AtomicBool>) -> Self {
        ChannelReader {
            rx,
            leftover: Vec::new(),
            not_found_on_close: Some(flag),
        }
    }
}

impl AsyncRead for ChannelReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.leftover.is_empty() {
            let n = self.leftover.len().min(buf.remaining());
            buf.put_slice(&self.leftover[..n]);
            self.leftover.drain(..n);
            return Poll::Ready(Ok(()));
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.leftover.extend_from_slice(&chunk[n..]);
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(None) => {
                let missed = self
                    .not_found_on_close
                    .as_ref()
                    .map(|f| f.load(Ordering::SeqCst))
                    .unwrap_or(false);
                if missed {
                    Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no replay fixture matched input",
                    )))
                } else {
                    Poll::Ready(Ok(()))
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
