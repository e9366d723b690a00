//! The `Transport` capability: whatever owns the shell subprocess or SSH
//! session and exposes its stdin/stdout/stderr as plain byte streams.
//!
//! The pipeline and session layers are written entirely against this
//! trait; they do not know or care whether the bytes on the other end
//! came from a forked `/bin/sh`, an SSH PTY, or a replay fixture.

pub(crate) mod bridge;
pub mod local;
pub mod replay;
pub mod ssh;

use crate::error::ShellError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Capability consumed by [`crate::pipeline::Pipeline`] and
/// [`crate::session::Session`]. Implementors own the underlying process or
/// connection and must make `close` safe to call more than once.
#[async_trait]
pub trait Transport: Send {
    /// Write-only access to the transport's stdin. Ownership of this
    /// writer is expected to live with the caller (the `Session`'s single
    /// writer path) for the lifetime of the transport.
    fn stdin(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send);

    /// Take ownership of the stdout byte source. Must be called exactly
    /// once per transport instance, before the pipeline's pumps start.
    fn take_stdout(&mut self) -> Box<dyn AsyncRead + Unpin + Send>;

    /// Take ownership of the stderr byte source. Must be called exactly
    /// once per transport instance, before the pipeline's pumps start.
    fn take_stderr(&mut self) -> Box<dyn AsyncRead + Unpin + Send>;

    /// The underlying process/session id, or `0` if unknown.
    fn pid(&self) -> i32;

    /// Idempotent teardown: terminate the underlying process/connection.
    async fn close(&mut self) -> Result<(), ShellError>;
}
