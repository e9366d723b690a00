//! Error taxonomy surfaced to callers of [`crate::session::Session::run`].
//!
//! Mirrors the kinds in the design doc: transport/write/read failures are
//! fatal for the pipeline that produced them, timeout and cancellation are
//! non-fatal outcomes, and `ShellStderr` rides alongside output rather than
//! replacing it.

/// Errors produced by the shell pipeline, transports, and session layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShellError {
    /// Spawning the local shell, dialing the remote host, or allocating a
    /// PTY failed. Fatal for the owning [`crate::session::Session`].
    #[error("transport initialization failed: {0}")]
    TransportInit(String),

    /// Writing the framed command (or raw bytes via `Send`) to the
    /// transport's stdin failed. Fatal for the owning pipeline.
    #[error("stdin write failed: {0}")]
    WriteFailure(String),

    /// A pump task hit a terminal read error on stdout or stderr. The
    /// pipeline closes; later calls return this error from the stored slot.
    #[error("stdout/stderr read failed: {0}")]
    ReadFailure(String),

    /// The read loop's `waitMs` reached `timeoutMs` before a terminator or
    /// status sentinel was observed. Non-fatal: the caller may retry.
    #[error("command timed out")]
    Timeout,

    /// The caller's cancellation token fired while a command was in flight.
    #[error("command cancelled")]
    Cancelled,

    /// The command produced stderr text. Carried as an error *and* folded
    /// into the caller-visible output so the caller can decide what to do.
    #[error("command wrote to stderr: {0}")]
    ShellStderr(String),

    /// A replay transport had no fixture matching the written stdin.
    #[error("no replay fixture matched input")]
    ReplayMiss,
}
