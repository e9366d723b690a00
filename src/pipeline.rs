//! The framing protocol that turns a raw byte-stream transport into a
//! request/response command runner.
//!
//! Ported from `runner/pipeline.go`. A shell has no in-band way to say
//! "this command's output is done" -- so every command gets a synthetic
//! `echo 'status:'$?` appended, and [`Pipeline::read`] watches the output
//! stream for that sentinel line (or, in prompt/terminator mode, for the
//! shell prompt or a configured terminator pattern) to know when to stop
//! waiting.

use crate::clean::clean;
use crate::error::ShellError;
use crate::options::EffectiveOptions;
use crate::transport::Transport;
use crate::window::Window;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, Barrier};
use tokio_util::sync::CancellationToken;

const TICK_FREQUENCY_MS: u64 = 100;
const DRAIN_TIMEOUT_MS: u64 = 20;

/// Outcome of a single [`Pipeline::read`] call.
pub struct ReadOutcome {
    pub output: String,
    pub has_output: bool,
    pub exit_code: i32,
    pub stderr: Option<String>,
    pub cancelled: bool,
}

/// One synthesized request/response cycle over a [`Transport`]'s byte
/// streams. Owns the reader pump tasks for the lifetime of the
/// transport; `close` tears them down and is safe to call more than once.
pub struct Pipeline {
    options: EffectiveOptions,
    stdout_rx: mpsc::UnboundedReceiver<String>,
    stderr_rx: mpsc::UnboundedReceiver<String>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    error: Arc<Mutex<Option<ShellError>>>,
}

impl Pipeline {
    /// Spawn the stdout/stderr pump tasks and perform the shell-prompt
    /// handshake if `options.shell_prompt` is set. Pumps only start
    /// reading once both have been spawned (the two-party rendezvous from
    /// the upstream `init`, expressed here as a `Barrier`).
    pub async fn new(mut transport: Box<dyn Transport>, options: EffectiveOptions) -> Result<(Self, Box<dyn Transport>), ShellError> {
        let stdout = transport.take_stdout();
        let stderr = transport.take_stderr();

        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        // Three parties rendezvous here: the stdout pump, the stderr pump,
        // and this constructor -- mirroring the upstream `init`'s
        // `sync.WaitGroup(2)` where two goroutines call `Done` and the
        // third (this one) calls `Wait`, except `Barrier` requires every
        // party to call `wait` itself rather than one party only observing.
        let barrier = Arc::new(Barrier::new(3));
        let error = Arc::new(Mutex::new(None));

        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();

        spawn_pump(
            stdout,
            stdout_tx,
            options.buffer_size,
            running.clone(),
            cancel.clone(),
            barrier.clone(),
            error.clone(),
        );
        spawn_pump(
            stderr,
            stderr_tx,
            options.buffer_size,
            running.clone(),
            cancel.clone(),
            barrier.clone(),
            error.clone(),
        );
        barrier.wait().await;

        let mut pipeline = Pipeline {
            options,
            stdout_rx,
            stderr_rx,
            running,
            cancel,
            error,
        };

        if !pipeline.options.shell_prompt.is_empty() {
            pipeline.drain().await;
            let cmd = format!("PS1=\"{}\"\n", pipeline.options.shell_prompt);
            transport
                .stdin()
                .write_all(cmd.as_bytes())
                .await
                .map_err(|e| ShellError::WriteFailure(e.to_string()))?;
            let mut prompt_opts = pipeline.options.clone();
            prompt_opts.timeout_ms = 600;
            let _ = pipeline.read_with(&prompt_opts, &CancellationToken::new()).await;
        }

        Ok((pipeline, transport))
    }

    /// Append the status sentinel to `cmd` the way every run frames a
    /// command before writing it to the transport.
    #[must_use]
    pub fn format_cmd(cmd: &str) -> String {
        let mut framed = cmd.to_string();
        if !framed.ends_with('\n') {
            framed.push('\n');
        }
        framed.push_str("echo 'status:'$?\n");
        framed
    }

    /// Read until the status sentinel, a configured terminator, or the
    /// shell prompt is seen, or `options.timeout_ms` elapses.
    pub async fn read(&mut self) -> ReadOutcome {
        let options = self.options.clone();
        self.read_with(&options, &CancellationToken::new()).await
    }

    /// Read using a specific overlay of options (timeout, terminators, etc.)
    /// instead of the pipeline's session-level defaults, and a caller-owned
    /// `cancel` token for this one call. Used by
    /// [`crate::session::Session::run`] to honor a per-call patch and let a
    /// caller abort a command in flight.
    pub async fn read_with(&mut self, options: &EffectiveOptions, cancel: &CancellationToken) -> ReadOutcome {
        let mut window = Window::new(options);
        let mut out = String::new();
        let mut err_out = String::new();
        let mut status_code: Option<i32> = None;
        let mut has_terminator = false;
        let mut cancelled = false;

        let tick_ms = TICK_FREQUENCY_MS.min(options.timeout_ms.max(1));
        let mut waited_ms: u64 = 0;

        'outer: loop {
            tokio::select! {
                biased;
                maybe_chunk = self.stdout_rx.recv() => {
                    let Some(mut partial) = maybe_chunk else { break 'outer };
                    waited_ms = 0;
                    if let Some(code) = extract_status_code(&mut partial, options) {
                        status_code = Some(code);
                    }
                    out.push_str(&partial);
                    if status_code.is_some() {
                        break 'outer;
                    }

                    has_terminator = has_terminator_match(&out, options);
                    if !partial.is_empty() {
                        if has_terminator {
                            partial = add_line_break_if_needed(&partial);
                        }
                        window.notify(&remove_prompt_if_needed(&partial, options));
                    }
                    if has_terminator || partial.is_empty() {
                        break 'outer;
                    }
                    if let Some(code) = extract_status_code(&mut out, options) {
                        status_code = Some(code);
                    }
                    if (has_terminator || status_code.is_some()) && self.stdout_rx.is_empty() {
                        break 'outer;
                    }
                }
                maybe_err = self.stderr_rx.recv() => {
                    let Some(chunk) = maybe_err else { break 'outer };
                    err_out.push_str(&chunk);
                    window.notify(&remove_prompt_if_needed(&chunk, options));
                    if let Some(code) = extract_status_code(&mut out, options) {
                        status_code = Some(code);
                    }
                    if (has_terminator || status_code.is_some()) && self.stderr_rx.is_empty() {
                        break 'outer;
                    }
                    has_terminator = has_terminator_match(&err_out, options);
                    if has_terminator && self.stderr_rx.is_empty() {
                        break 'outer;
                    }
                }
                () = self.cancel.cancelled() => {
                    break 'outer;
                }
                () = cancel.cancelled() => {
                    cancelled = true;
                    break 'outer;
                }
                () = tokio::time::sleep(std::time::Duration::from_millis(tick_ms)) => {
                    waited_ms += tick_ms;
                    if waited_ms >= options.timeout_ms {
                        break 'outer;
                    }
                }
            }
        }

        let has_output = !out.is_empty();
        if has_output {
            out = remove_prompt_if_needed(&out, options);
        }
        ReadOutcome {
            output: out,
            has_output,
            exit_code: status_code.unwrap_or(0),
            stderr: if err_out.is_empty() { None } else { Some(err_out) },
            cancelled,
        }
    }

    /// Drain any outstanding output with a short fixed timeout, discarding
    /// it. Used between commands and during the prompt handshake.
    pub async fn drain(&mut self) {
        loop {
            let mut drain_opts = self.options.clone();
            drain_opts.timeout_ms = DRAIN_TIMEOUT_MS;
            let outcome = self.read_with(&drain_opts, &CancellationToken::new()).await;
            if !outcome.has_output {
                return;
            }
        }
    }

    #[must_use]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The terminal error a pump task hit, if any. Once set, the pipeline
    /// has closed itself and further `read`s return empty output.
    #[must_use]
    pub fn err(&self) -> Option<ShellError> {
        self.error.lock().expect("pipeline error mutex poisoned").clone()
    }

    /// Idempotent: stop the pump tasks and mark the pipeline not running.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.cancel.cancel();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_pump(
    mut reader: Box<dyn tokio::io::AsyncRead + Unpin + Send>,
    dest: mpsc::UnboundedSender<String>,
    buffer_size: usize,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    barrier: Arc<Barrier>,
    error: Arc<Mutex<Option<ShellError>>>,
) {
    tokio::spawn(async move {
        barrier.wait().await;
        let mut buf = vec![0u8; buffer_size];
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = reader.read(&mut buf) => result,
            };
            match read {
                Ok(0) => return,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).to_string();
                    if dest.send(chunk).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let shell_err = if e.kind() == std::io::ErrorKind::NotFound {
                        ShellError::ReplayMiss
                    } else {
                        ShellError::ReadFailure(e.to_string())
                    };
                    *error.lock().expect("pipeline error mutex poisoned") = Some(shell_err);
                    running.store(false, Ordering::SeqCst);
                    cancel.cancel();
                    return;
                }
            }
        }
    });
}

/// Find the last `\n`-delimited line, and the one before it; if the
/// second-to-last line is `status:<n>`, consume both and return the code.
/// Ported line-for-line from `extractStatusCode`.
fn extract_status_code(out: &mut String, options: &EffectiveOptions) -> Option<i32> {
    let last_nl = out.rfind('\n')?;
    let (candidate_slice, truncate_at) = match out[..last_nl].rfind('\n') {
        Some(prev_nl) => (&out[prev_nl..last_nl], prev_nl),
        None => (&out[..last_nl], 0),
    };
    let mut candidate = clean(candidate_slice).trim().to_string();
    candidate = remove_prompt_if_needed(&candidate, options);
    let rest = candidate.strip_prefix("status:")?;
    let code: i32 = rest.trim().parse().ok()?;
    out.truncate(truncate_at);
    Some(code)
}

fn remove_prompt_if_needed(text: &str, options: &EffectiveOptions) -> String {
    if options.shell_prompt.is_empty() || !text.contains(&options.shell_prompt) {
        return text.to_string();
    }
    let replaced = text.replacen(&options.shell_prompt, "", 1);
    replaced
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_terminator_match(input: &str, options: &EffectiveOptions) -> bool {
    if options.terminators.is_empty() {
        return false;
    }
    let cleaned = clean(input);
    options.terminators.iter().any(|t| t.matches(&cleaned))
}

fn add_line_break_if_needed(text: &str) -> String {
    match text.rfind('\n') {
        None => format!("{text}\n"),
        Some(idx) => {
            if text[idx..].trim().is_empty() {
                text.to_string()
            } else {
                format!("{text}\n")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    #[test]
    fn format_cmd_appends_status_sentinel() {
        assert_eq!(Pipeline::format_cmd("ls"), "ls\necho 'status:'$?\n");
        assert_eq!(Pipeline::format_cmd("ls\n"), "ls\necho 'status:'$?\n");
    }

    #[test]
    fn extract_status_code_consumes_trailing_lines() {
        let opts = Options::default().resolve();
        let mut out = "hello\nstatus:0\n".to_string();
        let code = extract_status_code(&mut out, &opts);
        assert_eq!(code, Some(0));
        assert_eq!(out, "hello");
    }

    #[test]
    fn extract_status_code_absent_is_none() {
        let opts = Options::default().resolve();
        let mut out = "hello\nworld\n".to_string();
        assert_eq!(extract_status_code(&mut out, &opts), None);
    }

    #[test]
    fn remove_prompt_strips_prompt_and_blank_lines() {
        let opts = Options {
            shell_prompt: Some("$ ".to_string()),
            ..Default::default()
        }
        .resolve();
        let cleaned = remove_prompt_if_needed("$ \nhello\n", &opts);
        assert_eq!(cleaned, "hello");
    }

    #[test]
    fn add_line_break_only_when_missing() {
        assert_eq!(add_line_break_if_needed("abc"), "abc\n");
        assert_eq!(add_line_break_if_needed("abc\n"), "abc\n");
    }
}
