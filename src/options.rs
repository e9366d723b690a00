//! Session configuration: partial `Options` overlaid onto resolved
//! `EffectiveOptions`, terminator parsing, and the listener/history types
//! that ride along in the options struct.

use crate::command::History;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;
pub(crate) const DEFAULT_TERM: &str = "xterm";
pub(crate) const DEFAULT_COLS: u16 = 100;
pub(crate) const DEFAULT_ROWS: u16 = 100;

#[cfg(unix)]
pub(crate) const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(windows)]
pub(crate) const DEFAULT_SHELL: &str = "cmd.exe";

/// Streaming sink: `listener(chunk, has_more)`. Exactly one terminating
/// call with `("", false)` is made per `Run`.
pub type Listener = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Where a [`Terminator`] pattern is anchored within cleaned output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `^pfx` -- matches a prefix.
    Prefix,
    /// `sfx$` -- matches a suffix.
    Suffix,
    /// Plain `needle` -- matches anywhere (`contains`).
    Contains,
}

/// A single end-of-stream pattern used when no status sentinel is emitted
/// (pipelined/interactive mode).
#[derive(Debug, Clone)]
pub struct Terminator {
    pattern: String,
    anchor: Anchor,
}

impl Terminator {
    /// Parse `^pfx`, `sfx$`, or a bare `needle` into an anchored pattern.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        if let Some(rest) = spec.strip_prefix('^') {
            Terminator {
                pattern: rest.to_string(),
                anchor: Anchor::Prefix,
            }
        } else if let Some(rest) = spec.strip_suffix('$') {
            Terminator {
                pattern: rest.to_string(),
                anchor: Anchor::Suffix,
            }
        } else {
            Terminator {
                pattern: spec.to_string(),
                anchor: Anchor::Contains,
            }
        }
    }

    /// Test `cleaned` (already passed through [`crate::clean::clean`]).
    #[must_use]
    pub fn matches(&self, cleaned: &str) -> bool {
        if self.pattern.is_empty() {
            return false;
        }
        match self.anchor {
            Anchor::Prefix => cleaned.starts_with(self.pattern.as_str()),
            Anchor::Suffix => cleaned.ends_with(self.pattern.as_str()),
            Anchor::Contains => cleaned.contains(self.pattern.as_str()),
        }
    }
}

/// Partial, user-facing configuration. Every field is optional; unset
/// fields fall back to the session default (for session construction) or
/// to the session's current effective value (for a per-call overlay).
#[derive(Clone, Default)]
pub struct Options {
    pub shell: Option<String>,
    pub shell_prompt: Option<String>,
    pub term: Option<String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub cwd: Option<String>,
    pub env: Option<HashMap<String, String>>,
    pub system_paths: Option<Vec<String>>,
    pub timeout_ms: Option<u64>,
    pub buffer_size: Option<usize>,
    pub terminators: Option<Vec<String>>,
    pub listener: Option<Listener>,
    pub flash_interval_ms: Option<u64>,
    pub history: Option<Arc<History>>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("shell", &self.shell)
            .field("shell_prompt", &self.shell_prompt)
            .field("term", &self.term)
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("system_paths", &self.system_paths)
            .field("timeout_ms", &self.timeout_ms)
            .field("buffer_size", &self.buffer_size)
            .field("terminators", &self.terminators)
            .field("listener", &self.listener.as_ref().map(|_| "<fn>"))
            .field("flash_interval_ms", &self.flash_interval_ms)
            .field("history", &self.history.is_some())
            .finish()
    }
}

/// Fully resolved configuration consumed by the pipeline and transports.
/// Every field is concrete; produced exclusively via [`Options::resolve`]
/// or [`EffectiveOptions::overlay`], both of which are pure functions.
#[derive(Clone)]
pub struct EffectiveOptions {
    pub shell: String,
    pub shell_prompt: String,
    pub escaped_shell_prompt: String,
    pub term: String,
    pub cols: u16,
    pub rows: u16,
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
    pub system_paths: Vec<String>,
    pub timeout_ms: u64,
    pub buffer_size: usize,
    pub terminators: Vec<Terminator>,
    pub listener: Option<Listener>,
    pub flash_interval_ms: u64,
    pub history: Option<Arc<History>>,
}

impl Options {
    /// Resolve a session-level `Options` against built-in defaults.
    #[must_use]
    pub fn resolve(&self) -> EffectiveOptions {
        let shell_prompt = self.shell_prompt.clone().unwrap_or_default();
        let escaped_shell_prompt = crate::clean::clean(&shell_prompt);
        EffectiveOptions {
            shell: self.shell.clone().unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            shell_prompt,
            escaped_shell_prompt,
            term: self.term.clone().unwrap_or_else(|| DEFAULT_TERM.to_string()),
            cols: self.cols.unwrap_or(DEFAULT_COLS),
            rows: self.rows.unwrap_or(DEFAULT_ROWS),
            cwd: self.cwd.clone(),
            env: self.env.clone().unwrap_or_default(),
            system_paths: self.system_paths.clone().unwrap_or_default(),
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            terminators: self
                .terminators
                .clone()
                .unwrap_or_default()
                .iter()
                .map(|s| Terminator::parse(s))
                .collect(),
            listener: self.listener.clone(),
            flash_interval_ms: self.flash_interval_ms.unwrap_or(0),
            history: self.history.clone(),
        }
    }
}

impl EffectiveOptions {
    /// Overlay a per-call `Options` patch onto `self`, returning a new
    /// value. Never mutates `self` -- the base stays the session default.
    #[must_use]
    pub fn overlay(&self, patch: &Options) -> EffectiveOptions {
        let mut out = self.clone();
        if let Some(v) = &patch.shell {
            out.shell = v.clone();
        }
        if let Some(v) = &patch.shell_prompt {
            out.shell_prompt = v.clone();
            out.escaped_shell_prompt = crate::clean::clean(v);
        }
        if let Some(v) = &patch.term {
            out.term = v.clone();
        }
        if let Some(v) = patch.cols {
            out.cols = v;
        }
        if let Some(v) = patch.rows {
            out.rows = v;
        }
        if let Some(v) = &patch.cwd {
            out.cwd = Some(v.clone());
        }
        if let Some(v) = &patch.env {
            out.env = v.clone();
        }
        if let Some(v) = &patch.system_paths {
            out.system_paths = v.clone();
        }
        if let Some(v) = patch.timeout_ms {
            out.timeout_ms = v;
        }
        if let Some(v) = patch.buffer_size {
            out.buffer_size = v;
        }
        if let Some(v) = &patch.terminators {
            out.terminators = v.iter().map(|s| Terminator::parse(s)).collect();
        }
        if let Some(v) = &patch.listener {
            out.listener = Some(v.clone());
        }
        if let Some(v) = patch.flash_interval_ms {
            out.flash_interval_ms = v;
        }
        if let Some(v) = &patch.history {
            out.history = Some(v.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_prefix_suffix_contains() {
        let p = Terminator::parse("^boot");
        assert!(p.matches("booting up"));
        assert!(!p.matches("not booting"));

        let s = Terminator::parse("ready$");
        assert!(s.matches("server is ready"));
        assert!(!s.matches("ready and waiting"));

        let c = Terminator::parse("needle");
        assert!(c.matches("a needle in haystack"));
    }

    #[test]
    fn overlay_does_not_mutate_base() {
        let base = Options {
            timeout_ms: Some(1000),
            ..Default::default()
        }
        .resolve();
        let patch = Options {
            timeout_ms: Some(5000),
            ..Default::default()
        };
        let overlaid = base.overlay(&patch);
        assert_eq!(base.timeout_ms, 1000);
        assert_eq!(overlaid.timeout_ms, 5000);
    }

    #[test]
    fn resolve_applies_defaults() {
        let opts = Options::default().resolve();
        assert_eq!(opts.shell, DEFAULT_SHELL);
        assert_eq!(opts.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(opts.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(opts.term, DEFAULT_TERM);
        assert_eq!(opts.cols, DEFAULT_COLS);
        assert_eq!(opts.rows, DEFAULT_ROWS);
        assert!(opts.shell_prompt.is_empty());
    }
}
