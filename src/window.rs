//! Time-bucketed buffering of incremental output for a streaming listener.
//!
//! A `Window` is created fresh for each `Read` call and must flush on every
//! exit path -- success, error, or timeout. That invariant is expressed as
//! RAII here rather than as a Go-style `defer`: dropping a `Window` flushes
//! it exactly once.

use crate::options::EffectiveOptions;
use std::time::Instant;

pub struct Window<'a> {
    checkpoint: Instant,
    elapsed_ms: u64,
    buffer: String,
    options: &'a EffectiveOptions,
    flushed: bool,
}

impl<'a> Window<'a> {
    #[must_use]
    pub fn new(options: &'a EffectiveOptions) -> Self {
        Window {
            checkpoint: Instant::now(),
            elapsed_ms: 0,
            buffer: String::new(),
            options,
            flushed: false,
        }
    }

    /// Append `chunk` to the pending buffer and flush to the listener once
    /// `flash_interval_ms` has elapsed since the last flush (or immediately
    /// when `flash_interval_ms == 0`).
    pub fn notify(&mut self, chunk: &str) {
        let Some(listener) = &self.options.listener else {
            return;
        };
        if chunk.is_empty() && self.buffer.is_empty() {
            return;
        }
        self.buffer.push_str(chunk);
        let now = Instant::now();
        self.elapsed_ms += now.duration_since(self.checkpoint).as_millis() as u64;
        self.checkpoint = now;

        if self.elapsed_ms > self.options.flash_interval_ms || self.options.flash_interval_ms == 0 {
            listener(&self.buffer, true);
            self.buffer.clear();
            self.elapsed_ms = 0;
        }
    }

    /// Emit any remaining buffered output, then the terminating
    /// `("", false)` sentinel. Safe to call multiple times -- only the
    /// first call has an effect.
    pub fn flush(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        let Some(listener) = &self.options.listener else {
            return;
        };
        if !self.buffer.is_empty() {
            listener(&self.buffer, true);
            self.buffer.clear();
        }
        listener("", false);
    }
}

impl Drop for Window<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use std::sync::{Arc, Mutex};

    fn recording_options(flash_interval_ms: u64) -> (EffectiveOptions, Arc<Mutex<Vec<(String, bool)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let opts = Options {
            flash_interval_ms: Some(flash_interval_ms),
            listener: Some(Arc::new(move |chunk: &str, has_more: bool| {
                calls_clone.lock().unwrap().push((chunk.to_string(), has_more));
            })),
            ..Default::default()
        }
        .resolve();
        (opts, calls)
    }

    #[test]
    fn flush_emits_terminating_sentinel_exactly_once() {
        let (opts, calls) = recording_options(0);
        {
            let mut window = Window::new(&opts);
            window.notify("hello");
        }
        let calls = calls.lock().unwrap();
        let terminators: Vec<_> = calls.iter().filter(|(_, has_more)| !has_more).collect();
        assert_eq!(terminators.len(), 1);
        assert_eq!(calls.last().unwrap(), &("".to_string(), false));
    }

    #[test]
    fn zero_flash_interval_notifies_every_chunk() {
        let (opts, calls) = recording_options(0);
        let mut window = Window::new(&opts);
        window.notify("a");
        window.notify("b");
        window.flush();
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], ("a".to_string(), true));
        assert_eq!(calls[1], ("b".to_string(), true));
        assert_eq!(calls[2], ("".to_string(), false));
    }

    #[test]
    fn drop_without_explicit_flush_still_flushes() {
        let (opts, calls) = recording_options(0);
        drop(Window::new(&opts));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.last().unwrap(), &("".to_string(), false));
    }

    #[test]
    fn no_listener_is_a_no_op() {
        let opts = Options::default().resolve();
        let mut window = Window::new(&opts);
        window.notify("whatever");
        window.flush();
    }
}
