//! Process-group lifetime tracking.
//!
//! Ported from `internal/proctrack/proctrack_unix.go`: a `SIGCHLD` listener
//! reaps exited children and checks every registered group's liveness with
//! the conventional "signal 0" probe, backed by a per-group polling
//! fallback (250ms doubling to 1s) in case a signal is missed -- common
//! inside some container runtimes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

struct Group {
    done_tx: Option<oneshot::Sender<()>>,
}

/// Tracks local process groups and notifies callers when a group's last
/// member has exited. One `ProcTracker` per process is typical; it owns
/// the background `SIGCHLD` listener task for its lifetime.
pub struct ProcTracker {
    groups: Mutex<HashMap<i32, Group>>,
}

impl ProcTracker {
    /// Spawn the `SIGCHLD` listener (Unix) or leave it a no-op (Windows,
    /// where the polling fallback alone does the work) and return a
    /// tracker ready to register groups.
    #[must_use]
    pub fn spawn() -> Arc<Self> {
        let tracker = Arc::new(ProcTracker {
            groups: Mutex::new(HashMap::new()),
        });
        spawn_sigchld_listener(&tracker);
        tracker
    }

    /// Register `pgid` and return a receiver that resolves once the OS
    /// reports every member of that group has exited.
    pub fn register_group(self: &Arc<Self>, pgid: i32) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        {
            let mut groups = self.groups.lock().expect("proctrack mutex poisoned");
            groups.insert(pgid, Group { done_tx: Some(tx) });
        }
        spawn_poll_fallback(Arc::downgrade(self), pgid);
        rx
    }

    fn finish_group(&self, pgid: i32) {
        let mut groups = self.groups.lock().expect("proctrack mutex poisoned");
        if let Some(mut group) = groups.remove(&pgid) {
            if let Some(tx) = group.done_tx.take() {
                let _ = tx.send(());
            }
        }
    }

    fn is_tracked(&self, pgid: i32) -> bool {
        self.groups.lock().expect("proctrack mutex poisoned").contains_key(&pgid)
    }

    fn tracked_pgids(&self) -> Vec<i32> {
        self.groups.lock().expect("proctrack mutex poisoned").keys().copied().collect()
    }
}

/// `kill(-pgid, 0)` is the conventional liveness probe: it performs no
/// action but still reports `ESRCH` once every process in the group has
/// exited.
#[cfg(unix)]
fn process_group_alive(pgid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(-pgid), None).is_ok()
}

#[cfg(windows)]
fn process_group_alive(_pgid: i32) -> bool {
    false
}

#[cfg(unix)]
fn spawn_sigchld_listener(tracker: &Arc<ProcTracker>) {
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
    use nix::unistd::Pid;

    let tracker = tracker.clone();
    tokio::spawn(async move {
        let mut sigchld = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::child()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGCHLD handler, relying on polling only");
                return;
            }
        };
        loop {
            sigchld.recv().await;
            // Drain exited children (WNOHANG) so zombies don't pile up.
            loop {
                match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                    Ok(WaitStatus::StillAlive) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            for pgid in tracker.tracked_pgids() {
                if !process_group_alive(pgid) {
                    tracker.finish_group(pgid);
                }
            }
        }
    });
}

#[cfg(windows)]
fn spawn_sigchld_listener(_tracker: &Arc<ProcTracker>) {}

/// Safety-net in case a signal was missed: poll a single group's liveness
/// with exponential back-off until it exits or the tracker itself is
/// dropped. Holds only a `Weak` reference so the poll task never keeps a
/// `ProcTracker` alive on its own.
fn spawn_poll_fallback(tracker: Weak<ProcTracker>, pgid: i32) {
    tokio::spawn(async move {
        let mut interval = Duration::from_millis(250);
        let max = Duration::from_secs(1);
        loop {
            tokio::time::sleep(interval).await;
            let Some(tracker) = tracker.upgrade() else { return };
            if !tracker.is_tracked(pgid) {
                return;
            }
            if !process_group_alive(pgid) {
                tracker.finish_group(pgid);
                return;
            }
            if interval < max {
                interval = (interval * 2).min(max);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registering_unknown_pgid_is_tracked() {
        let tracker = ProcTracker::spawn();
        assert!(!tracker.is_tracked(999_999));
        let _rx = tracker.register_group(999_999);
        assert!(tracker.is_tracked(999_999));
    }

    #[tokio::test]
    async fn finishing_a_group_resolves_its_receiver() {
        let tracker = ProcTracker::spawn();
        let rx = tracker.register_group(123_456);
        tracker.finish_group(123_456);
        assert!(rx.await.is_ok());
        assert!(!tracker.is_tracked(123_456));
    }
}
