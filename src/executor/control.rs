//! Pause/stop signals shared between the controller and the worker

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Intent flags written by the controlling side and polled by the worker.
///
/// Share it behind an `Arc`. Stop is terminal for a run; pause is reversible.
#[derive(Debug, Default)]
pub struct ControlFlags {
    paused: AtomicBool,
    stopped: AtomicBool,
    delete_source_after_copy: AtomicBool,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_delete_source_after_copy(&self, enabled: bool) {
        self.delete_source_after_copy.store(enabled, Ordering::SeqCst);
    }

    pub fn delete_source_after_copy(&self) -> bool {
        self.delete_source_after_copy.load(Ordering::SeqCst)
    }

    /// Clear pause and stop at the start of a run.
    pub fn reset(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Block the calling thread while paused.
    ///
    /// Returns `true` if stop was raised (before or during the wait), `false`
    /// once pause has cleared.
    pub fn wait_while_paused(&self, poll_interval: Duration) -> bool {
        while self.is_paused() && !self.is_stop_requested() {
            thread::sleep(poll_interval);
        }
        self.is_stop_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_flags_default_to_clear() {
        let flags = ControlFlags::new();
        assert!(!flags.is_paused());
        assert!(!flags.is_stop_requested());
        assert!(!flags.delete_source_after_copy());
    }

    #[test]
    fn test_reset_clears_pause_and_stop_only() {
        let flags = ControlFlags::new();
        flags.set_paused(true);
        flags.signal_stop();
        flags.set_delete_source_after_copy(true);

        flags.reset();

        assert!(!flags.is_paused());
        assert!(!flags.is_stop_requested());
        assert!(flags.delete_source_after_copy());
    }

    #[test]
    fn test_wait_returns_immediately_when_not_paused() {
        let flags = ControlFlags::new();
        assert!(!flags.wait_while_paused(Duration::from_secs(10)));
    }

    #[test]
    fn test_wait_unblocks_on_resume() {
        let flags = Arc::new(ControlFlags::new());
        flags.set_paused(true);

        let remote = Arc::clone(&flags);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(40));
            remote.set_paused(false);
        });

        let started = Instant::now();
        let stopped = flags.wait_while_paused(Duration::from_millis(5));
        handle.join().unwrap();

        assert!(!stopped);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_unblocks_on_stop() {
        let flags = Arc::new(ControlFlags::new());
        flags.set_paused(true);

        let remote = Arc::clone(&flags);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.signal_stop();
        });

        assert!(flags.wait_while_paused(Duration::from_millis(5)));
        handle.join().unwrap();
    }
}
