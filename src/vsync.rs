// Vsync bit published by the render thread and the producer-side pacing wait.
//
// The renderer flips the bit to `Painting` for the duration of each sampling
// pass and back to `Idle` afterwards. Producers read it (lock-free) or wait
// for the next pass boundary with `VsyncSignal::wait_for_vsync`. There is no
// frame queue: a producer that outruns the renderer overwrites frames that
// were never shown, and a slow producer gets its last frame shown again.

use crate::error::{Error, Result};
use crate::types::VsyncState;
use crossbeam::utils::Backoff;
use log::trace;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

/// How a producer waits for the display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingMode {
    /// Busy-poll with backoff. Lowest latency, burns a core.
    Spin,
    /// Sleep on a condition variable until the pass ends.
    #[default]
    Park,
    /// Never wait; frames the renderer misses are dropped.
    Unpaced,
}

#[derive(Debug)]
pub struct VsyncSignal {
    state: AtomicU8,
    passes: AtomicU64,
    closed: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Default for VsyncSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl VsyncSignal {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(VsyncState::Idle as u8),
            passes: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    pub fn get(&self) -> VsyncState {
        VsyncState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of render passes that have finished.
    pub fn passes_completed(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }

    /// Mark the start of a render pass. The returned guard puts the bit
    /// back to `Idle` when dropped, even if the pass panics.
    pub(crate) fn begin_pass(&self) -> PaintingPass<'_> {
        self.state.store(VsyncState::Painting as u8, Ordering::Release);
        trace!("vsync: painting");
        PaintingPass { signal: self }
    }

    fn end_pass(&self) {
        // Count first: whoever sees `Idle` also sees the finished pass.
        self.passes.fetch_add(1, Ordering::AcqRel);
        self.state.store(VsyncState::Idle as u8, Ordering::Release);
        trace!("vsync: idle");
        let _guard = self.lock_waiters();
        self.cond.notify_all();
    }

    /// Wake every waiter with `Error::Closed`; later waits fail immediately.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _guard = self.lock_waiters();
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Block until one render pass has started and finished after this call
    /// (or the pass in flight finishes), so at most one new frame is written
    /// per pass.
    pub fn wait_for_vsync(&self, mode: PacingMode) -> Result<()> {
        let start = self.passes_completed();
        match mode {
            PacingMode::Unpaced => self.check_open(),
            PacingMode::Spin => {
                let backoff = Backoff::new();
                loop {
                    self.check_open()?;
                    if self.passes_completed() != start {
                        return Ok(());
                    }
                    backoff.snooze();
                }
            }
            PacingMode::Park => {
                let mut guard = self.lock_waiters();
                loop {
                    self.check_open()?;
                    if self.passes_completed() != start {
                        return Ok(());
                    }
                    guard = self
                        .cond
                        .wait(guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            }
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() { Err(Error::Closed) } else { Ok(()) }
    }

    fn lock_waiters(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An in-progress render pass; the vsync bit reads `Painting` while it lives.
#[must_use]
pub(crate) struct PaintingPass<'a> {
    signal: &'a VsyncSignal,
}

impl Drop for PaintingPass<'_> {
    fn drop(&mut self) {
        self.signal.end_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_idle_and_toggles_per_pass() {
        let vsync = VsyncSignal::new();
        assert_eq!(vsync.get(), VsyncState::Idle);

        let pass = vsync.begin_pass();
        assert_eq!(vsync.get(), VsyncState::Painting);
        assert_eq!(vsync.passes_completed(), 0);
        drop(pass);

        assert_eq!(vsync.get(), VsyncState::Idle);
        assert_eq!(vsync.passes_completed(), 1);
    }

    fn waits_for_one_pass(mode: PacingMode) {
        let vsync = Arc::new(VsyncSignal::new());
        let waiter = {
            let vsync = vsync.clone();
            thread::spawn(move || vsync.wait_for_vsync(mode))
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!waiter.is_finished(), "returned before any pass ran");

        drop(vsync.begin_pass());
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn park_waits_for_one_pass() {
        waits_for_one_pass(PacingMode::Park);
    }

    #[test]
    fn spin_waits_for_one_pass() {
        waits_for_one_pass(PacingMode::Spin);
    }

    #[test]
    fn unpaced_never_blocks() {
        let vsync = VsyncSignal::new();
        vsync.wait_for_vsync(PacingMode::Unpaced).unwrap();
        assert_eq!(vsync.passes_completed(), 0);
    }

    #[test]
    fn close_wakes_blocked_waiters() {
        let vsync = Arc::new(VsyncSignal::new());
        let waiter = {
            let vsync = vsync.clone();
            thread::spawn(move || vsync.wait_for_vsync(PacingMode::Park))
        };

        thread::sleep(Duration::from_millis(20));
        vsync.close();
        assert!(matches!(waiter.join().unwrap(), Err(Error::Closed)));
        assert!(matches!(
            vsync.wait_for_vsync(PacingMode::Unpaced),
            Err(Error::Closed)
        ));
    }
}
