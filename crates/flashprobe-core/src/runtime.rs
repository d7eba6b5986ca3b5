//! Scoped acquisition: the process-wide `Runtime` context.
//!
//! Global mutable state that would otherwise be scattered across statics
//! (the controller's register-bar pointer, the current opcode table, the
//! shutdown stack, ...) is instead collected into a single context created
//! at programmer init and destroyed at shutdown, with operations taking a
//! reference to it. This module provides that context's `no_std`-safe
//! pieces: a cooperative big-lock handle, a fixed-capacity shutdown-callback
//! stack, a parallel chip-state-restore stack, and one-shot delay
//! calibration.
//!
//! The OS-level piece of the big lock (an actual cross-process advisory
//! file lock) is necessarily platform code and lives in
//! `flashprobe-internal`; [`BigLockGuard`] here is the portable contract a
//! concrete implementation satisfies, checked purely in terms of acquire/
//! release ordering so the shutdown sequencing is unit-testable without an
//! OS.

use crate::error::{Error, Result};

/// Maximum number of registered shutdown callbacks. The source's stack is
/// unbounded in practice but never holds more than a handful of entries
/// (lock release, each mapped region, the logfile, the EC WP-restore hook);
/// a generous fixed capacity avoids allocation without risking overflow.
pub const MAX_SHUTDOWN_CALLBACKS: usize = 16;

/// Maximum number of registered chip-state restore callbacks (e.g.
/// re-enabling write protection before the shutdown stack runs).
pub const MAX_RESTORE_CALLBACKS: usize = 8;

/// A handle proving the process-wide big lock is held. Concrete
/// implementations (an OS file lock, a test double) construct this only
/// after successfully acquiring the lock and release it in their `Drop`.
pub trait BigLockGuard {
    /// Whether the lock is still held (always `true` for a live guard;
    /// exists so callers can assert on it in tests without unsafe tricks).
    fn is_held(&self) -> bool {
        true
    }
}

/// A registered shutdown or restore callback. Stored as a plain function
/// pointer (no closures, no allocation) matching the source's C-callback
/// shape and this crate's `no_std` constraint.
pub type Callback = fn();

/// A fixed-capacity, LIFO stack of callbacks, walked in reverse
/// registration order on normal or error exit — shared shape for both the
/// shutdown stack and the chip-restore stack.
#[derive(Debug, Clone, Copy)]
pub struct CallbackStack<const N: usize> {
    entries: [Option<Callback>; N],
    len: usize,
    /// Set once shutdown has begun; further `push` calls are rejected to
    /// prevent re-entrant registration from a callback that is itself
    /// running during shutdown.
    running: bool,
}

impl<const N: usize> CallbackStack<N> {
    /// An empty stack.
    pub const fn new() -> Self {
        Self {
            entries: [None; N],
            len: 0,
            running: false,
        }
    }

    /// Register a callback. Illegal (returns `Err(Error::Misconfiguration)`)
    /// once shutdown has started, or if the stack is already full.
    pub fn push(&mut self, callback: Callback) -> Result<()> {
        if self.running {
            return Err(Error::Misconfiguration);
        }
        if self.len >= N {
            return Err(Error::OutOfMemory);
        }
        self.entries[self.len] = Some(callback);
        self.len += 1;
        Ok(())
    }

    /// Number of callbacks currently registered.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the stack has no registered callbacks.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Run every registered callback in reverse registration order, then
    /// clear the stack. Idempotent: calling this again after it has already
    /// drained is a no-op rather than an error, matching "both normal and
    /// error exit paths call this" usage.
    pub fn run_all(&mut self) {
        self.running = true;
        while self.len > 0 {
            self.len -= 1;
            if let Some(cb) = self.entries[self.len].take() {
                cb();
            }
        }
    }
}

impl<const N: usize> Default for CallbackStack<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide scoped-acquisition context: the big lock's acquisition
/// state, the shutdown stack, and the chip-restore stack, created at
/// `programmer_init` and torn down at `programmer_shutdown`.
///
/// `Runtime` itself does not own the OS lock (that would tie this `no_std`
/// core crate to an OS); it owns the two callback stacks and records
/// whether a lock guard has been installed, so operations can assert they
/// are only ever called while the lock is held.
pub struct Runtime {
    lock_held: bool,
    shutdown: CallbackStack<MAX_SHUTDOWN_CALLBACKS>,
    restore: CallbackStack<MAX_RESTORE_CALLBACKS>,
}

impl Runtime {
    /// Create a fresh, not-yet-locked runtime.
    pub const fn new() -> Self {
        Self {
            lock_held: false,
            shutdown: CallbackStack::new(),
            restore: CallbackStack::new(),
        }
    }

    /// Record that the big lock has been acquired by a concrete
    /// [`BigLockGuard`]. Must be called before any hardware touch.
    pub fn mark_lock_acquired(&mut self) {
        self.lock_held = true;
    }

    /// Whether the big lock is currently recorded as held.
    pub fn lock_held(&self) -> bool {
        self.lock_held
    }

    /// Register a shutdown callback. Illegal before the lock is held
    /// (mirrors "illegal before master init") and illegal during shutdown
    /// itself (enforced by [`CallbackStack::push`]).
    pub fn register_shutdown(&mut self, callback: Callback) -> Result<()> {
        if !self.lock_held {
            return Err(Error::Misconfiguration);
        }
        self.shutdown.push(callback)
    }

    /// Register a chip-state restore callback (e.g. re-enable WP).
    pub fn register_restore(&mut self, callback: Callback) -> Result<()> {
        if !self.lock_held {
            return Err(Error::Misconfiguration);
        }
        self.restore.push(callback)
    }

    /// Run restore callbacks, then shutdown callbacks, in that order, then
    /// mark the lock released. Safe to call on any exit path, including
    /// error paths, and safe to call more than once.
    pub fn shutdown(&mut self) {
        self.restore.run_all();
        self.shutdown.run_all();
        self.lock_held = false;
    }

    /// Number of pending shutdown callbacks (diagnostics/tests).
    pub fn shutdown_len(&self) -> usize {
        self.shutdown.len()
    }

    /// Number of pending restore callbacks (diagnostics/tests).
    pub fn restore_len(&self) -> usize {
        self.restore.len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// A calibrated delay strategy, chosen once at process init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayStrategy {
    /// The OS's monotonic sleep primitive is trustworthy; use a precise
    /// sleep for microsecond delays.
    PreciseSleep,
    /// The OS timer was observed to be broken (returned a implausible
    /// elapsed time for a calibration delay); fall back to a busy-loop
    /// calibrated against a known-good cycle count.
    BusyLoop {
        /// Number of busy-loop iterations measured to take ~1 microsecond.
        iterations_per_us: u32,
    },
}

/// One-shot self-measuring delay calibration.
///
/// `measure_us` is given a requested delay in microseconds and returns the
/// elapsed microseconds actually observed (via whatever OS timer is
/// available); `busy_iterations` runs `count` iterations of a trivial
/// busy-loop body and returns elapsed microseconds for *that*, used only if
/// the OS timer looks broken. A sleep is considered broken if it reports
/// having taken less than half the requested duration (the OS timer
/// returned something implausible, e.g. a stuck/non-monotonic clock) —
/// this is a one-shot decision and is never re-evaluated at runtime.
pub fn calibrate_delay(
    request_us: u32,
    measure_us: impl FnOnce(u32) -> u32,
    busy_iterations: impl FnOnce(u32) -> u32,
) -> DelayStrategy {
    let observed = measure_us(request_us);
    if observed * 2 >= request_us {
        return DelayStrategy::PreciseSleep;
    }

    // The sleep was suspiciously fast; fall back to a calibrated busy-loop.
    const PROBE_ITERATIONS: u32 = 100_000;
    let busy_us = busy_iterations(PROBE_ITERATIONS).max(1);
    let iterations_per_us = (PROBE_ITERATIONS / busy_us).max(1);
    DelayStrategy::BusyLoop { iterations_per_us }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn bump() {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn shutdown_runs_in_reverse_order() {
        static ORDER: AtomicU32 = AtomicU32::new(0);
        static FIRST_SEEN: AtomicU32 = AtomicU32::new(0);
        static SECOND_SEEN: AtomicU32 = AtomicU32::new(0);

        fn cb_a() {
            ORDER.fetch_add(1, Ordering::SeqCst);
            FIRST_SEEN.store(ORDER.load(Ordering::SeqCst), Ordering::SeqCst);
        }
        fn cb_b() {
            ORDER.fetch_add(1, Ordering::SeqCst);
            SECOND_SEEN.store(ORDER.load(Ordering::SeqCst), Ordering::SeqCst);
        }

        let mut rt = Runtime::new();
        rt.mark_lock_acquired();
        rt.register_shutdown(cb_a).unwrap();
        rt.register_shutdown(cb_b).unwrap();
        rt.shutdown();

        // cb_b was registered last, so it must run first (reverse order).
        assert!(SECOND_SEEN.load(Ordering::SeqCst) < FIRST_SEEN.load(Ordering::SeqCst));
    }

    #[test]
    fn register_before_lock_is_rejected() {
        let mut rt = Runtime::new();
        assert_eq!(rt.register_shutdown(bump), Err(Error::Misconfiguration));
    }

    #[test]
    fn register_during_shutdown_is_rejected() {
        fn reentrant_register() {
            // Can't easily get back a live &mut Runtime here without
            // unsafe statics; this test instead checks the `running` flag
            // contract directly via CallbackStack.
        }
        let mut stack: CallbackStack<4> = CallbackStack::new();
        stack.push(reentrant_register).unwrap();
        stack.run_all();
        assert_eq!(stack.push(bump), Err(Error::Misconfiguration));
    }

    #[test]
    fn stack_overflow_is_reported_not_panicked() {
        let mut stack: CallbackStack<2> = CallbackStack::new();
        stack.push(bump).unwrap();
        stack.push(bump).unwrap();
        assert_eq!(stack.push(bump), Err(Error::OutOfMemory));
    }

    #[test]
    fn restore_callbacks_run_before_shutdown_callbacks() {
        static RESTORE_AT: AtomicU32 = AtomicU32::new(0);
        static SHUTDOWN_AT: AtomicU32 = AtomicU32::new(0);
        static TICK: AtomicU32 = AtomicU32::new(0);

        fn restore_cb() {
            TICK.fetch_add(1, Ordering::SeqCst);
            RESTORE_AT.store(TICK.load(Ordering::SeqCst), Ordering::SeqCst);
        }
        fn shutdown_cb() {
            TICK.fetch_add(1, Ordering::SeqCst);
            SHUTDOWN_AT.store(TICK.load(Ordering::SeqCst), Ordering::SeqCst);
        }

        let mut rt = Runtime::new();
        rt.mark_lock_acquired();
        rt.register_shutdown(shutdown_cb).unwrap();
        rt.register_restore(restore_cb).unwrap();
        rt.shutdown();

        assert!(RESTORE_AT.load(Ordering::SeqCst) < SHUTDOWN_AT.load(Ordering::SeqCst));
    }

    #[test]
    fn healthy_timer_chooses_precise_sleep() {
        let strategy = calibrate_delay(1000, |req| req, |_| 1);
        assert_eq!(strategy, DelayStrategy::PreciseSleep);
    }

    #[test]
    fn broken_timer_falls_back_to_busy_loop() {
        // measure_us reports 0 elapsed for a 1000us request: timer looks broken.
        let strategy = calibrate_delay(1000, |_| 0, |_| 50);
        match strategy {
            DelayStrategy::BusyLoop { iterations_per_us } => {
                assert!(iterations_per_us > 0);
            }
            DelayStrategy::PreciseSleep => panic!("expected busy-loop fallback"),
        }
    }
}
