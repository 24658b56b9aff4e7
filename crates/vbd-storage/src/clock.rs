//! Time sources for latency measurement and the compensating active wait.
//!
//! The transfer engine never sleeps: it polls [`Clock::now`] and calls [`Clock::pause`] between
//! polls until the target deadline passes. Production code uses [`MonotonicClock`]; tests drive a
//! [`ManualClock`] whose `pause` advances virtual time, so a wait of any length completes without
//! consuming wall-clock time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source used by [`crate::LatencyDevice`].
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed epoch.
    fn now(&self) -> Duration;

    /// One poll step of the active wait.
    ///
    /// Must not yield to the scheduler.
    fn pause(&self) {
        std::hint::spin_loop();
    }
}

/// Polls `clock` until `deadline` has been reached.
pub fn busy_wait_until<C: Clock + ?Sized>(clock: &C, deadline: Duration) -> Duration {
    loop {
        let now = clock.now();
        if now >= deadline {
            return now;
        }
        clock.pause();
    }
}

/// Host monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

#[derive(Debug, Default)]
struct ManualClockState {
    now_ns: AtomicU64,
    auto_advance_ns: AtomicU64,
    pause_step_ns: AtomicU64,
}

/// Deterministic clock for tests.
///
/// Clones share the same time, so a test can keep one handle and give another to the device.
///
/// - [`ManualClock::set_auto_advance`] moves time forward after every `now()` read, which models
///   the cost of the work done between two reads (e.g. the memory copy).
/// - [`ManualClock::set_pause_step`] sets the granularity of the active wait; it must be non-zero
///   if the device will ever wait, otherwise the wait never completes.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<ManualClockState>,
}

impl ManualClock {
    /// A clock at time zero whose active wait advances in 1 µs steps.
    pub fn new() -> Self {
        let clock = Self {
            state: Arc::new(ManualClockState::default()),
        };
        clock.set_pause_step(Duration::from_micros(1));
        clock
    }

    pub fn advance(&self, d: Duration) {
        self.state
            .now_ns
            .fetch_add(duration_as_ns(d), Ordering::SeqCst);
    }

    pub fn set(&self, now: Duration) {
        self.state
            .now_ns
            .store(duration_as_ns(now), Ordering::SeqCst);
    }

    pub fn set_auto_advance(&self, step: Duration) {
        self.state
            .auto_advance_ns
            .store(duration_as_ns(step), Ordering::SeqCst);
    }

    pub fn set_pause_step(&self, step: Duration) {
        self.state
            .pause_step_ns
            .store(duration_as_ns(step), Ordering::SeqCst);
    }

    /// Current time without triggering auto-advance.
    pub fn peek(&self) -> Duration {
        Duration::from_nanos(self.state.now_ns.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let step = self.state.auto_advance_ns.load(Ordering::SeqCst);
        Duration::from_nanos(self.state.now_ns.fetch_add(step, Ordering::SeqCst))
    }

    fn pause(&self) {
        let step = self.state.pause_step_ns.load(Ordering::SeqCst);
        self.state.now_ns.fetch_add(step, Ordering::SeqCst);
    }
}

fn duration_as_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
