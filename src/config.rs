//! Configuration for timer construction.

use crate::measurement::ClockBackendKind;

/// Environment variable naming a backend the default registry tries first.
pub const CLOCK_ENV_VAR: &str = "HPCTIMER_CLOCK";

/// Options applied when a [`Timer`](crate::Timer) is created.
///
/// ```
/// use hpctimer::TimerOptions;
///
/// let options = TimerOptions::new().bind_to_cpu(true).busy_wait_iterations(50_000);
/// assert!(options.bind_to_cpu);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerOptions {
    /// Pin the calling thread to its current CPU while the timer lives
    /// (cycle-counter backends only; default: false).
    pub bind_to_cpu: bool,

    /// Back-to-back read pairs averaged into the self-overhead (default: 3).
    pub overhead_samples: usize,

    /// Starting no-op iterations in each frequency calibration window
    /// (default: 10,000).
    ///
    /// The count is doubled until the window spans `min_window_us`.
    pub busy_wait_iterations: u64,

    /// Shortest reference-clock span a calibration window must cover, in
    /// microseconds (default: 1,000). 0 disables window growth.
    ///
    /// At 1 ms the reference clock's 1 us resolution is 0.1% of the window.
    pub min_window_us: u64,

    /// Calibration windows taken; the widest one is used (default: 3).
    pub calibration_rounds: usize,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            bind_to_cpu: false,
            overhead_samples: 3,
            busy_wait_iterations: 10_000,
            min_window_us: 1_000,
            calibration_rounds: 3,
        }
    }
}

impl TimerOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request CPU pinning for cycle-counter timers.
    pub fn bind_to_cpu(mut self, bind: bool) -> Self {
        self.bind_to_cpu = bind;
        self
    }

    /// Set the number of read pairs used for overhead estimation.
    ///
    /// # Panics
    ///
    /// Panics if `samples` is 0.
    pub fn overhead_samples(mut self, samples: usize) -> Self {
        assert!(samples > 0, "overhead_samples must be > 0");
        self.overhead_samples = samples;
        self
    }

    /// Set the busy-wait length of each calibration window.
    ///
    /// # Panics
    ///
    /// Panics if `iterations` is 0.
    pub fn busy_wait_iterations(mut self, iterations: u64) -> Self {
        assert!(iterations > 0, "busy_wait_iterations must be > 0");
        self.busy_wait_iterations = iterations;
        self
    }

    /// Set the minimum reference span of a calibration window.
    pub fn min_window_us(mut self, micros: u64) -> Self {
        self.min_window_us = micros;
        self
    }

    /// Set how many calibration windows are taken.
    ///
    /// # Panics
    ///
    /// Panics if `rounds` is 0.
    pub fn calibration_rounds(mut self, rounds: usize) -> Self {
        assert!(rounds > 0, "calibration_rounds must be > 0");
        self.calibration_rounds = rounds;
        self
    }
}

/// Which backends may be used.
///
/// [`Capabilities::detect`] reflects what this build and target contain.
/// Clearing a flag makes [`Timer::create_with`](crate::Timer::create_with)
/// reject that backend with
/// [`UnsupportedBackend`](crate::TimerError::UnsupportedBackend), the same
/// way a build without it would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `gettimeofday` (or `SystemTime`) is usable.
    pub wall_clock: bool,
    /// A serialized hardware counter read is compiled in.
    pub cycle_counter: bool,
    /// `clock_gettime(CLOCK_MONOTONIC)` (or `Instant`) is usable.
    pub monotonic_clock: bool,
}

impl Capabilities {
    /// Capabilities of the current build.
    pub fn detect() -> Self {
        Self {
            wall_clock: ClockBackendKind::WallClock.compiled_in(),
            cycle_counter: ClockBackendKind::CycleCounter.compiled_in(),
            monotonic_clock: ClockBackendKind::MonotonicClock.compiled_in(),
        }
    }

    /// Whether `kind` may be used.
    pub fn supports(&self, kind: ClockBackendKind) -> bool {
        match kind {
            ClockBackendKind::WallClock => self.wall_clock,
            ClockBackendKind::CycleCounter => self.cycle_counter,
            ClockBackendKind::MonotonicClock => self.monotonic_clock,
        }
    }

    /// Copy with `kind` disabled.
    pub fn without(mut self, kind: ClockBackendKind) -> Self {
        match kind {
            ClockBackendKind::WallClock => self.wall_clock = false,
            ClockBackendKind::CycleCounter => self.cycle_counter = false,
            ClockBackendKind::MonotonicClock => self.monotonic_clock = false,
        }
        self
    }

    /// Reference clock for frequency calibration: the wall clock, else the
    /// monotonic clock.
    pub fn reference_clock(&self) -> Option<ClockBackendKind> {
        [ClockBackendKind::WallClock, ClockBackendKind::MonotonicClock]
            .into_iter()
            .find(|k| self.supports(*k))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}
