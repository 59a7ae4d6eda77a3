//! Self-overhead estimation and tick-frequency derivation.
//!
//! Two passes run once per timer construction:
//!
//! 1. **Self-overhead**: back-to-back `start = read(); stop = read()` pairs on
//!    the backend being calibrated. The mean of `stop - start`, floored at 0,
//!    is the cost of one measurement in native ticks.
//! 2. **Frequency** (cycle counters only): a busy-wait is bracketed by the
//!    counter and by a microsecond reference clock. The busy-wait doubles
//!    until the reference sees at least `min_window_us`, at most
//!    [`MAX_WINDOW_DOUBLINGS`] times per calibration. Over the widest of
//!    several windows,
//!
//!    ```text
//!    frequency = (counter_delta - overhead_ticks) / reference_delta_us
//!    ```
//!
//!    A zero reference delta means the window was shorter than the reference
//!    clock's resolution and calibration fails.
//!
//! Backends that already count microseconds get `frequency = 1`.

use std::hint::black_box;

use super::backend::{ClockBackendKind, TickSource, TickUnit};
use super::error::{Result, TimerError};
use crate::config::TimerOptions;

/// Microseconds per second.
const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Upper bound on busy-wait doublings across all rounds of one calibration.
///
/// Caps the window at `busy_wait_iterations << 12` when the reference clock
/// never reaches the minimum span.
pub const MAX_WINDOW_DOUBLINGS: u32 = 12;

/// Result of calibrating one backend.
///
/// `Copy + Send + Sync`: safe to hand to other threads for read-only
/// conversion once a timer has been built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// The calibrated backend.
    pub kind: ClockBackendKind,
    /// Estimated cost of two consecutive reads, in native ticks.
    pub overhead_ticks: u64,
    /// Native ticks per microsecond. Always > 0.
    pub frequency: u64,
}

impl Calibration {
    /// Convert native ticks to seconds.
    #[inline]
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 / self.frequency as f64 / MICROS_PER_SEC
    }

    /// Overhead expressed in seconds.
    #[inline]
    pub fn overhead_seconds(&self) -> f64 {
        self.ticks_to_seconds(self.overhead_ticks)
    }

    /// Seconds between two readings, corrected for the self-overhead.
    ///
    /// Deltas smaller than the overhead (or negative) are reported as 0.
    #[inline]
    pub fn interval_seconds(&self, start_ticks: u64, stop_ticks: u64) -> f64 {
        let delta = stop_ticks
            .saturating_sub(start_ticks)
            .saturating_sub(self.overhead_ticks);
        self.ticks_to_seconds(delta)
    }
}

/// Runs the overhead and frequency passes.
#[derive(Debug, Clone)]
pub struct Calibrator {
    overhead_samples: usize,
    busy_wait_iterations: u64,
    min_window_us: u64,
    rounds: usize,
}

impl Calibrator {
    /// Calibrator using the sample counts in `options`.
    pub fn new(options: &TimerOptions) -> Self {
        Self {
            overhead_samples: options.overhead_samples.max(1),
            busy_wait_iterations: options.busy_wait_iterations.max(1),
            min_window_us: options.min_window_us,
            rounds: options.calibration_rounds.max(1),
        }
    }

    /// Calibrate `kind`, cross-referencing `reference` if `kind` counts cycles.
    pub fn calibrate(
        &self,
        kind: ClockBackendKind,
        reference: Option<ClockBackendKind>,
    ) -> Result<Calibration> {
        let overhead_ticks = self.estimate_overhead(&kind);

        let frequency = match kind.unit() {
            TickUnit::Microseconds => 1,
            TickUnit::Cycles => {
                let reference = reference.ok_or_else(|| {
                    TimerError::calibration("no microsecond reference clock available")
                })?;
                self.derive_frequency(&kind, &reference, overhead_ticks)?
            }
        };

        tracing::debug!(
            "Calibrated {}: overhead={} ticks, frequency={} ticks/us",
            kind.name(),
            overhead_ticks,
            frequency
        );

        Ok(Calibration {
            kind,
            overhead_ticks,
            frequency,
        })
    }

    /// Mean of `stop - start` over back-to-back read pairs, floored at 0.
    pub fn estimate_overhead<S: TickSource + ?Sized>(&self, source: &S) -> u64 {
        let mut total: i128 = 0;
        for _ in 0..self.overhead_samples {
            let start = source.read_ticks();
            let stop = source.read_ticks();
            total += stop as i128 - start as i128;
        }

        let mean = total / self.overhead_samples as i128;
        mean.max(0) as u64
    }

    /// Ticks of `counter` per microsecond of `reference`.
    ///
    /// Each round brackets the busy-wait with counter reads on the outside and
    /// reference reads on the inside. A window narrower than `min_window_us`
    /// is retaken with twice the iterations, and the grown count carries into
    /// later rounds. The round with the widest reference window wins; ties go
    /// to the later round.
    pub fn derive_frequency<C, R>(
        &self,
        counter: &C,
        reference: &R,
        overhead_ticks: u64,
    ) -> Result<u64>
    where
        C: TickSource + ?Sized,
        R: TickSource + ?Sized,
    {
        let mut iterations = self.busy_wait_iterations;
        let mut doublings = 0u32;
        let mut best_reference_delta = 0u64;
        let mut best_counter_delta = 0u64;

        for round in 0..self.rounds {
            let (counter_delta, reference_delta) = loop {
                let counter_start = counter.read_ticks();
                let reference_start = reference.read_ticks();

                busy_wait(iterations);

                let reference_stop = reference.read_ticks();
                let counter_stop = counter.read_ticks();

                let reference_delta = reference_stop.saturating_sub(reference_start);
                let counter_delta = counter_stop.saturating_sub(counter_start);

                if reference_delta >= self.min_window_us || doublings >= MAX_WINDOW_DOUBLINGS {
                    break (counter_delta, reference_delta);
                }

                tracing::trace!(
                    "Window of {} iterations spanned {} us; doubling",
                    iterations,
                    reference_delta
                );
                iterations = iterations.saturating_mul(2);
                doublings += 1;
            };

            tracing::trace!(
                "Calibration round {}: {} ticks over {} us",
                round,
                counter_delta,
                reference_delta
            );

            if reference_delta >= best_reference_delta {
                best_reference_delta = reference_delta;
                best_counter_delta = counter_delta;
            }
        }

        if best_reference_delta == 0 {
            return Err(TimerError::calibration(format!(
                "reference clock observed 0 us over {} busy-wait iterations",
                iterations
            )));
        }

        let net_ticks = best_counter_delta.saturating_sub(overhead_ticks);
        // Round to nearest
        let frequency = net_ticks.saturating_add(best_reference_delta / 2) / best_reference_delta;

        if frequency == 0 {
            return Err(TimerError::calibration(format!(
                "counter advanced {} ticks in {} us; frequency rounds to 0",
                net_ticks, best_reference_delta
            )));
        }

        Ok(frequency)
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(&TimerOptions::default())
    }
}

/// Fixed-length loop the optimizer cannot remove.
#[inline(never)]
pub fn busy_wait(iterations: u64) {
    for i in 0..iterations {
        black_box(i);
    }
}
