//! The calibrated timer handle.

use std::hint::black_box;

use super::affinity::{AffinityGuard, CpuSnapshot};
use super::backend::{ClockBackendKind, TickUnit};
use super::calibration::{Calibration, Calibrator};
use super::error::{Result, TimerError};
use crate::config::{Capabilities, TimerOptions};

/// A clock backend plus its calibration.
///
/// Built with [`Timer::create`]. The calibration is fixed for the life of the
/// timer. A timer that pinned its thread (`bind_to_cpu` on a cycle-counter
/// backend) restores the prior affinity mask when destroyed or dropped.
///
/// `Timer` is `!Send`: affinity is per-thread, so a pin must be released on
/// the thread that took it. Use [`calibration`](Self::calibration) to share
/// conversion factors with other threads.
///
/// ```
/// use hpctimer::{ClockBackendKind, Timer, TimerOptions};
///
/// let timer = Timer::create(ClockBackendKind::MonotonicClock, &TimerOptions::default()).unwrap();
/// let start = timer.read_ticks();
/// let stop = timer.read_ticks();
/// assert!(timer.interval_seconds(start, stop) >= 0.0);
/// ```
#[derive(Debug)]
pub struct Timer {
    calibration: Calibration,
    affinity: Option<AffinityGuard>,
}

impl Timer {
    /// Build and calibrate a timer for `kind` on the current build.
    ///
    /// # Errors
    ///
    /// - [`TimerError::UnsupportedBackend`] if `kind` is unavailable.
    /// - [`TimerError::CalibrationFailed`] if no usable frequency was measured.
    ///
    /// Failure to pin is not an error; the timer is built unpinned.
    pub fn create(kind: ClockBackendKind, options: &TimerOptions) -> Result<Self> {
        Self::create_with(kind, options, &Capabilities::detect())
    }

    /// Build a timer, consulting `capabilities` instead of the detected ones.
    pub fn create_with(
        kind: ClockBackendKind,
        options: &TimerOptions,
        capabilities: &Capabilities,
    ) -> Result<Self> {
        if !capabilities.supports(kind) || !kind.compiled_in() {
            return Err(TimerError::UnsupportedBackend { kind });
        }
        kind.probe()?;

        let affinity = if !options.bind_to_cpu {
            None
        } else if kind.unit() != TickUnit::Cycles {
            tracing::debug!("{} counts microseconds; not pinning", kind.name());
            None
        } else {
            match AffinityGuard::acquire() {
                Ok(guard) => Some(guard),
                Err(e) => {
                    tracing::debug!("Continuing unpinned: {}", e);
                    None
                }
            }
        };

        // On error the guard drops here and the prior mask comes back.
        let calibration =
            Calibrator::new(options).calibrate(kind, capabilities.reference_clock())?;

        Ok(Self {
            calibration,
            affinity,
        })
    }

    /// The backend this timer reads.
    pub fn kind(&self) -> ClockBackendKind {
        self.calibration.kind
    }

    /// Estimated cost of two consecutive reads, in native ticks.
    pub fn overhead_ticks(&self) -> u64 {
        self.calibration.overhead_ticks
    }

    /// Native ticks per microsecond (1 for microsecond backends).
    pub fn frequency(&self) -> u64 {
        self.calibration.frequency
    }

    /// Shareable copy of the calibration.
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Whether construction pinned the calling thread to one CPU.
    pub fn is_pinned(&self) -> bool {
        self.affinity.is_some()
    }

    /// The CPU this timer pinned to, if any.
    pub fn pinned_cpu(&self) -> Option<usize> {
        self.affinity.as_ref().map(AffinityGuard::pinned_cpu)
    }

    /// The affinity mask that will be restored, if pinned.
    pub fn affinity_snapshot(&self) -> Option<&CpuSnapshot> {
        self.affinity.as_ref().map(AffinityGuard::prior)
    }

    /// One raw reading in the backend's native unit.
    #[inline]
    pub fn read_ticks(&self) -> u64 {
        self.calibration.kind.read()
    }

    /// Current reading converted to seconds since the backend's epoch.
    ///
    /// Only differences between two calls are meaningful as intervals; use
    /// [`interval_seconds`](Self::interval_seconds) for overhead-corrected
    /// short intervals.
    #[inline]
    pub fn elapsed_seconds(&self) -> f64 {
        self.calibration.ticks_to_seconds(self.read_ticks())
    }

    /// Self-overhead in seconds.
    pub fn overhead_seconds(&self) -> f64 {
        self.calibration.overhead_seconds()
    }

    /// Convert native ticks to seconds.
    #[inline]
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        self.calibration.ticks_to_seconds(ticks)
    }

    /// Seconds between two readings, minus the self-overhead, floored at 0.
    #[inline]
    pub fn interval_seconds(&self, start_ticks: u64, stop_ticks: u64) -> f64 {
        self.calibration.interval_seconds(start_ticks, stop_ticks)
    }

    /// Run `f` and return its result with the overhead-corrected duration.
    #[inline]
    pub fn measure<F, T>(&self, f: F) -> (T, f64)
    where
        F: FnOnce() -> T,
    {
        let start = self.read_ticks();
        let out = black_box(f());
        let stop = self.read_ticks();
        (out, self.interval_seconds(start, stop))
    }

    /// Tear the timer down, restoring the thread's affinity if it was pinned.
    ///
    /// A restore failure is logged and swallowed.
    pub fn destroy(mut self) {
        if let Some(guard) = self.affinity.take() {
            if let Err(e) = guard.release() {
                tracing::warn!("{}", e);
            }
        }
    }
}
