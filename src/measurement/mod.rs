//! Clock backends, calibration and the timer handle.
//!
//! Data flows one way: a [`ClockBackendKind`] produces raw ticks, the
//! [`Calibrator`] measures its overhead and (for cycle counters) its
//! frequency, and a [`Timer`] combines the two to convert readings into
//! seconds.
//!
//! # Backend Selection
//!
//! - **x86_64**: `CycleCounter` is `lfence; rdtsc` (~0.3ns resolution)
//! - **aarch64**: `CycleCounter` is `isb; mrs cntvct_el0` (resolution varies by SoC)
//! - **unix**: `WallClock` is `gettimeofday`, `MonotonicClock` is
//!   `clock_gettime(CLOCK_MONOTONIC)`, both in microseconds
//!
//! Cycle counters are per-core. Set
//! [`TimerOptions::bind_to_cpu`](crate::TimerOptions::bind_to_cpu) to pin the
//! thread while the timer lives; see [`affinity`].

pub mod affinity;
mod backend;
mod calibration;
mod error;
mod timer;

pub use affinity::{AffinityGuard, CpuSnapshot};
pub use backend::{ClockBackendKind, TickSource, TickUnit};
pub use calibration::{busy_wait, Calibration, Calibrator, MAX_WINDOW_DOUBLINGS};
pub use error::{Result, TimerError};
pub use timer::Timer;
