//! # hpctimer
//!
//! Self-calibrating high-resolution timer over three clock backends:
//! - `CycleCounter`: serialized hardware counter read (`rdtsc` / `cntvct_el0`)
//! - `MonotonicClock`: `clock_gettime(CLOCK_MONOTONIC)`
//! - `WallClock`: `gettimeofday`
//!
//! Each [`Timer`] measures its own read overhead at construction and, for the
//! cycle counter, derives ticks-per-microsecond against a microsecond clock, so
//! readings convert to seconds without a syscall per read.
//!
//! ## Quick Start
//!
//! ```
//! use hpctimer::{create_timer, ClockBackendKind};
//!
//! let timer = create_timer(ClockBackendKind::MonotonicClock, false).unwrap();
//! let start = timer.read_ticks();
//! // ... work ...
//! let stop = timer.read_ticks();
//! println!("took {:.9}s", timer.interval_seconds(start, stop));
//! ```
//!
//! Callers that do not care which backend is used can rely on the per-thread
//! default:
//!
//! ```
//! let t0 = hpctimer::global_elapsed_seconds();
//! let t1 = hpctimer::global_elapsed_seconds();
//! assert!(t1 >= t0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
pub mod measurement;
pub mod registry;

pub use config::{Capabilities, TimerOptions, CLOCK_ENV_VAR};
pub use measurement::{
    Calibration, Calibrator, ClockBackendKind, Result, TickSource, TickUnit, Timer, TimerError,
};
pub use registry::{global_elapsed_seconds, global_overhead_seconds, with_default_timer};

/// Build a timer for `kind`, optionally pinning the thread to its current CPU.
///
/// Shorthand for [`Timer::create`] with default calibration settings.
pub fn create_timer(kind: ClockBackendKind, bind_to_cpu: bool) -> Result<Timer> {
    Timer::create(kind, &TimerOptions::new().bind_to_cpu(bind_to_cpu))
}
