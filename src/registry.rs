//! Per-thread default timer.
//!
//! The first call on a thread builds a [`Timer`] by trying backends in order
//! `CycleCounter → MonotonicClock → WallClock` and keeps the first that
//! calibrates. Later calls on the same thread reuse it; the timer is dropped
//! when the thread exits. Nothing is shared between threads, so no locking is
//! involved.
//!
//! Setting `HPCTIMER_CLOCK` (any name accepted by
//! [`ClockBackendKind::by_name`]) puts that backend at the front of the order.

use std::cell::OnceCell;

use crate::config::{TimerOptions, CLOCK_ENV_VAR};
use crate::measurement::{ClockBackendKind, Timer};

/// Returned by the `global_*` functions when no backend could be built.
pub const UNAVAILABLE: f64 = -1.0;

thread_local! {
    static DEFAULT_TIMER: OnceCell<Option<Timer>> = OnceCell::new();
}

/// Seconds on this thread's default timer, or [`UNAVAILABLE`].
pub fn global_elapsed_seconds() -> f64 {
    with_default_timer(Timer::elapsed_seconds).unwrap_or(UNAVAILABLE)
}

/// Overhead of this thread's default timer in seconds, or [`UNAVAILABLE`].
pub fn global_overhead_seconds() -> f64 {
    with_default_timer(Timer::overhead_seconds).unwrap_or(UNAVAILABLE)
}

/// Backend chosen for this thread's default timer.
pub fn default_kind() -> Option<ClockBackendKind> {
    with_default_timer(Timer::kind)
}

/// Run `f` against this thread's default timer, building it if needed.
///
/// Returns `None` if every backend failed, or if called while the thread's
/// locals are being torn down.
pub fn with_default_timer<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&Timer) -> R,
{
    DEFAULT_TIMER
        .try_with(|cell| cell.get_or_init(build_default).as_ref().map(f))
        .ok()
        .flatten()
}

fn build_default() -> Option<Timer> {
    let options = TimerOptions::default();

    for kind in candidate_order(preferred_from_env()) {
        match Timer::create(kind, &options) {
            Ok(timer) => {
                tracing::debug!(
                    "Default timer uses {} ({} ticks/us, overhead {} ticks)",
                    kind.name(),
                    timer.frequency(),
                    timer.overhead_ticks()
                );
                return Some(timer);
            }
            Err(e) => tracing::debug!("Default timer skipping {}: {}", kind, e),
        }
    }

    tracing::warn!("No clock backend could be calibrated; default timer unavailable");
    None
}

fn preferred_from_env() -> Option<ClockBackendKind> {
    let name = std::env::var(CLOCK_ENV_VAR).ok()?;
    match ClockBackendKind::by_name(&name) {
        Ok(kind) => Some(kind),
        Err(e) => {
            tracing::debug!("Ignoring {}: {}", CLOCK_ENV_VAR, e);
            None
        }
    }
}

fn candidate_order(preferred: Option<ClockBackendKind>) -> Vec<ClockBackendKind> {
    let mut order: Vec<ClockBackendKind> = preferred.into_iter().collect();
    order.extend(
        ClockBackendKind::PREFERENCE
            .iter()
            .copied()
            .filter(|k| Some(*k) != preferred),
    );
    order
}
