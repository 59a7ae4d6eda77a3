//! Construction failures.

use std::cell::Cell;

use hpctimer::{
    Calibrator, Capabilities, ClockBackendKind, TickSource, Timer, TimerError, TimerOptions,
};

/// A reference clock whose resolution is coarser than any busy-wait.
struct FrozenClock(u64);

impl TickSource for FrozenClock {
    fn read_ticks(&self) -> u64 {
        self.0
    }
}

/// A counter that advances a fixed amount per read.
struct Ticker(Cell<u64>);

impl TickSource for Ticker {
    fn read_ticks(&self) -> u64 {
        let v = self.0.get();
        self.0.set(v + 3_000);
        v
    }
}

#[test]
fn zero_width_window_is_calibration_failure() {
    let calibrator = Calibrator::new(&TimerOptions::new().min_window_us(0));
    let counter = Ticker(Cell::new(0));
    let reference = FrozenClock(1_700_000_000_000_000);

    let result = calibrator.derive_frequency(&counter, &reference, 0);
    assert!(
        matches!(result, Err(TimerError::CalibrationFailed { .. })),
        "{:?}",
        result
    );
}

#[test]
fn disabled_backend_is_unsupported() {
    for kind in ClockBackendKind::PREFERENCE {
        let caps = Capabilities::detect().without(kind);
        let err = Timer::create_with(kind, &TimerOptions::default(), &caps).unwrap_err();
        assert_eq!(err, TimerError::UnsupportedBackend { kind });
    }
}

#[cfg(target_os = "linux")]
#[test]
fn disabled_backend_leaves_affinity_untouched() {
    use hpctimer::measurement::CpuSnapshot;

    let before = CpuSnapshot::current().unwrap();
    let caps = Capabilities::detect().without(ClockBackendKind::CycleCounter);
    let result = Timer::create_with(
        ClockBackendKind::CycleCounter,
        &TimerOptions::new().bind_to_cpu(true),
        &caps,
    );

    assert!(matches!(result, Err(TimerError::UnsupportedBackend { .. })));
    assert_eq!(CpuSnapshot::current().unwrap(), before);
}

#[test]
fn cycle_counter_without_reference_clock_fails() {
    let caps = Capabilities::detect()
        .without(ClockBackendKind::WallClock)
        .without(ClockBackendKind::MonotonicClock);
    if !caps.supports(ClockBackendKind::CycleCounter) {
        return;
    }

    let err = Timer::create_with(ClockBackendKind::CycleCounter, &TimerOptions::default(), &caps)
        .unwrap_err();
    assert!(matches!(err, TimerError::CalibrationFailed { .. }), "{:?}", err);
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[test]
fn cycle_counter_absent_on_this_arch() {
    assert_eq!(
        hpctimer::create_timer(ClockBackendKind::CycleCounter, false).unwrap_err(),
        TimerError::UnsupportedBackend {
            kind: ClockBackendKind::CycleCounter
        }
    );
}

#[test]
fn error_messages_name_the_problem() {
    let err = TimerError::UnsupportedBackend {
        kind: ClockBackendKind::CycleCounter,
    };
    assert!(err.to_string().contains("CycleCounter"));

    let err = ClockBackendKind::by_name("hourglass").unwrap_err();
    assert!(err.to_string().contains("hourglass"));
}
