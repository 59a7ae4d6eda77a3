//! Invariants that hold for every timer that constructs successfully.

use std::hint::black_box;

use hpctimer::{Capabilities, ClockBackendKind, Timer, TimerOptions};

fn supported_timers() -> Vec<Timer> {
    let caps = Capabilities::detect();
    ClockBackendKind::PREFERENCE
        .iter()
        .filter(|k| caps.supports(**k))
        .map(|k| Timer::create(*k, &TimerOptions::default()).expect("supported backend builds"))
        .collect()
}

#[test]
fn frequency_positive_for_every_backend() {
    for timer in supported_timers() {
        assert!(timer.frequency() > 0, "{}: frequency 0", timer.kind());
        // overhead_ticks is unsigned; it must also be a sane size
        assert!(
            timer.overhead_ticks() < 1_000_000,
            "{}: overhead {} ticks",
            timer.kind(),
            timer.overhead_ticks()
        );
    }
}

#[test]
fn microsecond_backends_have_unit_frequency() {
    for kind in [ClockBackendKind::WallClock, ClockBackendKind::MonotonicClock] {
        for _ in 0..5 {
            let timer = Timer::create(kind, &TimerOptions::default()).unwrap();
            assert_eq!(timer.frequency(), 1, "{}", kind);
        }
    }
}

#[test]
fn raw_readings_non_decreasing() {
    for timer in supported_timers() {
        // The wall clock can be stepped by NTP; only check the others strictly
        if timer.kind() == ClockBackendKind::WallClock {
            continue;
        }
        let mut last = timer.read_ticks();
        for _ in 0..1_000 {
            let now = timer.read_ticks();
            assert!(now >= last, "{}: {} after {}", timer.kind(), now, last);
            last = now;
        }
    }
}

#[test]
fn elapsed_seconds_back_to_back() {
    let timer = Timer::create(ClockBackendKind::MonotonicClock, &TimerOptions::default()).unwrap();
    let a = timer.elapsed_seconds();
    let b = timer.elapsed_seconds();
    assert!(b >= a, "{} then {}", a, b);
}

#[test]
fn overhead_smaller_than_real_work() {
    for timer in supported_timers() {
        let (_, work) = timer.measure(|| {
            let mut sum = 0u64;
            for i in 0..1_000_000u64 {
                sum = sum.wrapping_add(black_box(i));
            }
            sum
        });
        assert!(
            timer.overhead_seconds() < work,
            "{}: overhead {}s >= work {}s",
            timer.kind(),
            timer.overhead_seconds(),
            work
        );
    }
}

#[test]
fn calibration_snapshot_matches_timer() {
    let timer = Timer::create(ClockBackendKind::MonotonicClock, &TimerOptions::default()).unwrap();
    let cal = timer.calibration();
    assert_eq!(cal.kind, timer.kind());
    assert_eq!(cal.frequency, timer.frequency());
    assert_eq!(cal.overhead_ticks, timer.overhead_ticks());

    // The snapshot converts on another thread
    let handle = std::thread::spawn(move || cal.ticks_to_seconds(2_000_000));
    assert_eq!(handle.join().unwrap(), 2.0);
}
