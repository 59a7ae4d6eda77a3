//! End-to-end timing scenarios.

use std::time::Duration;

use hpctimer::{create_timer, ClockBackendKind};

#[test]
fn wall_clock_measures_sleep() {
    let timer = create_timer(ClockBackendKind::WallClock, false).unwrap();

    let before = timer.elapsed_seconds();
    std::thread::sleep(Duration::from_millis(100));
    let after = timer.elapsed_seconds();

    let elapsed = after - before;
    assert!(
        (0.08..=0.15).contains(&elapsed),
        "elapsed = {:.6}s",
        elapsed
    );
}

#[test]
fn monotonic_interval_measures_sleep() {
    let timer = create_timer(ClockBackendKind::MonotonicClock, false).unwrap();

    let start = timer.read_ticks();
    std::thread::sleep(Duration::from_millis(50));
    let stop = timer.read_ticks();

    let elapsed = timer.interval_seconds(start, stop);
    assert!((0.04..=0.10).contains(&elapsed), "elapsed = {:.6}s", elapsed);
}

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
#[test]
fn pinned_cycle_counter_restores_affinity() {
    use hpctimer::measurement::CpuSnapshot;

    let before = CpuSnapshot::current().unwrap();

    let timer = create_timer(ClockBackendKind::CycleCounter, true).unwrap();
    assert!(timer.is_pinned());
    assert_eq!(timer.affinity_snapshot(), Some(&before));

    let cpu = timer.pinned_cpu().unwrap();
    assert_eq!(CpuSnapshot::current().unwrap().cpus(), vec![cpu]);

    timer.destroy();
    assert_eq!(CpuSnapshot::current().unwrap(), before);
}

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
#[test]
fn dropping_pinned_timer_restores_affinity() {
    use hpctimer::measurement::CpuSnapshot;

    let before = CpuSnapshot::current().unwrap();
    {
        let timer = create_timer(ClockBackendKind::CycleCounter, true).unwrap();
        assert!(timer.is_pinned());
    }
    assert_eq!(CpuSnapshot::current().unwrap(), before);
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
#[test]
fn default_cycle_counter_tracks_monotonic_clock() {
    let mono = create_timer(ClockBackendKind::MonotonicClock, false).unwrap();

    for _ in 0..5 {
        let cycles = create_timer(ClockBackendKind::CycleCounter, false).unwrap();

        let c0 = cycles.read_ticks();
        let m0 = mono.read_ticks();
        std::thread::sleep(Duration::from_millis(20));
        let m1 = mono.read_ticks();
        let c1 = cycles.read_ticks();

        let by_cycles = cycles.interval_seconds(c0, c1);
        let by_mono = mono.interval_seconds(m0, m1);
        let ratio = by_cycles / by_mono;
        assert!(
            (0.98..=1.02).contains(&ratio),
            "cycle counter {:.6}s vs monotonic {:.6}s at {} ticks/us",
            by_cycles,
            by_mono,
            cycles.frequency()
        );
    }
}
