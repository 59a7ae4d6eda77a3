//! Clock backends and the platform boundary for raw reads.
//!
//! Every backend returns an unsigned 64-bit tick count. The unit depends on
//! the kind:
//!
//! | Kind             | Source                                   | Unit         |
//! |------------------|------------------------------------------|--------------|
//! | `WallClock`      | `gettimeofday` (unix) / `SystemTime`     | microseconds |
//! | `CycleCounter`   | `lfence; rdtsc` (x86_64) / `isb; mrs cntvct_el0` (aarch64) | ticks |
//! | `MonotonicClock` | `clock_gettime(CLOCK_MONOTONIC)` / `Instant` | microseconds |
//!
//! Inline assembly lives only in this module; the rest of the crate depends on
//! [`TickSource::read_ticks`].

use std::fmt;
use std::str::FromStr;

use super::error::TimerError;

/// Native unit of a backend's readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickUnit {
    /// Raw hardware counter ticks; needs a calibrated frequency.
    Cycles,
    /// Already time-based.
    Microseconds,
}

/// Anything that produces monotonically non-decreasing tick readings.
///
/// The calibrator is written against this trait so it can be exercised with
/// synthetic clocks.
pub trait TickSource {
    /// Take one reading in the source's native unit.
    fn read_ticks(&self) -> u64;
}

/// One native time source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockBackendKind {
    /// OS time-of-day clock, in microseconds.
    WallClock,
    /// Serialized hardware counter read, in ticks.
    CycleCounter,
    /// OS monotonic clock, in microseconds.
    MonotonicClock,
}

impl ClockBackendKind {
    /// All kinds, in registry preference order.
    pub const PREFERENCE: [ClockBackendKind; 3] = [
        ClockBackendKind::CycleCounter,
        ClockBackendKind::MonotonicClock,
        ClockBackendKind::WallClock,
    ];

    /// Native unit of this backend.
    pub fn unit(&self) -> TickUnit {
        match self {
            ClockBackendKind::CycleCounter => TickUnit::Cycles,
            ClockBackendKind::WallClock | ClockBackendKind::MonotonicClock => {
                TickUnit::Microseconds
            }
        }
    }

    /// Short name used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ClockBackendKind::WallClock => "gettimeofday",
            ClockBackendKind::CycleCounter => {
                #[cfg(target_arch = "x86_64")]
                {
                    "rdtsc"
                }
                #[cfg(target_arch = "aarch64")]
                {
                    "cntvct_el0"
                }
                #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
                {
                    "cycle-counter"
                }
            }
            ClockBackendKind::MonotonicClock => "clock_gettime",
        }
    }

    /// Whether this build contains an implementation of the backend.
    pub fn compiled_in(&self) -> bool {
        match self {
            ClockBackendKind::CycleCounter => {
                cfg!(any(target_arch = "x86_64", target_arch = "aarch64"))
            }
            ClockBackendKind::WallClock | ClockBackendKind::MonotonicClock => true,
        }
    }

    /// Look a backend up by name (for configuration and environment overrides).
    ///
    /// | Input                                                  | Kind             |
    /// |--------------------------------------------------------|------------------|
    /// | `"wall"`, `"wallclock"`, `"gettimeofday"`              | `WallClock`      |
    /// | `"tsc"`, `"rdtsc"`, `"cycle"`, `"cyclecounter"`, `"cntvct"` | `CycleCounter` |
    /// | `"monotonic"`, `"monotonicclock"`, `"clock_gettime"`   | `MonotonicClock` |
    ///
    /// Names of backends not compiled into this build are rejected.
    pub fn by_name(name: &str) -> Result<ClockBackendKind, TimerError> {
        let kind = match name.trim().to_lowercase().as_str() {
            "wall" | "wallclock" | "wall_clock" | "gettimeofday" => ClockBackendKind::WallClock,
            "tsc" | "rdtsc" | "cycle" | "cyclecounter" | "cycle_counter" | "cntvct"
            | "cntvct_el0" => ClockBackendKind::CycleCounter,
            "monotonic" | "monotonicclock" | "monotonic_clock" | "clock_gettime" => {
                ClockBackendKind::MonotonicClock
            }
            _ => return Err(TimerError::UnknownBackend(name.to_string())),
        };

        if kind.compiled_in() {
            Ok(kind)
        } else {
            Err(TimerError::UnknownBackend(name.to_string()))
        }
    }

    /// Canonical names of the backends compiled into this build.
    pub fn available_names() -> Vec<&'static str> {
        Self::PREFERENCE
            .iter()
            .filter(|k| k.compiled_in())
            .map(|k| match k {
                ClockBackendKind::WallClock => "wallclock",
                ClockBackendKind::CycleCounter => "tsc",
                ClockBackendKind::MonotonicClock => "monotonic",
            })
            .collect()
    }

    /// Read the backend.
    ///
    /// Backends are validated with [`probe`](Self::probe) before a timer is
    /// built, so a syscall failure here yields 0 instead of an error.
    #[inline]
    pub fn read(&self) -> u64 {
        self.try_read().unwrap_or(0)
    }

    /// Take one reading, or `None` if the backend is absent or the OS call failed.
    #[inline]
    pub fn try_read(&self) -> Option<u64> {
        match self {
            ClockBackendKind::WallClock => read_wall_clock_us(),
            ClockBackendKind::CycleCounter => read_cycle_counter(),
            ClockBackendKind::MonotonicClock => read_monotonic_us(),
        }
    }

    /// Confirm that the backend answers at runtime.
    pub fn probe(&self) -> Result<u64, TimerError> {
        if !self.compiled_in() {
            return Err(TimerError::UnsupportedBackend { kind: *self });
        }
        self.try_read()
            .ok_or(TimerError::UnsupportedBackend { kind: *self })
    }
}

impl TickSource for ClockBackendKind {
    #[inline]
    fn read_ticks(&self) -> u64 {
        self.read()
    }
}

impl fmt::Display for ClockBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockBackendKind::WallClock => write!(f, "WallClock"),
            ClockBackendKind::CycleCounter => write!(f, "CycleCounter"),
            ClockBackendKind::MonotonicClock => write!(f, "MonotonicClock"),
        }
    }
}

impl FromStr for ClockBackendKind {
    type Err = TimerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::by_name(s)
    }
}

// =============================================================================
// Cycle counter
// =============================================================================

#[cfg(target_arch = "x86_64")]
#[inline]
fn read_cycle_counter() -> Option<u64> {
    use std::sync::atomic::{compiler_fence, Ordering};

    compiler_fence(Ordering::SeqCst);

    let ticks: u64;
    // SAFETY: rdtsc and lfence are available on every x86_64 CPU and touch
    // only rax/rdx.
    unsafe {
        // lfence waits for prior instructions to retire before rdtsc executes
        std::arch::asm!(
            "lfence",
            "rdtsc",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") ticks,
            out("rdx") _,
            options(nostack, nomem),
        );
    }

    compiler_fence(Ordering::SeqCst);

    Some(ticks)
}

#[cfg(target_arch = "aarch64")]
#[inline]
fn read_cycle_counter() -> Option<u64> {
    use std::sync::atomic::{compiler_fence, Ordering};

    compiler_fence(Ordering::SeqCst);

    let ticks: u64;
    // SAFETY: cntvct_el0 is readable from EL0 on every supported OS.
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            out(reg) ticks,
            options(nostack, nomem),
        );
    }

    compiler_fence(Ordering::SeqCst);

    Some(ticks)
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn read_cycle_counter() -> Option<u64> {
    None
}

// =============================================================================
// Wall clock
// =============================================================================

#[cfg(unix)]
#[inline]
fn read_wall_clock_us() -> Option<u64> {
    // SAFETY: all-zero is a valid timeval.
    let mut tv: libc::timeval = unsafe { std::mem::zeroed() };
    // SAFETY: tv is writable; the timezone argument may be null.
    let rc = unsafe { libc::gettimeofday(&mut tv, std::ptr::null_mut()) };
    if rc != 0 {
        return None;
    }
    Some((tv.tv_sec as u64) * 1_000_000 + tv.tv_usec as u64)
}

#[cfg(not(unix))]
#[inline]
fn read_wall_clock_us() -> Option<u64> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_micros() as u64)
}

// =============================================================================
// Monotonic clock
// =============================================================================

#[cfg(unix)]
#[inline]
fn read_monotonic_us() -> Option<u64> {
    // SAFETY: all-zero is a valid timespec.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: ts is writable.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return None;
    }
    Some((ts.tv_sec as u64) * 1_000_000 + (ts.tv_nsec as u64) / 1_000)
}

#[cfg(not(unix))]
#[inline]
fn read_monotonic_us() -> Option<u64> {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    Some(epoch.elapsed().as_micros() as u64)
}
