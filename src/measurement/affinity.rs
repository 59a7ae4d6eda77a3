//! CPU affinity pinning for cycle-counter backends.
//!
//! Cycle counters are per-core. Reads taken on different cores may disagree,
//! so a timer built on the cycle counter can pin the calling thread to the
//! core it is currently running on and restore the prior mask when the timer
//! goes away.
//!
//! # Platform Behavior
//!
//! - **Linux**: `sched_getaffinity` snapshots the thread's mask and
//!   `sched_setaffinity` pins it to the CPU reported by `sched_getcpu`.
//!   No special privileges are required.
//! - **Everything else**: [`AffinityGuard::acquire`] reports
//!   [`TimerError::AffinityUnsupported`] and callers continue unpinned.
//!
//! Affinity is per-thread state. The guard is `!Send` so the pin is released on
//! the thread that took it.
//!
//! # Example
//!
//! ```ignore
//! use hpctimer::measurement::affinity::AffinityGuard;
//!
//! let guard = match AffinityGuard::acquire() {
//!     Ok(guard) => Some(guard),
//!     Err(e) => {
//!         tracing::debug!("{}", e);
//!         None
//!     }
//! };
//!
//! // ... read the cycle counter ...
//!
//! // Guard dropped here, original affinity restored
//! ```

use std::marker::PhantomData;

use super::error::{Result, TimerError};

/// A copy of one thread's CPU affinity mask.
#[derive(Clone, Copy)]
pub struct CpuSnapshot {
    #[cfg(target_os = "linux")]
    mask: libc::cpu_set_t,
    #[cfg(not(target_os = "linux"))]
    _private: (),
}

impl CpuSnapshot {
    /// Capture the calling thread's current affinity mask.
    #[cfg(target_os = "linux")]
    pub fn current() -> Result<Self> {
        use std::mem::MaybeUninit;

        let mut mask = MaybeUninit::<libc::cpu_set_t>::uninit();
        // SAFETY: the pointer and size describe a writable cpu_set_t; pid 0 is
        // the calling thread.
        let result = unsafe {
            libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), mask.as_mut_ptr())
        };
        if result != 0 {
            return Err(TimerError::AffinityUnsupported {
                reason: format!(
                    "sched_getaffinity failed: {}",
                    std::io::Error::last_os_error()
                ),
            });
        }

        // SAFETY: sched_getaffinity returned 0, so the mask was written.
        Ok(Self {
            mask: unsafe { mask.assume_init() },
        })
    }

    /// Capture the calling thread's current affinity mask.
    #[cfg(not(target_os = "linux"))]
    pub fn current() -> Result<Self> {
        Err(TimerError::AffinityUnsupported {
            reason: "CPU affinity not supported on this platform".to_string(),
        })
    }

    /// CPUs present in the mask, ascending.
    pub fn cpus(&self) -> Vec<usize> {
        #[cfg(target_os = "linux")]
        {
            (0..libc::CPU_SETSIZE as usize)
                // SAFETY: i is below CPU_SETSIZE.
                .filter(|&i| unsafe { libc::CPU_ISSET(i, &self.mask) })
                .collect()
        }

        #[cfg(not(target_os = "linux"))]
        {
            Vec::new()
        }
    }

    #[cfg(target_os = "linux")]
    fn single(cpu: usize) -> Self {
        // SAFETY: an all-zero cpu_set_t is the empty set.
        let mut mask: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        // SAFETY: callers pass a cpu returned by sched_getcpu, below CPU_SETSIZE.
        unsafe {
            libc::CPU_ZERO(&mut mask);
            libc::CPU_SET(cpu, &mut mask);
        }
        Self { mask }
    }

    /// Make this mask the calling thread's affinity.
    #[cfg(target_os = "linux")]
    fn apply(&self) -> std::result::Result<(), String> {
        // SAFETY: self.mask is an initialized cpu_set_t of the given size.
        let result = unsafe {
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &self.mask)
        };
        if result != 0 {
            return Err(format!(
                "sched_setaffinity failed: {}",
                std::io::Error::last_os_error()
            ));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn apply(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl PartialEq for CpuSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.cpus() == other.cpus()
    }
}

impl Eq for CpuSnapshot {}

impl std::fmt::Debug for CpuSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuSnapshot")
            .field("cpus", &self.cpus())
            .finish()
    }
}

/// RAII pin of the calling thread to its current CPU.
///
/// Holds the prior affinity mask. The mask is restored by
/// [`release`](Self::release), or on drop if `release` was never called.
pub struct AffinityGuard {
    prior: CpuSnapshot,
    pinned_cpu: usize,
    restored: bool,
    _not_send: PhantomData<*const ()>,
}

impl AffinityGuard {
    /// Pin the current thread to the CPU it is running on.
    ///
    /// Returns [`TimerError::AffinityUnsupported`] if the platform has no
    /// affinity API or the kernel refuses the request. Nothing is changed in
    /// that case.
    #[cfg(target_os = "linux")]
    pub fn acquire() -> Result<Self> {
        let prior = CpuSnapshot::current()?;

        // SAFETY: sched_getcpu has no preconditions.
        let current_cpu = unsafe { libc::sched_getcpu() };
        if current_cpu < 0 {
            return Err(TimerError::AffinityUnsupported {
                reason: format!("sched_getcpu failed: {}", std::io::Error::last_os_error()),
            });
        }
        let current_cpu = current_cpu as usize;

        CpuSnapshot::single(current_cpu)
            .apply()
            .map_err(|reason| TimerError::AffinityUnsupported { reason })?;

        tracing::debug!("Pinned thread to CPU {}", current_cpu);

        Ok(AffinityGuard {
            prior,
            pinned_cpu: current_cpu,
            restored: false,
            _not_send: PhantomData,
        })
    }

    /// Pin the current thread to the CPU it is running on.
    #[cfg(not(target_os = "linux"))]
    pub fn acquire() -> Result<Self> {
        Err(TimerError::AffinityUnsupported {
            reason: "CPU affinity not supported on this platform".to_string(),
        })
    }

    /// The CPU the thread was pinned to.
    pub fn pinned_cpu(&self) -> usize {
        self.pinned_cpu
    }

    /// The mask that will be restored.
    pub fn prior(&self) -> &CpuSnapshot {
        &self.prior
    }

    /// Restore the prior mask now and report failure.
    pub fn release(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        self.prior
            .apply()
            .map_err(|reason| TimerError::AffinityRestoreFailed { reason })?;
        tracing::debug!("Restored original CPU affinity");
        Ok(())
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!("{}", e);
        }
    }
}

impl std::fmt::Debug for AffinityGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityGuard")
            .field("pinned_cpu", &self.pinned_cpu)
            .field("prior", &self.prior)
            .field("restored", &self.restored)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_pin_to_current_cpu() {
        let before = CpuSnapshot::current().unwrap();
        let guard = AffinityGuard::acquire().unwrap();

        let during = CpuSnapshot::current().unwrap();
        assert_eq!(during.cpus(), vec![guard.pinned_cpu()]);
        assert_eq!(guard.prior(), &before);

        guard.release().unwrap();
        assert_eq!(CpuSnapshot::current().unwrap(), before);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_drop_restores_mask() {
        let before = CpuSnapshot::current().unwrap();
        {
            let _guard = AffinityGuard::acquire().unwrap();
        }
        assert_eq!(CpuSnapshot::current().unwrap(), before);
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_unsupported_platform() {
        assert!(matches!(
            AffinityGuard::acquire(),
            Err(TimerError::AffinityUnsupported { .. })
        ));
    }
}
