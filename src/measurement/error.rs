//! Error types for timer construction and affinity management.

use super::backend::ClockBackendKind;

/// Error returned when a timer cannot be built or a pin cannot be managed.
///
/// Only construction can fail. Once a [`Timer`](crate::Timer) exists its reads
/// are infallible; the one teardown error, [`AffinityRestoreFailed`], is
/// logged instead of returned when it happens inside `Drop`.
///
/// [`AffinityRestoreFailed`]: TimerError::AffinityRestoreFailed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// The backend is not compiled into this build, is disabled by the
    /// supplied capabilities, or failed its probe read.
    #[error("clock backend {kind} is not supported on this platform or build")]
    UnsupportedBackend {
        /// The requested backend.
        kind: ClockBackendKind,
    },

    /// Calibration could not produce a usable conversion factor.
    ///
    /// Usually the busy-wait window was shorter than the reference clock's
    /// resolution, so zero elapsed microseconds were observed.
    #[error("calibration failed: {reason}")]
    CalibrationFailed {
        /// What went wrong.
        reason: String,
    },

    /// The platform has no affinity API, or pinning was refused.
    ///
    /// Non-fatal during timer construction: the timer is built unpinned.
    #[error("CPU affinity not available: {reason}")]
    AffinityUnsupported {
        /// Human-readable explanation of why pinning was not possible.
        reason: String,
    },

    /// The prior affinity mask could not be restored.
    #[error("failed to restore CPU affinity: {reason}")]
    AffinityRestoreFailed {
        /// OS error text.
        reason: String,
    },

    /// A backend name did not match any backend available in this build.
    #[error(
        "clock backend '{0}' is unknown or not available on this platform; available: {names}",
        names = ClockBackendKind::available_names().join(", ")
    )]
    UnknownBackend(String),
}

impl TimerError {
    pub(crate) fn calibration(reason: impl Into<String>) -> Self {
        TimerError::CalibrationFailed {
            reason: reason.into(),
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TimerError>;
