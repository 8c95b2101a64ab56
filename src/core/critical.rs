//! Critical section handling for the OSAL
//!
//! All object state transitions happen inside the kernel's critical
//! section, provided through the `critical-section` crate. The layer adds
//! no lock of its own on top of it.

pub use critical_section::CriticalSection;

use crate::port::{TimerBackend, PORT};

/// Execute a closure inside the kernel critical section
///
/// The closure receives the critical section token, which is required to
/// borrow [`critical_section::Mutex`] protected data. Never block inside.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// Check if currently executing in the timer service context
///
/// Timer callbacks run there; it is the only non-task context of the layer
/// and blocking calls are refused from it.
#[inline]
pub fn is_isr_context() -> bool {
    PORT.in_service_context()
}
