//! Time management module
//!
//! Provides tick conversion, the tick counter and task delays.
//!
//! # Rounding
//!
//! Every conversion floors. [`duration_to_ticks`] drops any partial tick,
//! and [`ticks_to_duration`] drops sub-nanosecond remainders. A timeout of
//! N ticks always waits at least N full tick periods.

use core::time::Duration;

use crate::config::CFG_TICK_RATE_HZ;
use crate::critical::is_isr_context;
use crate::error::{OsError, OsResult};
use crate::kernel::with_tables;
use crate::port::{SyncBackend, TaskBackend, TimeBackend, PORT};
use crate::task;
use crate::types::{OsTaskState, OsTick};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Kernel tick rate
#[inline]
pub const fn ticks_per_second() -> u32 {
    CFG_TICK_RATE_HZ
}

/// Duration of `ticks` tick periods, floored to whole nanoseconds
pub fn ticks_to_duration(ticks: OsTick) -> Duration {
    let hz = CFG_TICK_RATE_HZ as u64;
    let ticks = ticks as u64;
    let secs = ticks / hz;
    let nanos = (ticks % hz) * NANOS_PER_SEC / hz;
    Duration::new(secs, nanos as u32)
}

/// Number of whole tick periods in `duration`, floored
///
/// Saturates at `OsTick::MAX - 1` so a long duration never turns into
/// [`WAIT_FOREVER`](crate::types::WAIT_FOREVER).
pub fn duration_to_ticks(duration: Duration) -> OsTick {
    let ticks = duration.as_nanos() * CFG_TICK_RATE_HZ as u128 / NANOS_PER_SEC as u128;
    ticks.min((OsTick::MAX - 1) as u128) as OsTick
}

/// Get current tick count
#[inline]
pub fn tick_get() -> OsTick {
    PORT.tick_get()
}

/// Time delay in ticks
///
/// Delays the calling task for at least `ticks` tick periods. A delay of
/// zero yields the processor instead.
///
/// # Returns
/// * `Ok(())` - Delay completed
/// * `Err(OsError::InvalidArgument)` - Called from the timer service context
pub fn delay(ticks: OsTick) -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::InvalidArgument);
    }

    if ticks == 0 {
        task::yield_now();
        return Ok(());
    }

    let me = task::id_self()?;
    let deadline = PORT.deadline_after(ticks);

    with_tables(|t| {
        t.tcb(me)?.task_state = OsTaskState::Delayed;
        Ok::<_, OsError>(())
    })?;

    while !PORT.expired(deadline) {
        PORT.block(Some(deadline));
        if with_tables(|t| t.tcb(me).is_err()) {
            if PORT.unwinding() {
                return Err(OsError::NotFound);
            }
            PORT.terminate_current();
        }
    }

    with_tables(|t| {
        t.tcb(me)?.task_state = OsTaskState::Ready;
        Ok::<_, OsError>(())
    })?;

    task::service_point(me);
    Ok(())
}

/// Time delay as a duration, floored to whole ticks
pub fn delay_for(duration: Duration) -> OsResult<()> {
    delay(duration_to_ticks(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_duration() {
        let hz = ticks_per_second();
        assert_eq!(ticks_to_duration(0), Duration::ZERO);
        assert_eq!(ticks_to_duration(hz), Duration::from_secs(1));
        assert_eq!(ticks_to_duration(hz * 3 / 2), Duration::from_millis(1500));
    }

    #[test]
    fn test_duration_to_ticks_floors() {
        let tick = ticks_to_duration(1);
        assert_eq!(duration_to_ticks(Duration::ZERO), 0);
        assert_eq!(duration_to_ticks(tick - Duration::from_nanos(1)), 0);
        assert_eq!(duration_to_ticks(tick), 1);
        assert_eq!(duration_to_ticks(tick * 2 + tick / 2), 2);
    }

    #[test]
    fn test_duration_to_ticks_saturates() {
        let ticks = duration_to_ticks(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ticks, OsTick::MAX - 1);
    }

    #[test]
    fn test_conversion_is_consistent() {
        for ticks in [1, 7, 999, 1000, 12345] {
            assert_eq!(duration_to_ticks(ticks_to_duration(ticks)), ticks);
        }
    }
}
