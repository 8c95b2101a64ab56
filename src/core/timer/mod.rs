//! Timer services
//!
//! One-shot and periodic software timers. All timers are driven by a single
//! timer service context, started with the first timer. Each tick the
//! service counts down the active timers and runs the callbacks that came
//! due, outside the kernel critical section.
//!
//! Callbacks must be short. Blocking calls made from a callback with a
//! nonzero timeout fail with [`OsError::InvalidArgument`].

use heapless::Vec;

use crate::config::{CFG_TIMER_MAX, CFG_TMR_TASK_STK_SIZE};
use crate::error::{OsError, OsResult};
use crate::handle::os_handle;
use crate::kernel::{with_tables, Tables, KERNEL};
use crate::port::{SyncBackend, TimeBackend, TimerBackend, PORT};
use crate::time::tick_get;
use crate::types::{os_name, OsName, OsTick};

/// Timer callback, called with the timer's handle and argument word
pub type TimerFn = fn(TimerId, usize);

os_handle!(
    /// Handle of a timer
    TimerId
);

/// Software timer
pub struct OsTmr {
    pub(crate) name: OsName,
    /// Reload value in ticks, 0 for one-shot
    period: OsTick,
    /// Tick boundaries left to cross before the next expiry
    remaining: OsTick,
    /// Tick the countdown was last advanced to
    since: OsTick,
    callback: TimerFn,
    arg: usize,
    active: bool,
}

/// Timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OsTmrState {
    /// Created or stopped, or a one-shot that fired
    Inactive,
    /// Counting down
    Active,
}

/// Snapshot of a timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerInfo {
    pub name: OsName,
    pub period: OsTick,
    /// Tick boundaries left before the next expiry
    pub remaining: OsTick,
    pub state: OsTmrState,
}

type Expired = Vec<(TimerId, TimerFn, usize), CFG_TIMER_MAX>;

impl OsTmr {
    /// Start counting down at tick `now`
    ///
    /// `now` is partly over, so one extra boundary is counted to make the
    /// first expiry at least `max(delay, 1)` full tick periods away.
    fn arm(&mut self, delay: OsTick, now: OsTick) {
        self.remaining = delay.max(1).saturating_add(1);
        self.since = now;
        self.active = true;
    }
}

impl Tables {
    /// Advance every active timer to tick `now` and collect the due ones
    fn timers_advance(&mut self, now: OsTick) -> Expired {
        let mut due = Expired::new();

        for (handle, tmr) in self.timers.iter_mut() {
            if !tmr.active {
                continue;
            }

            let elapsed = now.wrapping_sub(tmr.since);
            if elapsed == 0 {
                continue;
            }
            tmr.since = now;

            if tmr.remaining > elapsed {
                tmr.remaining -= elapsed;
                continue;
            }

            if tmr.period == 0 {
                tmr.active = false;
                tmr.remaining = 0;
            } else {
                tmr.remaining = tmr.period;
            }

            // One entry per timer, never more than the table holds
            let _ = due.push((TimerId(handle), tmr.callback, tmr.arg));
        }

        due
    }
}

/// Body of the timer service context
fn service_main() {
    crate::debug!("timer service: running");

    loop {
        PORT.block(Some(PORT.deadline_after(1)));

        let due = with_tables(|t| t.timers_advance(tick_get()));
        for (id, callback, arg) in due {
            callback(id, arg);
        }
    }
}

/// Start the timer service unless it is already running
fn ensure_service() -> OsResult<()> {
    if !KERNEL.claim_timer_svc() {
        return Ok(());
    }

    PORT.start_service("tTimerSvc", CFG_TMR_TASK_STK_SIZE, service_main)
        .map_err(|err| {
            KERNEL.release_timer_svc();
            crate::error!("timer service: failed to start: {}", err);
            OsError::ResourceExhausted
        })
}

/// Create a timer
///
/// The timer is inactive until [`start`] is called.
///
/// # Arguments
/// * `name` - Timer name, unique unless empty
/// * `period` - Reload value in ticks; 0 makes a one-shot timer
/// * `callback` - Called from the timer service context on expiry
/// * `arg` - Argument word passed to the callback
///
/// # Returns
/// * `Err(OsError::ResourceExhausted)` - Timer table full, or the timer
///   service context could not be started
pub fn create(name: &str, period: OsTick, callback: TimerFn, arg: usize) -> OsResult<TimerId> {
    let os_name = os_name(name)?;

    ensure_service()?;

    let id = with_tables(|t| {
        if !name.is_empty() && t.timers.find(|tmr| tmr.name == name).is_some() {
            return Err(OsError::AlreadyExists);
        }
        t.timers
            .insert(OsTmr {
                name: os_name,
                period,
                remaining: 0,
                since: 0,
                callback,
                arg,
                active: false,
            })
            .map(TimerId)
    })?;

    crate::debug!("timer {}: created '{}' period {}", id, name, period);
    Ok(id)
}

/// Arm a timer
///
/// The first expiry comes after at least `max(delay, 1)` full ticks.
/// Starting an active timer restarts its countdown.
pub fn start(id: TimerId, delay: OsTick) -> OsResult<()> {
    with_tables(|t| {
        t.timers.get_mut(id.0)?.arm(delay, tick_get());
        Ok(())
    })
}

/// Disarm a timer; stopping an inactive timer does nothing
pub fn stop(id: TimerId) -> OsResult<()> {
    with_tables(|t| {
        let tmr = t.timers.get_mut(id.0)?;
        tmr.active = false;
        tmr.remaining = 0;
        Ok(())
    })
}

/// Delete a timer
///
/// A callback already collected for this tick still runs once.
pub fn delete(id: TimerId) -> OsResult<()> {
    with_tables(|t| t.timers.remove(id.0))?;
    crate::debug!("timer {}: deleted", id);
    Ok(())
}

/// Find a timer by name
pub fn find(name: &str) -> OsResult<TimerId> {
    if name.is_empty() {
        return Err(OsError::NotFound);
    }

    with_tables(|t| t.timers.find(|tmr| tmr.name == name))
        .map(TimerId)
        .ok_or(OsError::NotFound)
}

pub fn info(id: TimerId) -> OsResult<TimerInfo> {
    with_tables(|t| {
        let tmr = t.timers.get(id.0)?;
        Ok(TimerInfo {
            name: tmr.name.clone(),
            period: tmr.period,
            remaining: tmr.remaining,
            state: if tmr.active {
                OsTmrState::Active
            } else {
                OsTmrState::Inactive
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: TimerId, _: usize) {}

    /// Tables holding timers given as `(period, remaining, active)`
    fn tables_with(timers: &[(OsTick, OsTick, bool)]) -> Tables {
        let mut tables = Tables::new();
        for &(period, remaining, active) in timers {
            tables
                .timers
                .insert(OsTmr {
                    name: OsName::new(),
                    period,
                    remaining,
                    since: 0,
                    callback: noop,
                    arg: 7,
                    active,
                })
                .unwrap();
        }
        tables
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut tables = tables_with(&[(0, 3, true)]);

        assert!(tables.timers_advance(2).is_empty());
        let due = tables.timers_advance(3);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].2, 7);
        assert!(tables.timers_advance(13).is_empty());
    }

    #[test]
    fn test_periodic_reloads() {
        let mut tables = tables_with(&[(4, 1, true)]);

        assert_eq!(tables.timers_advance(1).len(), 1);
        assert!(tables.timers_advance(4).is_empty());
        assert_eq!(tables.timers_advance(5).len(), 1);
    }

    #[test]
    fn test_same_tick_does_not_count() {
        let mut tables = tables_with(&[(0, 1, true)]);
        assert!(tables.timers_advance(0).is_empty());
        assert_eq!(tables.timers_advance(1).len(), 1);
    }

    #[test]
    fn test_armed_mid_tick_waits_full_delay() {
        let mut tables = tables_with(&[(0, 0, false)]);
        for (_, tmr) in tables.timers.iter_mut() {
            tmr.arm(1, 10);
        }

        // Tick 10 was already underway, so boundary 11 is not a full tick
        assert!(tables.timers_advance(11).is_empty());
        assert_eq!(tables.timers_advance(12).len(), 1);
    }

    #[test]
    fn test_zero_delay_counts_as_one() {
        let mut tables = tables_with(&[(0, 0, false)]);
        for (_, tmr) in tables.timers.iter_mut() {
            tmr.arm(0, 5);
        }

        assert!(tables.timers_advance(6).is_empty());
        assert_eq!(tables.timers_advance(7).len(), 1);
    }

    #[test]
    fn test_inactive_ignored() {
        let mut tables = tables_with(&[(0, 1, false), (5, 1, false)]);
        assert!(tables.timers_advance(100).is_empty());
    }
}
