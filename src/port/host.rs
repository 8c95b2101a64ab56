//! Host port: maps the OSAL onto the host kernel's threads
//!
//! Tasks are kernel threads, blocking is thread park/unpark and the tick
//! counter is derived from the monotonic clock. Host threads cannot be
//! stopped from outside, so task termination unwinds the task's own stack
//! from its next service point.

use std::boxed::Box;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::string::String;
use std::sync::OnceLock;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use super::{SyncBackend, TaskBackend, TaskEnd, TimeBackend, TimerBackend};
use crate::config::CFG_TICK_RATE_HZ;
use crate::error::{OsError, OsResult};
use crate::task::{TaskFn, TaskId};
use crate::time::ticks_to_duration;
use crate::types::{OsPrio, OsTick};

/// Unwind payload used to terminate a task
struct TaskExit;

/// Reaps an adopted task when its thread ends
struct AdoptGuard {
    id: TaskId,
    reap: fn(TaskId),
}

impl Drop for AdoptGuard {
    fn drop(&mut self) {
        (self.reap)(self.id);
    }
}

std::thread_local! {
    static CURRENT: Cell<Option<TaskId>> = const { Cell::new(None) };
    static IN_SERVICE: Cell<bool> = const { Cell::new(false) };
    static ADOPTED: RefCell<Option<AdoptGuard>> = const { RefCell::new(None) };
}

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Host kernel port
#[derive(Debug)]
pub struct HostPort {
    _private: (),
}

impl HostPort {
    pub const fn new() -> Self {
        HostPort { _private: () }
    }

    fn epoch() -> Instant {
        *EPOCH.get_or_init(Instant::now)
    }
}

impl TaskBackend for HostPort {
    type Thread = Thread;

    fn spawn(&self, name: &str, stack_size: usize, id: TaskId, body: fn(TaskId)) -> OsResult<Thread> {
        let handle = thread::Builder::new()
            .name(String::from(name))
            .stack_size(stack_size)
            .spawn(move || body(id))
            .map_err(|_| OsError::ResourceExhausted)?;

        // Detached: the task owns its lifetime
        Ok(handle.thread().clone())
    }

    fn current(&self) -> Option<TaskId> {
        CURRENT.with(Cell::get)
    }

    fn bind_current(&self, id: TaskId) {
        CURRENT.with(|c| c.set(Some(id)));
    }

    fn adopt_current(&self, id: TaskId, reap: fn(TaskId)) {
        CURRENT.with(|c| c.set(Some(id)));
        ADOPTED.with(|a| *a.borrow_mut() = Some(AdoptGuard { id, reap }));
    }

    fn current_thread(&self) -> Thread {
        thread::current()
    }

    fn set_priority(&self, _thread: &Thread, prio: OsPrio) {
        // Host threads carry no portable priority; the layer tracks it
        crate::trace!("host port: effective priority {}", prio);
    }

    fn run_entry(&self, entry: TaskFn, arg: usize) -> TaskEnd {
        match panic::catch_unwind(AssertUnwindSafe(|| entry(arg))) {
            Ok(()) => TaskEnd::Returned,
            Err(payload) if payload.is::<TaskExit>() => TaskEnd::Exited,
            Err(_) => TaskEnd::Panicked,
        }
    }

    fn terminate_current(&self) -> ! {
        panic::resume_unwind(Box::new(TaskExit))
    }

    fn unwinding(&self) -> bool {
        thread::panicking()
    }

    fn yield_now(&self) {
        thread::yield_now();
    }
}

impl TimeBackend for HostPort {
    type Instant = Instant;

    fn tick_get(&self) -> OsTick {
        let nanos = Self::epoch().elapsed().as_nanos();
        // Counter wraps like a kernel tick counter
        (nanos * CFG_TICK_RATE_HZ as u128 / 1_000_000_000) as OsTick
    }

    fn deadline_after(&self, ticks: OsTick) -> Instant {
        Instant::now() + ticks_to_duration(ticks)
    }

    fn expired(&self, deadline: Instant) -> bool {
        Instant::now() >= deadline
    }
}

impl SyncBackend for HostPort {
    fn block(&self, deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left > Duration::ZERO {
                    thread::park_timeout(left);
                }
            }
            None => thread::park(),
        }
    }

    fn wake(&self, thread: &Thread) {
        thread.unpark();
    }
}

impl TimerBackend for HostPort {
    fn start_service(&self, name: &str, stack_size: usize, body: fn()) -> OsResult<()> {
        thread::Builder::new()
            .name(String::from(name))
            .stack_size(stack_size)
            .spawn(move || {
                IN_SERVICE.with(|s| s.set(true));
                body();
            })
            .map(drop)
            .map_err(|_| OsError::ResourceExhausted)
    }

    fn in_service_context(&self) -> bool {
        IN_SERVICE.with(Cell::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_waits_full_ticks() {
        let port = HostPort::new();
        let start = Instant::now();
        let deadline = port.deadline_after(5);
        while !port.expired(deadline) {
            port.block(Some(deadline));
        }
        assert!(start.elapsed() >= ticks_to_duration(5));
    }

    #[test]
    fn test_wake_before_block_is_kept() {
        let port = HostPort::new();
        port.wake(&port.current_thread());
        let start = Instant::now();
        port.block(None);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_tick_counter_advances() {
        let port = HostPort::new();
        let t0 = port.tick_get();
        thread::sleep(Duration::from_millis(20));
        assert!(port.tick_get().wrapping_sub(t0) >= 1);
    }
}
