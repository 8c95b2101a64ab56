//! Global kernel object tables
//!
//! Every object kind lives in a fixed-capacity [`Arena`]. The tables are
//! only touched inside the kernel critical section, and nothing blocks
//! while they are borrowed.

use core::cell::RefCell;

use critical_section::Mutex;
use portable_atomic::{AtomicBool, Ordering};

use crate::config::CFG_TASK_MAX;
use crate::critical::critical_section;
use crate::error::{OsError, OsResult};
use crate::handle::Arena;
use crate::port::{SyncBackend, TaskBackend, TimeBackend, PORT};
use crate::task::{OsTcb, TaskId};
use crate::types::{OsPendOn, OsPendStatus, OsTick, WAIT_FOREVER};

#[cfg(feature = "mutex")]
use crate::config::CFG_MUTEX_MAX;
#[cfg(feature = "mutex")]
use crate::mutex::OsMutex;
#[cfg(feature = "queue")]
use crate::config::CFG_QUEUE_MAX;
#[cfg(feature = "queue")]
use crate::queue::OsQueue;
#[cfg(feature = "sem")]
use crate::config::CFG_SEM_MAX;
#[cfg(feature = "sem")]
use crate::sem::OsSem;
#[cfg(feature = "timer")]
use crate::config::CFG_TIMER_MAX;
#[cfg(feature = "timer")]
use crate::timer::OsTmr;

// ============ Kernel State Structures ============

/// Atomic kernel flags
pub struct KernelFlags {
    timer_svc_running: AtomicBool,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            timer_svc_running: AtomicBool::new(false),
        }
    }

    /// Check if the timer service context is running
    #[inline(always)]
    pub fn timer_svc_running(&self) -> bool {
        self.timer_svc_running.load(Ordering::Acquire)
    }

    /// Claim the right to start the timer service
    #[inline(always)]
    pub(crate) fn claim_timer_svc(&self) -> bool {
        self.timer_svc_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline(always)]
    pub(crate) fn release_timer_svc(&self) {
        self.timer_svc_running.store(false, Ordering::Release);
    }
}

/// Global kernel state instance
pub static KERNEL: KernelFlags = KernelFlags::new();

/// All kernel objects
pub struct Tables {
    pub(crate) tasks: Arena<OsTcb, CFG_TASK_MAX>,
    #[cfg(feature = "mutex")]
    pub(crate) mutexes: Arena<OsMutex, CFG_MUTEX_MAX>,
    #[cfg(feature = "sem")]
    pub(crate) sems: Arena<OsSem, CFG_SEM_MAX>,
    #[cfg(feature = "queue")]
    pub(crate) queues: Arena<OsQueue, CFG_QUEUE_MAX>,
    #[cfg(feature = "timer")]
    pub(crate) timers: Arena<OsTmr, CFG_TIMER_MAX>,
}

impl Tables {
    pub(crate) const fn new() -> Self {
        Self {
            tasks: Arena::new(),
            #[cfg(feature = "mutex")]
            mutexes: Arena::new(),
            #[cfg(feature = "sem")]
            sems: Arena::new(),
            #[cfg(feature = "queue")]
            queues: Arena::new(),
            #[cfg(feature = "timer")]
            timers: Arena::new(),
        }
    }

    /// Get a live task control block
    #[inline]
    pub(crate) fn tcb(&mut self, id: TaskId) -> OsResult<&mut OsTcb> {
        self.tasks.get_mut(id.0)
    }

    /// Finish a waiter's pend and make it runnable
    pub(crate) fn ready(&mut self, task: TaskId, status: OsPendStatus) {
        if let Ok(tcb) = self.tasks.get_mut(task.0) {
            tcb.pend_status = status;
            tcb.pend_on = OsPendOn::Nothing;
            if let Some(thread) = tcb.thread.as_ref() {
                PORT.wake(thread);
            }
        }
    }

    /// Remove a task from the pend list of whatever it waits on
    pub(crate) fn unlink_waiter(&mut self, task: TaskId, on: OsPendOn) {
        match on {
            OsPendOn::Nothing => {}
            #[cfg(feature = "mutex")]
            OsPendOn::Mutex(index) => {
                if let Some(mutex) = self.mutexes.get_index_mut(index) {
                    mutex.pend_list.remove(task);
                    let owner = mutex.owner;
                    if let Some(owner) = owner {
                        self.refresh_prio(owner);
                    }
                }
            }
            #[cfg(feature = "sem")]
            OsPendOn::Semaphore(index) => {
                if let Some(sem) = self.sems.get_index_mut(index) {
                    sem.pend_list.remove(task);
                }
            }
            #[cfg(feature = "queue")]
            OsPendOn::QueueRecv(index) => {
                if let Some(queue) = self.queues.get_index_mut(index) {
                    queue.recv_list.remove(task);
                }
            }
            #[cfg(feature = "queue")]
            OsPendOn::QueueSend(index) => {
                if let Some(queue) = self.queues.get_index_mut(index) {
                    queue.send_list.remove(task);
                }
            }
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
}

/// Global object tables
static TABLES: Mutex<RefCell<Tables>> = Mutex::new(RefCell::new(Tables::new()));

/// Run `f` on the object tables inside the critical section
#[inline]
pub(crate) fn with_tables<F, R>(f: F) -> R
where
    F: FnOnce(&mut Tables) -> R,
{
    critical_section(|cs| f(&mut TABLES.borrow_ref_mut(cs)))
}

enum Wake {
    Block,
    Done(OsResult<()>),
    Gone,
}

/// Block the calling task until its pend completes
///
/// The caller has already queued `me` on an object inside the critical
/// section. Returns the pend outcome; on timeout the task is unlinked from
/// the object so nothing was acquired. A deleted caller terminates, or gets
/// `NotFound` if it is already unwinding.
pub(crate) fn pend(me: TaskId, timeout: OsTick) -> OsResult<()> {
    let deadline = (timeout != WAIT_FOREVER).then(|| PORT.deadline_after(timeout));

    loop {
        let wake = with_tables(|t| {
            let Ok(tcb) = t.tcb(me) else {
                return Wake::Gone;
            };

            if tcb.pend_status != OsPendStatus::Pending {
                let status = tcb.pend_status;
                tcb.clear_pend();
                return Wake::Done(status.into_result());
            }

            match deadline {
                Some(deadline) if PORT.expired(deadline) => {
                    let on = tcb.pend_on;
                    tcb.clear_pend();
                    t.unlink_waiter(me, on);
                    Wake::Done(Err(OsError::Timeout))
                }
                _ => Wake::Block,
            }
        });

        match wake {
            Wake::Block => PORT.block(deadline),
            Wake::Done(result) => {
                crate::task::service_point(me);
                return result;
            }
            Wake::Gone if PORT.unwinding() => return Err(OsError::NotFound),
            Wake::Gone => PORT.terminate_current(),
        }
    }
}
