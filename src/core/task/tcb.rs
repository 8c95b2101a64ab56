//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information the layer keeps about a task.

#[cfg(feature = "mutex")]
use heapless::Vec;

#[cfg(feature = "mutex")]
use crate::config::CFG_MUTEX_MAX;
use crate::port::KernelThread;
use crate::task::TaskFn;
use crate::types::{OsName, OsPendOn, OsPendStatus, OsPrio, OsTaskState};
#[cfg(feature = "queue")]
use crate::types::{Message, MsgPriority};

/// Task Control Block
pub struct OsTcb {
    // ============ Task identification ============
    /// Task name
    pub name: OsName,

    // ============ Task entry point ============
    /// Task function, `None` for adopted threads
    pub entry: Option<TaskFn>,
    /// Task argument
    pub arg: usize,
    /// Stack size in bytes
    pub stk_size: usize,

    // ============ Kernel context ============
    pub thread: Option<KernelThread>,

    // ============ Priority ============
    /// Current (effective) priority
    pub prio: OsPrio,
    /// Base priority
    pub base_prio: OsPrio,

    // ============ State ============
    /// Current task state
    pub task_state: OsTaskState,
    /// Suspend requested
    pub suspended: bool,

    // ============ Pend ============
    /// What the task is pending on
    pub pend_on: OsPendOn,
    /// Result of pend operation
    pub pend_status: OsPendStatus,

    // ============ Owned mutexes ============
    /// Table indices of the mutexes this task holds
    #[cfg(feature = "mutex")]
    pub mutex_grp: Vec<u16, CFG_MUTEX_MAX>,

    // ============ Message ============
    /// Message handed over while pending on a queue
    #[cfg(feature = "queue")]
    pub msg: Message,
    #[cfg(feature = "queue")]
    pub msg_prio: MsgPriority,
}

impl OsTcb {
    /// Create a TCB for a task that has not been started
    pub fn new(name: OsName, entry: TaskFn, arg: usize, prio: OsPrio, stk_size: usize) -> Self {
        OsTcb {
            name,
            entry: Some(entry),
            arg,
            stk_size,
            thread: None,
            prio,
            base_prio: prio,
            task_state: OsTaskState::Created,
            suspended: false,
            pend_on: OsPendOn::Nothing,
            pend_status: OsPendStatus::Ok,
            #[cfg(feature = "mutex")]
            mutex_grp: Vec::new(),
            #[cfg(feature = "queue")]
            msg: Message::new(),
            #[cfg(feature = "queue")]
            msg_prio: MsgPriority::Normal,
        }
    }

    /// Create a TCB for a running thread the layer did not create
    pub fn adopted(thread: KernelThread, prio: OsPrio) -> Self {
        OsTcb {
            name: OsName::new(),
            entry: None,
            arg: 0,
            stk_size: 0,
            thread: Some(thread),
            prio,
            base_prio: prio,
            task_state: OsTaskState::Ready,
            suspended: false,
            pend_on: OsPendOn::Nothing,
            pend_status: OsPendStatus::Ok,
            #[cfg(feature = "mutex")]
            mutex_grp: Vec::new(),
            #[cfg(feature = "queue")]
            msg: Message::new(),
            #[cfg(feature = "queue")]
            msg_prio: MsgPriority::Normal,
        }
    }

    /// Mark the task as pending on `on`
    pub fn pend_on(&mut self, on: OsPendOn, timed: bool) {
        self.pend_on = on;
        self.pend_status = OsPendStatus::Pending;
        self.task_state = if timed {
            OsTaskState::PendTimeout
        } else {
            OsTaskState::Pend
        };
    }

    /// Leave the pend state
    pub fn clear_pend(&mut self) {
        self.pend_on = OsPendOn::Nothing;
        self.pend_status = OsPendStatus::Ok;
        if self.is_pending() {
            self.task_state = OsTaskState::Ready;
        }
    }

    /// State as reported to callers
    #[inline]
    pub fn state(&self) -> OsTaskState {
        if self.is_suspended() && self.task_state != OsTaskState::Created {
            OsTaskState::Suspended
        } else {
            self.task_state
        }
    }

    /// Check if task is pending
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(
            self.task_state,
            OsTaskState::Pend | OsTaskState::PendTimeout
        )
    }

    /// Check if task is suspended
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}
