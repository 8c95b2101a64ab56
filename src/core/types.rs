//! Core type definitions for the OSAL
//!
//! These types provide strong typing for kernel primitives.

use heapless::{String, Vec};

use crate::config::{CFG_MSG_SIZE_MAX, CFG_NAME_LEN_MAX};
use crate::error::{OsError, OsResult};

/// Task priority (0 = highest priority)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Semaphore counter type
pub type OsSemCtr = u32;

/// Nesting counter
pub type OsNestingCtr = u16;

/// Option flags for API calls
pub type OsOpt = u16;

/// Object name storage
pub type OsName = String<CFG_NAME_LEN_MAX>;

/// A queued message
pub type Message = Vec<u8, CFG_MSG_SIZE_MAX>;

/// Timeout that polls without blocking
pub const NO_WAIT: OsTick = 0;

/// Timeout that blocks until the operation completes
pub const WAIT_FOREVER: OsTick = OsTick::MAX;

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsTaskState {
    /// Task exists but has not been started
    Created = 0,
    /// Task is ready to run
    Ready = 1,
    /// Task is delayed
    Delayed = 2,
    /// Task is pending on a kernel object
    Pend = 3,
    /// Task is pending with timeout
    PendTimeout = 4,
    /// Task is suspended
    Suspended = 5,
}

/// What the task is pending on, by object table index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsPendOn {
    Nothing,
    Mutex(u16),
    Semaphore(u16),
    QueueRecv(u16),
    QueueSend(u16),
}

/// Pend status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OsPendStatus {
    /// Pend succeeded
    Ok = 0,
    /// Still waiting
    Pending = 1,
    /// Object was deleted while pending
    Del = 2,
    /// Mutex was handed over by a task that died holding it
    OwnerDied = 3,
    /// Released by a flush without acquiring anything
    Flushed = 4,
}

impl OsPendStatus {
    /// Map the final pend status to the caller's result
    pub(crate) fn into_result(self) -> OsResult<()> {
        match self {
            OsPendStatus::Ok | OsPendStatus::Flushed => Ok(()),
            OsPendStatus::Del => Err(OsError::NotFound),
            OsPendStatus::OwnerDied => Err(OsError::NotOwner),
            OsPendStatus::Pending => Err(OsError::KernelError),
        }
    }
}

/// Message priority for queue sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MsgPriority {
    /// Append at the tail
    #[default]
    Normal,
    /// Insert at the head
    Urgent,
}

/// Build an object name, rejecting names that do not fit
pub(crate) fn os_name(name: &str) -> OsResult<OsName> {
    OsName::try_from(name).map_err(|_| OsError::InvalidArgument)
}

// ============ Option flags ============

/// Create options
pub mod opt {
    use super::OsOpt;

    pub const NONE: OsOpt = 0x0000;

    // Waiter queueing
    pub const Q_FIFO: OsOpt = 0x0000;
    pub const Q_PRIORITY: OsOpt = 0x0001;

    // Mutex options
    pub const MUTEX_RECURSIVE: OsOpt = 0x0010;
    pub const MUTEX_INVERSION_SAFE: OsOpt = 0x0020;
    pub const MUTEX_ANY_RELEASE: OsOpt = 0x0040;

    pub(crate) const MUTEX_MASK: OsOpt =
        Q_PRIORITY | MUTEX_RECURSIVE | MUTEX_INVERSION_SAFE | MUTEX_ANY_RELEASE;
    pub(crate) const Q_MASK: OsOpt = Q_PRIORITY;
}
