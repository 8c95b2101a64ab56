//! Semaphore implementation
//!
//! Counting semaphores for task synchronization and resource counting.
//! A semaphore created with a ceiling of 1 is a binary semaphore.
//!
//! Giving a semaphore that is already at its ceiling succeeds and leaves
//! the count unchanged.

use crate::critical::is_isr_context;
use crate::error::{OsError, OsResult};
use crate::handle::os_handle;
use crate::kernel::{self, with_tables};
use crate::pend::PendList;
use crate::task;
use crate::types::{opt, os_name, OsName, OsOpt, OsPendOn, OsPendStatus, OsSemCtr, OsTick, NO_WAIT, WAIT_FOREVER};

os_handle!(
    /// Handle of a semaphore
    SemId
);

/// Counting semaphore
pub struct OsSem {
    /// Name for lookup
    pub(crate) name: OsName,
    /// List of tasks waiting on this semaphore
    pub(crate) pend_list: PendList,
    /// Current count
    count: OsSemCtr,
    /// Ceiling
    max: OsSemCtr,
}

impl OsSem {
    fn new(name: OsName, count: OsSemCtr, max: OsSemCtr, by_prio: bool) -> Self {
        OsSem {
            name,
            pend_list: PendList::new(by_prio),
            count,
            max,
        }
    }
}

/// Snapshot of a semaphore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemInfo {
    pub name: OsName,
    pub count: OsSemCtr,
    pub max: OsSemCtr,
    pub waiters: usize,
}

/// Create a semaphore
///
/// # Arguments
/// * `name` - Semaphore name, unique unless empty
/// * `count` - Initial count value
/// * `max` - Ceiling; 1 makes a binary semaphore
/// * `options` - `Q_FIFO` or `Q_PRIORITY` waiter order
pub fn create(name: &str, count: OsSemCtr, max: OsSemCtr, options: OsOpt) -> OsResult<SemId> {
    if max == 0 || count > max || options & !opt::Q_MASK != 0 {
        return Err(OsError::InvalidArgument);
    }

    let os_name = os_name(name)?;

    let id = with_tables(|t| {
        if !name.is_empty() && t.sems.find(|s| s.name == name).is_some() {
            return Err(OsError::AlreadyExists);
        }
        t.sems
            .insert(OsSem::new(os_name, count, max, options & opt::Q_PRIORITY != 0))
            .map(SemId)
    })?;

    crate::debug!("sem {}: created '{}' {}/{}", id, name, count, max);
    Ok(id)
}

/// Create a binary semaphore
pub fn create_binary(name: &str, full: bool, options: OsOpt) -> OsResult<SemId> {
    create(name, full as OsSemCtr, 1, options)
}

/// Wait on (take) the semaphore
///
/// # Arguments
/// * `timeout` - `NO_WAIT` to poll, a tick count, or `WAIT_FOREVER`
///
/// # Returns
/// * `Ok(())` - Semaphore acquired
/// * `Err(OsError::Timeout)` - Not available within the timeout
/// * `Err(OsError::NotFound)` - Stale handle, or deleted while waiting
/// * `Err(OsError::InvalidArgument)` - Blocking take from the timer service
///   context
pub fn take(id: SemId, timeout: OsTick) -> OsResult<()> {
    if timeout != NO_WAIT && is_isr_context() {
        return Err(OsError::InvalidArgument);
    }

    // Polls need no task identity, so the timer context can poll
    let me = if timeout == NO_WAIT {
        None
    } else {
        Some(task::id_self()?)
    };

    let blocked = with_tables(|t| {
        let sem = t.sems.get_mut(id.0)?;
        if sem.count > 0 {
            sem.count -= 1;
            return Ok(None);
        }

        let Some(me) = me else {
            return Err(OsError::Timeout);
        };

        let tcb = t.tcb(me)?;
        let prio = tcb.prio;
        tcb.pend_on(OsPendOn::Semaphore(id.0.index()), timeout != WAIT_FOREVER);
        t.sems.get_mut(id.0)?.pend_list.insert(me, prio);
        Ok(Some(me))
    })?;

    match blocked {
        Some(me) => kernel::pend(me, timeout),
        None => Ok(()),
    }
}

/// Signal (give) the semaphore
///
/// Wakes the first waiter if there is one; otherwise increments the count,
/// saturating at the ceiling.
pub fn give(id: SemId) -> OsResult<()> {
    with_tables(|t| {
        let sem = t.sems.get_mut(id.0)?;

        if let Some(waiter) = sem.pend_list.pop() {
            t.ready(waiter.task, OsPendStatus::Ok);
        } else if sem.count < sem.max {
            sem.count += 1;
        }

        Ok(())
    })
}

/// Release every waiter without changing the count
///
/// Broadcast signaling: each released `take` returns `Ok(())` without
/// consuming a unit. Returns the number of tasks released.
pub fn flush(id: SemId) -> OsResult<usize> {
    with_tables(|t| {
        let waiters = t.sems.get_mut(id.0)?.pend_list.drain();
        let mut released = 0;
        for waiter in waiters {
            t.ready(waiter.task, OsPendStatus::Flushed);
            released += 1;
        }
        Ok(released)
    })
}

/// Delete a semaphore
///
/// Tasks blocked on it wake with `NotFound`.
pub fn delete(id: SemId) -> OsResult<()> {
    let woken = with_tables(|t| {
        let mut sem = t.sems.remove(id.0)?;
        let mut woken = 0;
        for waiter in sem.pend_list.drain() {
            t.ready(waiter.task, OsPendStatus::Del);
            woken += 1;
        }
        Ok::<_, OsError>(woken)
    })?;

    crate::debug!("sem {}: deleted, {} waiters released", id, woken);
    Ok(())
}

/// Get current semaphore count
pub fn count(id: SemId) -> OsResult<OsSemCtr> {
    with_tables(|t| Ok(t.sems.get(id.0)?.count))
}

/// Find a semaphore by name
pub fn find(name: &str) -> OsResult<SemId> {
    if name.is_empty() {
        return Err(OsError::NotFound);
    }

    with_tables(|t| t.sems.find(|s| s.name == name))
        .map(SemId)
        .ok_or(OsError::NotFound)
}

/// Snapshot of a semaphore
pub fn info(id: SemId) -> OsResult<SemInfo> {
    with_tables(|t| {
        let sem = t.sems.get(id.0)?;
        Ok(SemInfo {
            name: sem.name.clone(),
            count: sem.count,
            max: sem.max,
            waiters: sem.pend_list.len(),
        })
    })
}

// ============ Safe Wrapper ============

/// Owning wrapper that deletes the semaphore on drop
pub struct Semaphore {
    id: SemId,
}

impl Semaphore {
    pub fn new(name: &str, count: OsSemCtr, max: OsSemCtr) -> OsResult<Self> {
        create(name, count, max, opt::Q_FIFO).map(|id| Semaphore { id })
    }

    #[inline]
    pub fn id(&self) -> SemId {
        self.id
    }

    pub fn wait(&self, timeout: OsTick) -> OsResult<()> {
        take(self.id, timeout)
    }

    pub fn signal(&self) -> OsResult<()> {
        give(self.id)
    }

    #[inline]
    pub fn count(&self) -> OsSemCtr {
        count(self.id).unwrap_or(0)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        let _ = delete(self.id);
    }
}
