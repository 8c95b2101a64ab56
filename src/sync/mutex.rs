//! Mutex implementation with priority inheritance
//!
//! Mutexes provide mutual exclusion. Each held mutex is recorded on its
//! owner's TCB so the layer can release it when the owner exits or is
//! deleted. With [`opt::MUTEX_INVERSION_SAFE`] the owner's effective
//! priority is boosted to that of its highest-priority waiter.

use crate::critical::is_isr_context;
use crate::error::{OsError, OsResult};
use crate::handle::os_handle;
use crate::kernel::{self, with_tables, Tables};
use crate::pend::PendList;
use crate::task::{self, TaskId};
use crate::types::{opt, os_name, OsName, OsNestingCtr, OsOpt, OsPendOn, OsPendStatus, OsTick, NO_WAIT, WAIT_FOREVER};

os_handle!(
    /// Handle of a mutex
    MutexId
);

/// Mutex with ownership tracking
pub struct OsMutex {
    /// Name for lookup
    pub(crate) name: OsName,
    /// Create options
    opt: OsOpt,
    /// List of tasks waiting on this mutex
    pub(crate) pend_list: PendList,
    /// Task that owns the mutex
    pub(crate) owner: Option<TaskId>,
    /// Nesting counter
    nesting_ctr: OsNestingCtr,
}

impl OsMutex {
    fn new(name: OsName, opt: OsOpt) -> Self {
        OsMutex {
            name,
            opt,
            pend_list: PendList::new(opt & opt::Q_PRIORITY != 0),
            owner: None,
            nesting_ctr: 0,
        }
    }

    #[inline]
    pub(crate) fn recursive(&self) -> bool {
        self.opt & opt::MUTEX_RECURSIVE != 0
    }

    #[inline]
    pub(crate) fn inversion_safe(&self) -> bool {
        self.opt & opt::MUTEX_INVERSION_SAFE != 0
    }

    #[inline]
    fn any_release(&self) -> bool {
        self.opt & opt::MUTEX_ANY_RELEASE != 0
    }
}

/// Snapshot of a mutex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutexInfo {
    pub name: OsName,
    pub owner: Option<TaskId>,
    pub nesting: OsNestingCtr,
    pub waiters: usize,
}

enum Acquire {
    Owned,
    Blocked,
}

/// How a lock call obtained the mutex
enum Locked {
    Owned,
    OwnerDied,
}

impl Tables {
    /// Give the mutex at `index` to `task` with nesting 1
    fn mutex_grant(&mut self, index: u16, task: TaskId) {
        if let Some(mutex) = self.mutexes.get_index_mut(index) {
            mutex.owner = Some(task);
            mutex.nesting_ctr = 1;
        }
        if let Ok(tcb) = self.tcb(task) {
            // A task can hold every mutex at most once
            let _ = tcb.mutex_grp.push(index);
        }
    }

    /// Release the mutex at `index` completely and hand it to the next
    /// waiter, which wakes with `status`
    fn mutex_handoff(&mut self, index: u16, status: OsPendStatus) {
        let Some(mutex) = self.mutexes.get_index_mut(index) else {
            return;
        };

        let prev = mutex.owner.take();
        mutex.nesting_ctr = 0;
        let next = mutex.pend_list.pop();

        if let Some(prev) = prev {
            if let Ok(tcb) = self.tcb(prev) {
                tcb.mutex_grp.retain(|&i| i != index);
            }
            self.refresh_prio(prev);
        }

        if let Some(waiter) = next {
            self.mutex_grant(index, waiter.task);
            self.ready(waiter.task, status);
            self.refresh_prio(waiter.task);
        }
    }

    /// Force-release every mutex `task` holds; returns how many
    pub(crate) fn release_owned(&mut self, task: TaskId) -> usize {
        let Ok(tcb) = self.tcb(task) else {
            return 0;
        };

        let owned = core::mem::take(&mut tcb.mutex_grp);
        for &index in owned.iter() {
            self.mutex_handoff(index, OsPendStatus::OwnerDied);
        }
        owned.len()
    }
}

/// Create a mutex
///
/// # Arguments
/// * `name` - Mutex name, unique unless empty
/// * `options` - `Q_FIFO` or `Q_PRIORITY`, combined with
///   `MUTEX_RECURSIVE`, `MUTEX_INVERSION_SAFE` and `MUTEX_ANY_RELEASE`
pub fn create(name: &str, options: OsOpt) -> OsResult<MutexId> {
    if options & !opt::MUTEX_MASK != 0 {
        return Err(OsError::InvalidArgument);
    }

    let os_name = os_name(name)?;

    let id = with_tables(|t| {
        if !name.is_empty() && t.mutexes.find(|m| m.name == name).is_some() {
            return Err(OsError::AlreadyExists);
        }
        t.mutexes.insert(OsMutex::new(os_name, options)).map(MutexId)
    })?;

    crate::debug!("mutex {}: created '{}'", id, name);
    Ok(id)
}

/// Acquire the mutex
///
/// # Arguments
/// * `timeout` - `NO_WAIT` to try once, a tick count, or `WAIT_FOREVER`
///
/// # Returns
/// * `Ok(())` - Mutex acquired
/// * `Err(OsError::Timeout)` - Not available within the timeout
/// * `Err(OsError::NotOwner)` - Relock of a non-recursive mutex by its
///   holder (deadlock); or the mutex was acquired from a task that died
///   holding it, in which case the caller now owns it
/// * `Err(OsError::NotFound)` - Stale handle, or deleted while waiting
/// * `Err(OsError::InvalidArgument)` - Called from the timer service context
pub fn lock(id: MutexId, timeout: OsTick) -> OsResult<()> {
    match acquire(id, timeout)? {
        Locked::Owned => Ok(()),
        Locked::OwnerDied => Err(OsError::NotOwner),
    }
}

fn acquire(id: MutexId, timeout: OsTick) -> OsResult<Locked> {
    if is_isr_context() {
        return Err(OsError::InvalidArgument);
    }

    let me = task::id_self()?;

    let step = with_tables(|t| {
        let prio = t.tcb(me)?.prio;
        let mutex = t.mutexes.get_mut(id.0)?;
        let owner = mutex.owner;

        match owner {
            None => {
                t.mutex_grant(id.0.index(), me);
                return Ok(Acquire::Owned);
            }
            Some(owner) if owner == me => {
                if !mutex.recursive() {
                    return Err(OsError::NotOwner);
                }
                mutex.nesting_ctr = mutex
                    .nesting_ctr
                    .checked_add(1)
                    .ok_or(OsError::ResourceExhausted)?;
                return Ok(Acquire::Owned);
            }
            Some(_) => {}
        }

        if timeout == NO_WAIT {
            return Err(OsError::Timeout);
        }

        mutex.pend_list.insert(me, prio);
        t.tcb(me)?.pend_on(OsPendOn::Mutex(id.0.index()), timeout != WAIT_FOREVER);

        // Priority inheritance
        if let Some(owner) = owner {
            t.refresh_prio(owner);
        }

        Ok(Acquire::Blocked)
    })?;

    match step {
        Acquire::Owned => Ok(Locked::Owned),
        Acquire::Blocked => match kernel::pend(me, timeout) {
            Ok(()) => Ok(Locked::Owned),
            Err(OsError::NotOwner) => Ok(Locked::OwnerDied),
            Err(err) => Err(err),
        },
    }
}

/// Release the mutex
///
/// A recursive mutex is released when the nesting count drops to zero.
/// The next waiter, if any, becomes the owner.
///
/// Unlocking is not a service point, so a task being torn down can still
/// release what it holds.
///
/// # Returns
/// * `Err(OsError::NotOwner)` - Caller does not hold the mutex
pub fn unlock(id: MutexId) -> OsResult<()> {
    let me = task::current_or_adopt()?;

    with_tables(|t| {
        let mutex = t.mutexes.get_mut(id.0)?;

        match mutex.owner {
            Some(owner) if owner == me || mutex.any_release() => {}
            _ => return Err(OsError::NotOwner),
        }

        if mutex.nesting_ctr > 1 {
            mutex.nesting_ctr -= 1;
            return Ok(());
        }

        t.mutex_handoff(id.0.index(), OsPendStatus::Ok);
        Ok(())
    })
}

/// Delete a mutex
///
/// Tasks blocked on it wake with `NotFound`. A held mutex is removed from
/// its owner.
pub fn delete(id: MutexId) -> OsResult<()> {
    let woken = with_tables(|t| {
        let mut mutex = t.mutexes.remove(id.0)?;

        if let Some(owner) = mutex.owner {
            if let Ok(tcb) = t.tcb(owner) {
                tcb.mutex_grp.retain(|&i| i != id.0.index());
            }
        }

        let mut woken = 0;
        for waiter in mutex.pend_list.drain() {
            t.ready(waiter.task, OsPendStatus::Del);
            woken += 1;
        }

        if let Some(owner) = mutex.owner {
            t.refresh_prio(owner);
        }
        Ok::<_, OsError>(woken)
    })?;

    crate::debug!("mutex {}: deleted, {} waiters released", id, woken);
    Ok(())
}

/// Find a mutex by name
pub fn find(name: &str) -> OsResult<MutexId> {
    if name.is_empty() {
        return Err(OsError::NotFound);
    }

    with_tables(|t| t.mutexes.find(|m| m.name == name))
        .map(MutexId)
        .ok_or(OsError::NotFound)
}

/// Snapshot of a mutex
pub fn info(id: MutexId) -> OsResult<MutexInfo> {
    with_tables(|t| {
        let mutex = t.mutexes.get(id.0)?;
        Ok(MutexInfo {
            name: mutex.name.clone(),
            owner: mutex.owner,
            nesting: mutex.nesting_ctr,
            waiters: mutex.pend_list.len(),
        })
    })
}

/// Check if mutex is owned
pub fn is_owned(id: MutexId) -> OsResult<bool> {
    with_tables(|t| Ok(t.mutexes.get(id.0)?.owner.is_some()))
}

// ============ Safe Wrapper ============

/// Owning wrapper that deletes the mutex on drop
#[derive(Debug)]
pub struct Mutex {
    id: MutexId,
}

impl Mutex {
    pub fn new(name: &str, options: OsOpt) -> OsResult<Self> {
        create(name, options).map(|id| Mutex { id })
    }

    #[inline]
    pub fn id(&self) -> MutexId {
        self.id
    }

    /// Lock, returning a guard that unlocks on drop
    ///
    /// If the previous owner ended while holding the mutex the guard comes
    /// back inside [`LockError::OwnerDied`].
    pub fn lock(&self, timeout: OsTick) -> Result<MutexGuard<'_>, LockError<'_>> {
        match acquire(self.id, timeout) {
            Ok(Locked::Owned) => Ok(MutexGuard { mutex: self }),
            Ok(Locked::OwnerDied) => Err(LockError::OwnerDied(MutexGuard { mutex: self })),
            Err(err) => Err(LockError::Os(err)),
        }
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        is_owned(self.id).unwrap_or(false)
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        let _ = delete(self.id);
    }
}

/// Held lock of a [`Mutex`]
#[derive(Debug)]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
}

/// Failed or flagged [`Mutex::lock`]
#[derive(Debug)]
pub enum LockError<'a> {
    /// Acquired from a task that ended holding it; the guard still unlocks
    OwnerDied(MutexGuard<'a>),
    /// Not acquired
    Os(OsError),
}

impl<'a> LockError<'a> {
    /// Status code of the failure
    pub fn error(&self) -> OsError {
        match self {
            LockError::OwnerDied(_) => OsError::NotOwner,
            LockError::Os(err) => *err,
        }
    }

    /// Guard held despite the error, if any
    pub fn into_guard(self) -> Option<MutexGuard<'a>> {
        match self {
            LockError::OwnerDied(guard) => Some(guard),
            LockError::Os(_) => None,
        }
    }
}

impl From<LockError<'_>> for OsError {
    fn from(err: LockError<'_>) -> Self {
        err.error()
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        let _ = unlock(self.mutex.id);
    }
}
