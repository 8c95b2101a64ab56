//! Task management module
//!
//! Provides task creation, deletion, and control functions.
//!
//! A task is created in the [`OsTaskState::Created`] state and runs once
//! [`start`] is called. It ends when its entry function returns, when it
//! calls [`exit`], or when another task deletes it. In every case the
//! mutexes it still holds are released before its slot is freed.

mod tcb;

pub use tcb::OsTcb;

use crate::config::{CFG_PRIO_DEFAULT, CFG_PRIO_MAX, CFG_STK_SIZE_MIN};
use crate::critical::is_isr_context;
use crate::error::{OsError, OsResult};
use crate::handle::os_handle;
use crate::kernel::{with_tables, Tables};
use crate::port::{KernelThread, SyncBackend, TaskBackend, TaskEnd, PORT};
use crate::types::{os_name, OsName, OsPrio, OsTaskState};

/// Task entry point function type
pub type TaskFn = fn(usize);

os_handle!(
    /// Handle of a task
    TaskId
);

/// Snapshot of a task's attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: OsName,
    /// Effective priority, including inheritance
    pub prio: OsPrio,
    pub base_prio: OsPrio,
    /// Stack size in bytes, 0 for adopted threads
    pub stk_size: usize,
    pub state: OsTaskState,
}

impl Tables {
    /// Remove a task: unlink it from any pend list, release what it holds
    /// and invalidate its handle
    pub(crate) fn retire_task(&mut self, id: TaskId) -> OsResult<OsTcb> {
        let on = self.tcb(id)?.pend_on;
        self.unlink_waiter(id, on);

        #[cfg(feature = "mutex")]
        {
            let released = self.release_owned(id);
            if released > 0 {
                crate::warn!("task {}: released {} held mutexes", id, released);
            }
        }

        self.tasks.remove(id.0)
    }

    /// Recompute a task's effective priority from its base priority and
    /// the waiters of the inversion-safe mutexes it holds
    pub(crate) fn refresh_prio(&mut self, id: TaskId) {
        let Ok(tcb) = self.tasks.get(id.0) else {
            return;
        };

        #[cfg(feature = "mutex")]
        let inherited = tcb
            .mutex_grp
            .iter()
            .filter_map(|&index| self.mutexes.get_index(index))
            .filter(|mutex| mutex.inversion_safe())
            .filter_map(|mutex| mutex.pend_list.highest_prio())
            .min();
        #[cfg(not(feature = "mutex"))]
        let inherited: Option<OsPrio> = None;

        let prio = inherited.map_or(tcb.base_prio, |p| p.min(tcb.base_prio));
        if let Ok(tcb) = self.tasks.get_mut(id.0) {
            if tcb.prio != prio {
                tcb.prio = prio;
                if let Some(thread) = tcb.thread.as_ref() {
                    PORT.set_priority(thread, prio);
                }
            }
        }
    }
}

/// Kernel entry of every task created by the layer
fn task_main(id: TaskId) {
    PORT.bind_current(id);

    let Some((entry, arg)) = wait_for_start(id) else {
        return;
    };

    if PORT.run_entry(entry, arg) == TaskEnd::Panicked {
        crate::error!("task {}: entry function panicked", id);
    }

    reap(id);
}

/// Park until the task is started; `None` if it was deleted first
fn wait_for_start(id: TaskId) -> Option<(TaskFn, usize)> {
    loop {
        let start = with_tables(|t| {
            let tcb = t.tcb(id).ok()?;
            if tcb.task_state == OsTaskState::Created || tcb.suspended {
                Some(None)
            } else {
                Some(tcb.entry.map(|entry| (entry, tcb.arg)))
            }
        })?;

        match start {
            Some(run) => return Some(run),
            None => PORT.block(None),
        }
    }
}

/// Free whatever is left of a task whose context ended
fn reap(id: TaskId) {
    if with_tables(|t| t.retire_task(id)).is_ok() {
        crate::debug!("task {}: exited", id);
    }
}

/// Stop at a kernel service point while suspended; terminate if deleted
///
/// A context that is already unwinding returns instead of terminating.
pub(crate) fn service_point(me: TaskId) {
    enum Point {
        Run,
        Wait,
        Gone,
    }

    loop {
        let point = with_tables(|t| match t.tcb(me) {
            Err(_) => Point::Gone,
            Ok(tcb) if tcb.suspended => Point::Wait,
            Ok(_) => Point::Run,
        });

        match point {
            Point::Run => return,
            Point::Wait => PORT.block(None),
            Point::Gone if PORT.unwinding() => return,
            Point::Gone => PORT.terminate_current(),
        }
    }
}

/// Create a new task
///
/// # Arguments
/// * `name` - Task name, unique unless empty
/// * `entry` - Task entry point; returning from it ends the task
/// * `arg` - Argument to pass to task function
/// * `prio` - Task priority (0 = highest)
/// * `stk_size` - Stack size in bytes
///
/// # Returns
/// * `Err(OsError::InvalidArgument)` - Bad priority, stack size or name
/// * `Err(OsError::AlreadyExists)` - Name in use
/// * `Err(OsError::ResourceExhausted)` - Task table full or the kernel
///   could not create the context
///
/// # Example
/// ```ignore
/// fn worker(arg: usize) {
///     /* ... */
/// }
///
/// let id = task::create("worker", worker, 0, 10, 32 * 1024)?;
/// task::start(id)?;
/// ```
pub fn create(
    name: &str,
    entry: TaskFn,
    arg: usize,
    prio: OsPrio,
    stk_size: usize,
) -> OsResult<TaskId> {
    if prio as usize >= CFG_PRIO_MAX {
        return Err(OsError::InvalidArgument);
    }

    if stk_size < CFG_STK_SIZE_MIN {
        return Err(OsError::InvalidArgument);
    }

    let os_name = os_name(name)?;

    let id = with_tables(|t| {
        if !name.is_empty() && t.tasks.find(|tcb| tcb.name == name).is_some() {
            return Err(OsError::AlreadyExists);
        }
        t.tasks
            .insert(OsTcb::new(os_name, entry, arg, prio, stk_size))
            .map(TaskId)
    })?;

    let thread_name = if name.is_empty() { "task" } else { name };
    match PORT.spawn(thread_name, stk_size, id, task_main) {
        Ok(thread) => {
            with_tables(|t| {
                if let Ok(tcb) = t.tcb(id) {
                    PORT.set_priority(&thread, prio);
                    tcb.thread = Some(thread);
                }
            });
            crate::debug!("task {}: created '{}' prio {}", id, name, prio);
            Ok(id)
        }
        Err(err) => {
            // Nothing ran yet, so the slot holds no other state
            let _ = with_tables(|t| t.tasks.remove(id.0));
            crate::warn!("task '{}': kernel refused context: {}", name, err);
            Err(err)
        }
    }
}

/// Start a created task
pub fn start(id: TaskId) -> OsResult<()> {
    with_tables(|t| {
        let tcb = t.tcb(id)?;
        if tcb.task_state != OsTaskState::Created {
            return Err(OsError::InvalidArgument);
        }

        tcb.task_state = OsTaskState::Ready;
        if let Some(thread) = tcb.thread.as_ref() {
            PORT.wake(thread);
        }
        Ok(())
    })
}

/// Suspend a task
///
/// Suspending the calling task blocks it until resumed. Another task stops
/// at its next kernel service point.
pub fn suspend(id: TaskId) -> OsResult<()> {
    with_tables(|t| {
        t.tcb(id)?.suspended = true;
        Ok::<_, OsError>(())
    })?;

    if PORT.current() == Some(id) {
        service_point(id);
    }

    Ok(())
}

/// Resume a suspended task
pub fn resume(id: TaskId) -> OsResult<()> {
    with_tables(|t| {
        let tcb = t.tcb(id)?;
        if !tcb.suspended {
            return Err(OsError::InvalidArgument);
        }

        tcb.suspended = false;
        if let Some(thread) = tcb.thread.as_ref() {
            PORT.wake(thread);
        }
        Ok(())
    })
}

/// Delete a task
///
/// Mutexes held by the task are released to their next waiters. Deleting
/// the calling task is the same as [`exit`].
pub fn delete(id: TaskId) -> OsResult<()> {
    if PORT.current() == Some(id) {
        exit();
    }

    let tcb = with_tables(|t| t.retire_task(id))?;

    // A blocked task wakes, sees its handle gone and unwinds
    if let Some(thread) = tcb.thread.as_ref() {
        PORT.wake(thread);
    }

    crate::debug!("task {}: deleted", id);
    Ok(())
}

/// Terminate the calling task
///
/// Held mutexes pass to their next waiters, whose lock calls report
/// [`OsError::NotOwner`] to flag the abandoned owner.
pub fn exit() -> ! {
    if let Some(me) = PORT.current() {
        if with_tables(|t| t.retire_task(me)).is_ok() {
            crate::debug!("task {}: exit", me);
        }
    }

    PORT.terminate_current()
}

/// Handle of the calling task
///
/// A thread that the layer did not create is adopted as an anonymous task
/// on its first call and reaped when it ends.
pub fn id_self() -> OsResult<TaskId> {
    let me = current_or_adopt()?;
    service_point(me);
    Ok(me)
}

/// Handle of the calling task without stopping at a service point
///
/// The handle may name a task that has already been retired.
pub(crate) fn current_or_adopt() -> OsResult<TaskId> {
    if let Some(me) = PORT.current() {
        return Ok(me);
    }

    if is_isr_context() {
        return Err(OsError::InvalidArgument);
    }

    let thread: KernelThread = PORT.current_thread();
    let id = with_tables(|t| {
        t.tasks
            .insert(OsTcb::adopted(thread, CFG_PRIO_DEFAULT))
            .map(TaskId)
    })?;

    PORT.adopt_current(id, reap);
    crate::trace!("task {}: adopted", id);
    Ok(id)
}

/// Find a task by name
pub fn find(name: &str) -> OsResult<TaskId> {
    if name.is_empty() {
        return Err(OsError::NotFound);
    }

    with_tables(|t| t.tasks.find(|tcb| tcb.name == name))
        .map(TaskId)
        .ok_or(OsError::NotFound)
}

/// Snapshot of a task
pub fn info(id: TaskId) -> OsResult<TaskInfo> {
    with_tables(|t| {
        let tcb = t.tcb(id)?;
        Ok(TaskInfo {
            name: tcb.name.clone(),
            prio: tcb.prio,
            base_prio: tcb.base_prio,
            stk_size: tcb.stk_size,
            state: tcb.state(),
        })
    })
}

/// Effective priority of a task
pub fn priority(id: TaskId) -> OsResult<OsPrio> {
    with_tables(|t| Ok(t.tcb(id)?.prio))
}

/// Change a task's base priority
pub fn set_priority(id: TaskId, prio: OsPrio) -> OsResult<()> {
    if prio as usize >= CFG_PRIO_MAX {
        return Err(OsError::InvalidArgument);
    }

    with_tables(|t| {
        t.tcb(id)?.base_prio = prio;
        t.refresh_prio(id);
        Ok(())
    })
}

/// Yield the processor to other ready tasks
pub fn yield_now() {
    if let Some(me) = PORT.current() {
        service_point(me);
    }
    PORT.yield_now();
}
