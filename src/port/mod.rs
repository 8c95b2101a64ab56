//! Port layer - kernel-specific implementations
//!
//! Every OSAL operation reaches the underlying kernel through the backend
//! traits below. Exactly one port is compiled in and dispatch is static.

#[cfg(feature = "std")]
pub mod host;

#[cfg(feature = "std")]
pub use host::HostPort as Port;

use crate::error::OsResult;
use crate::task::{TaskFn, TaskId};
use crate::types::{OsPrio, OsTick};

/// The kernel port selected for this build
pub static PORT: Port = Port::new();

/// Kernel handle of a task's execution context
pub type KernelThread = <Port as TaskBackend>::Thread;

/// How a task's entry function ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEnd {
    /// Entry function returned
    Returned,
    /// Task called exit, or was deleted and reached a service point
    Exited,
    /// Entry function panicked
    Panicked,
}

/// Execution contexts
pub trait TaskBackend {
    type Thread: Clone + Send;

    /// Create a kernel context running `body(id)`
    fn spawn(&self, name: &str, stack_size: usize, id: TaskId, body: fn(TaskId)) -> OsResult<Self::Thread>;

    /// Task bound to the calling context, if any
    fn current(&self) -> Option<TaskId>;

    /// Bind the calling context to a task created by the layer
    fn bind_current(&self, id: TaskId);

    /// Bind a foreign context; `reap(id)` runs when that context ends
    fn adopt_current(&self, id: TaskId, reap: fn(TaskId));

    /// Kernel handle of the calling context
    fn current_thread(&self) -> Self::Thread;

    /// Apply an effective priority to a context
    fn set_priority(&self, thread: &Self::Thread, prio: OsPrio);

    /// Run a task's entry function, catching self termination
    fn run_entry(&self, entry: TaskFn, arg: usize) -> TaskEnd;

    /// Terminate the calling context
    fn terminate_current(&self) -> !;

    /// True while the calling context is already being torn down
    fn unwinding(&self) -> bool;

    fn yield_now(&self);
}

/// Tick source and deadlines
pub trait TimeBackend {
    type Instant: Copy + Send;

    /// Monotonic tick counter, floored
    fn tick_get(&self) -> OsTick;

    /// Time point at least `ticks` full tick periods from now
    fn deadline_after(&self, ticks: OsTick) -> Self::Instant;

    fn expired(&self, deadline: Self::Instant) -> bool;
}

/// Blocking and waking of task contexts
pub trait SyncBackend: TaskBackend + TimeBackend {
    /// Suspend the calling context until woken or `deadline` passes
    ///
    /// May return spuriously; callers re-check their wait condition.
    fn block(&self, deadline: Option<Self::Instant>);

    /// Make a blocked context runnable; a wake before the block is kept
    fn wake(&self, thread: &Self::Thread);
}

/// Timer service context
pub trait TimerBackend: SyncBackend {
    /// Start the dedicated context running `body`
    fn start_service(&self, name: &str, stack_size: usize, body: fn()) -> OsResult<()>;

    /// True inside the timer service context
    fn in_service_context(&self) -> bool;
}
