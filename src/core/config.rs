//! Compile-time configuration for the OSAL
//!
//! These constants control the behavior and resource limits of the layer.

/// Number of priority levels (0 = highest priority)
pub const CFG_PRIO_MAX: usize = 64;

/// Priority given to threads adopted as tasks
pub const CFG_PRIO_DEFAULT: u8 = 32;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Minimum task stack size in bytes
pub const CFG_STK_SIZE_MIN: usize = 16 * 1024;

/// Maximum length of an object name in bytes
pub const CFG_NAME_LEN_MAX: usize = 16;

/// Size of the task table
pub const CFG_TASK_MAX: usize = 64;

/// Size of the mutex table
pub const CFG_MUTEX_MAX: usize = 64;

/// Size of the semaphore table
pub const CFG_SEM_MAX: usize = 64;

/// Size of the message queue table
pub const CFG_QUEUE_MAX: usize = 16;

/// Maximum number of messages a queue can hold
pub const CFG_QUEUE_DEPTH_MAX: usize = 32;

/// Maximum size of a single message in bytes
pub const CFG_MSG_SIZE_MAX: usize = 64;

/// Size of the timer table
pub const CFG_TIMER_MAX: usize = 32;

/// Stack size of the timer service context
pub const CFG_TMR_TASK_STK_SIZE: usize = 64 * 1024;
