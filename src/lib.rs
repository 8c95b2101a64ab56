//! OS abstraction layer in Rust
//!
//! A kernel-independent API over real-time kernel primitives:
//! - Task creation, start, suspend, resume, delete and self-exit
//! - Synchronization primitives (mutexes, semaphores)
//! - Bounded message queues
//! - One-shot and periodic timers
//! - Tick based time conversion and delays
//!
//! Every object is addressed by a generation-checked handle and every
//! operation returns an explicit [`OsResult`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(feature = "std")]
extern crate std;

#[cfg(not(feature = "std"))]
compile_error!("osal: no kernel port selected, enable the `std` feature");

#[cfg(feature = "log")]
#[doc(hidden)]
pub use ::log as __log;

#[cfg(feature = "defmt")]
#[doc(hidden)]
pub use ::defmt as __defmt;

// ============ Modules ============

pub mod log;

pub mod core;
pub mod sync;
pub mod port;

// ============ Re-exports ============

pub use self::core::config;
pub use self::core::config::*;
pub use self::core::critical;
pub use self::core::error;
pub use self::core::error::{OsError, OsResult};
pub use self::core::handle;
pub use self::core::kernel;
pub use self::core::pend;
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::task;
pub use self::core::task::{TaskFn, TaskId};
pub use self::core::time;

#[cfg(feature = "timer")]
pub use self::core::timer;

#[cfg(feature = "sem")]
pub use sync::sem;
#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "queue")]
pub use sync::queue;
