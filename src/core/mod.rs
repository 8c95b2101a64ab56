//! Core OSAL modules
//!
//! Contains the status model, handles, kernel object tables, task
//! management, time management and timer services.

pub mod config;
pub mod critical;
pub mod error;
pub mod handle;
pub mod kernel;
pub mod pend;
pub mod types;
pub mod task;
pub mod time;

#[cfg(feature = "timer")]
pub mod timer;
